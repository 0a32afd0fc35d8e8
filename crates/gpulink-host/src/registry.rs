use std::path::Path;

use gpulink_frame::Frame;
use gpulink_idl::{compile_corpus, struct_layout, CompilationContext, Corpus, StructLayout};
use serde::Serialize;
use tracing::debug;

use crate::error::{HostError, Result};
use crate::payload::{decode_struct, encode_struct, value_from_json};
use crate::value::Value;

/// A decoded message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: u8,
    pub name: String,
    pub value: Value,
}

/// Maps message ids to struct layouts for one compiled schema.
///
/// The registry is built from the same [`CompilationContext`] the bindings
/// were generated from, so ids agree with every emitted artifact.
#[derive(Debug, Clone)]
pub struct MessageRegistry {
    context: CompilationContext,
    /// Indexed by message id; ids are dense from zero.
    layouts: Vec<StructLayout>,
}

impl MessageRegistry {
    pub fn new(context: CompilationContext) -> Result<Self> {
        let layouts = context
            .messages()
            .iter()
            .map(|message| struct_layout(&context, &message.name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(messages = layouts.len(), "built message registry");
        Ok(Self { context, layouts })
    }

    /// Compile the schema corpus under `root` and build a registry from it.
    pub fn load(root: &Path) -> Result<Self> {
        let corpus = Corpus::from_directory(root)?;
        Self::new(compile_corpus(&corpus)?.context)
    }

    pub fn context(&self) -> &CompilationContext {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn layout(&self, id: u8) -> Option<&StructLayout> {
        self.layouts.get(id as usize)
    }

    pub fn id_of(&self, name: &str) -> Result<u8> {
        self.context
            .message_id(name)
            .ok_or_else(|| HostError::UnknownMessage(name.to_string()))
    }

    /// Decode a received frame by its id.
    pub fn decode(&self, frame: &Frame) -> Result<Message> {
        self.decode_payload(frame.id, &frame.payload)
    }

    pub fn decode_payload(&self, id: u8, payload: &[u8]) -> Result<Message> {
        let layout = self.layout(id).ok_or(HostError::UnknownMessageId(id))?;
        if payload.len() != layout.size {
            return Err(HostError::PayloadSize {
                id,
                name: layout.name.clone(),
                expected: layout.size,
                actual: payload.len(),
            });
        }
        Ok(Message {
            id,
            name: layout.name.clone(),
            value: decode_struct(&self.context, layout, payload, 0),
        })
    }

    /// Encode a message value into a frame.
    pub fn encode(&self, name: &str, value: &Value) -> Result<Frame> {
        let id = self.id_of(name)?;
        let layout = &self.layouts[id as usize];
        Ok(Frame::new(id, encode_struct(layout, value)?))
    }

    /// Build a message value from a JSON object of its fields.
    pub fn value_from_json(&self, name: &str, json: &serde_json::Value) -> Result<Value> {
        let id = self.id_of(name)?;
        value_from_json(&self.context, &self.layouts[id as usize], json, name)
    }
}

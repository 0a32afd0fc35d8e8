use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use gpulink_frame::{FrameConfig, FrameReader, FrameWriter};
use gpulink_transport::{HandshakeChannel, LinkStream, DEFAULT_HANDSHAKE_TIMEOUT};
use tracing::{debug, warn};

use crate::error::Result;
use crate::registry::{Message, MessageRegistry};
use crate::value::Value;

/// Host session behavior.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub frame: FrameConfig,
    /// Keep reading in [`Host::recv`] past corrupt frames, unknown ids and
    /// wrongly sized payloads instead of returning them as errors.
    pub skip_invalid: bool,
    /// How long [`Host::send_acked`] waits on the handshake channel.
    pub ack_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            skip_invalid: false,
            ack_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// A request/response session with one device.
///
/// Owns both halves of the primary channel. At most one request is in
/// flight: [`request`](Host::request) sends and then blocks for the next
/// message.
pub struct Host<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    registry: MessageRegistry,
    config: HostConfig,
    dropped: u64,
}

impl Host<LinkStream, LinkStream> {
    /// Open a device or FIFO path for both reading and writing.
    pub fn open(path: impl AsRef<Path>, registry: MessageRegistry) -> Result<Self> {
        Self::open_with_config(path, registry, HostConfig::default())
    }

    pub fn open_with_config(
        path: impl AsRef<Path>,
        registry: MessageRegistry,
        config: HostConfig,
    ) -> Result<Self> {
        let stream = LinkStream::open_device(path)?;
        let reader = stream.try_clone()?;
        Ok(Self::with_config(reader, stream, registry, config))
    }
}

impl<R: Read, W: Write> Host<R, W> {
    pub fn new(reader: R, writer: W, registry: MessageRegistry) -> Self {
        Self::with_config(reader, writer, registry, HostConfig::default())
    }

    pub fn with_config(reader: R, writer: W, registry: MessageRegistry, config: HostConfig) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config.frame.clone()),
            writer: FrameWriter::with_config(writer, config.frame.clone()),
            registry,
            config,
            dropped: 0,
        }
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Frames and messages discarded by [`recv`](Host::recv) so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Bytes skipped while scanning for a start token.
    pub fn skipped_bytes(&self) -> u64 {
        self.reader.skipped_bytes()
    }

    /// Encode and send a message.
    pub fn send(&mut self, name: &str, value: &Value) -> Result<()> {
        let frame = self.registry.encode(name, value)?;
        debug!(name, id = frame.id, size = frame.payload.len(), "sending message");
        self.writer.write_frame(&frame)?;
        Ok(())
    }

    /// Send a message given as a JSON object of its fields.
    pub fn send_json(&mut self, name: &str, json: &serde_json::Value) -> Result<()> {
        let value = self.registry.value_from_json(name, json)?;
        self.send(name, &value)
    }

    /// Send a message, then wait for `ack` on the handshake channel.
    pub fn send_acked<HR: Read, HW>(
        &mut self,
        handshake: &mut HandshakeChannel<HR, HW>,
        name: &str,
        value: &Value,
        ack: &[u8],
    ) -> Result<()> {
        self.send(name, value)?;
        handshake.expect(ack, self.config.ack_timeout)?;
        Ok(())
    }

    /// Receive and decode the next message.
    pub fn recv(&mut self) -> Result<Message> {
        loop {
            let result = self
                .reader
                .read_frame()
                .map_err(Into::into)
                .and_then(|frame| self.registry.decode(&frame));
            match result {
                Ok(message) => return Ok(message),
                Err(err) if self.config.skip_invalid && err.is_recoverable() => {
                    self.dropped += 1;
                    warn!(error = %err, dropped = self.dropped, "discarding invalid message");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Send a message and wait for the next one in return.
    pub fn request(&mut self, name: &str, value: &Value) -> Result<Message> {
        self.send(name, value)?;
        self.recv()
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}

impl<R, W> std::fmt::Debug for Host<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("messages", &self.registry.len())
            .field("config", &self.config)
            .field("dropped", &self.dropped)
            .finish()
    }
}

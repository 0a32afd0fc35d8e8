//! Host side of the gpulink device link.
//!
//! A [`MessageRegistry`] built from a compiled schema maps the one-byte
//! frame id to the message's packed layout and decodes payloads into
//! [`Value`] trees. A [`Host`] owns the primary channel and runs one
//! request at a time against a device.

pub mod error;
pub mod host;
mod payload;
pub mod registry;
pub mod value;

pub use error::{HostError, Result};
pub use host::{Host, HostConfig};
pub use registry::{Message, MessageRegistry};
pub use value::Value;

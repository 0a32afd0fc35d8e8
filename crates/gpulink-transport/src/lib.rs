//! Byte channels between the host controller and the graphics device.
//!
//! Two channels make up the link:
//! - the primary channel, a full-duplex byte stream carrying framed messages
//!   (see `gpulink-frame`); reads block until the requested bytes arrive.
//! - the handshake channel, a narrow unframed link carrying 2-byte
//!   acknowledgement/opcode pairs; reads poll with a bounded timeout.
//!
//! This is the lowest layer of gpulink. The physical serial port, FIFO or
//! socket is wrapped in a [`LinkStream`].

pub mod error;
pub mod handshake;
pub mod primary;
pub mod stream;

pub use error::{Result, TransportError};
pub use handshake::{HandshakeChannel, HandshakeConfig, DEFAULT_HANDSHAKE_TIMEOUT, OPCODE_SIZE};
pub use primary::PrimaryChannel;
pub use stream::LinkStream;

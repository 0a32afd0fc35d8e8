//! Token-delimited message framing for the gpulink device link.
//!
//! Every message is framed with:
//! - a 1-byte start token (`0x7E`) for resynchronization
//! - a 3-byte header: message id (u8) and payload size (u16 LE)
//! - a CRC-16 of the header (u16 LE)
//! - the payload, followed by its own CRC-16 (u16 LE)
//!
//! Header and payload are checked independently, so a corrupted size field
//! is never trusted. Corrupted frames are dropped and the reader rescans for
//! the next token.

pub mod codec;
pub mod crc;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_frame, encode_frame_with, EmptyPayload, Frame, FrameConfig, FrameSection, Header,
    CRC_SIZE, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, START_TOKEN,
};
pub use crc::{crc16, crc16_update};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, SyncState};
pub use writer::FrameWriter;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::crc16;
use crate::error::{FrameError, Result};

/// Byte that opens every frame.
pub const START_TOKEN: u8 = 0x7E;

/// Frame header: id (1) + payload size (2, LE) = 3 bytes, packed.
pub const HEADER_SIZE: usize = 3;

/// Each checksum is a little-endian u16.
pub const CRC_SIZE: usize = 2;

/// Largest payload the 16-bit size field can describe.
pub const DEFAULT_MAX_PAYLOAD: usize = u16::MAX as usize;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u8,
    pub size: u16,
}

impl Header {
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let size = self.size.to_le_bytes();
        [self.id, size[0], size[1]]
    }

    pub fn from_bytes(raw: [u8; HEADER_SIZE]) -> Self {
        Self {
            id: raw[0],
            size: u16::from_le_bytes([raw[1], raw[2]]),
        }
    }
}

/// A framed message addressed by its one-byte message id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message id from the compiled schema.
    pub id: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame when the payload checksum is sent.
    pub fn wire_size(&self) -> usize {
        1 + HEADER_SIZE + CRC_SIZE + self.payload.len() + CRC_SIZE
    }
}

/// How a zero-length payload is framed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyPayload {
    /// A payload checksum (0x0000) still follows the header.
    #[default]
    Checksummed,
    /// Nothing follows the header checksum.
    Bare,
}

/// Where a frame write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSection {
    Token,
    Header,
    Payload,
}

impl fmt::Display for FrameSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSection::Token => f.write_str("token"),
            FrameSection::Header => f.write_str("header"),
            FrameSection::Payload => f.write_str("payload"),
        }
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 65535.
    pub max_payload_size: usize,
    /// Framing of zero-length payloads. Default: checksummed.
    pub empty_payload: EmptyPayload,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            empty_payload: EmptyPayload::default(),
        }
    }
}

impl FrameConfig {
    pub(crate) fn payload_limit(&self) -> usize {
        self.max_payload_size.min(DEFAULT_MAX_PAYLOAD)
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────┬────┬──────────┬──────────┬──────────────┬─────────────┐
/// │ Token │ Id │ Size     │ Hdr CRC  │ Payload      │ Payload CRC │
/// │ 0x7E  │ 1B │ (2B LE)  │ (2B LE)  │ (Size bytes) │ (2B LE)     │
/// └───────┴────┴──────────┴──────────┴──────────────┴─────────────┘
/// ```
///
/// The header checksum covers the 3 header bytes only; the payload
/// checksum covers the payload only.
pub fn encode_frame(id: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_frame_with(id, payload, EmptyPayload::Checksummed, dst)
}

/// Encode a frame, choosing how an empty payload is framed.
pub fn encode_frame_with(
    id: u8,
    payload: &[u8],
    empty_payload: EmptyPayload,
    dst: &mut BytesMut,
) -> Result<()> {
    let size = u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: DEFAULT_MAX_PAYLOAD,
    })?;
    let header = Header { id, size }.to_bytes();

    dst.reserve(1 + HEADER_SIZE + CRC_SIZE + payload.len() + CRC_SIZE);
    dst.put_u8(START_TOKEN);
    dst.put_slice(&header);
    dst.put_u16_le(crc16(&header));
    if payload.is_empty() && empty_payload == EmptyPayload::Bare {
        return Ok(());
    }
    dst.put_slice(payload);
    dst.put_u16_le(crc16(payload));
    Ok(())
}

use std::io::Read;

use bytes::Bytes;
use gpulink_transport::PrimaryChannel;
use tracing::{debug, trace, warn};

use crate::codec::{EmptyPayload, Frame, FrameConfig, Header, CRC_SIZE, HEADER_SIZE, START_TOKEN};
use crate::crc::crc16;
use crate::error::{FrameError, Result};

/// Whether the reader is known to sit on a frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No frame decoded yet, or the last frame was dropped.
    Unsynchronized,
    /// The last frame decoded cleanly.
    Aligned,
}

enum ReadState {
    ScanningForToken,
    ReadingHeader,
    ValidatingHeaderChecksum { raw: [u8; HEADER_SIZE] },
    ReadingPayload { header: Header },
    ValidatingPayloadChecksum { header: Header, payload: Bytes },
    Dispatched(Frame),
}

/// Reads complete frames from any `Read` stream.
///
/// Each call to [`read_frame`](Self::read_frame) scans for the start token,
/// validates the header checksum before trusting the size field, then reads
/// and validates the payload. Integrity errors drop the current frame and
/// leave the reader usable; the next call rescans.
pub struct FrameReader<T> {
    channel: PrimaryChannel<T>,
    config: FrameConfig,
    sync: SyncState,
    skipped: u64,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            channel: PrimaryChannel::new(inner),
            config,
            sync: SyncState::Unsynchronized,
            skipped: 0,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut state = ReadState::ScanningForToken;
        loop {
            state = match state {
                ReadState::ScanningForToken => {
                    self.scan_for_token()?;
                    ReadState::ReadingHeader
                }
                ReadState::ReadingHeader => {
                    let mut raw = [0u8; HEADER_SIZE];
                    self.channel.read_into(&mut raw)?;
                    ReadState::ValidatingHeaderChecksum { raw }
                }
                ReadState::ValidatingHeaderChecksum { raw } => {
                    let actual = self.read_crc()?;
                    let expected = crc16(&raw);
                    if actual != expected {
                        return Err(self.drop_frame(FrameError::HeaderIntegrity { expected, actual }));
                    }
                    let header = Header::from_bytes(raw);
                    let max = self.config.payload_limit();
                    if header.size as usize > max {
                        return Err(self.drop_frame(FrameError::PayloadTooLarge {
                            size: header.size as usize,
                            max,
                        }));
                    }
                    ReadState::ReadingPayload { header }
                }
                ReadState::ReadingPayload { header } => {
                    let payload = self.channel.read(header.size as usize)?;
                    ReadState::ValidatingPayloadChecksum { header, payload }
                }
                ReadState::ValidatingPayloadChecksum { header, payload } => {
                    let bare = payload.is_empty() && self.config.empty_payload == EmptyPayload::Bare;
                    if !bare {
                        let actual = self.read_crc()?;
                        let expected = crc16(&payload);
                        if actual != expected {
                            return Err(self.drop_frame(FrameError::PayloadIntegrity {
                                id: header.id,
                                expected,
                                actual,
                            }));
                        }
                    }
                    ReadState::Dispatched(Frame::new(header.id, payload))
                }
                ReadState::Dispatched(frame) => {
                    trace!(id = frame.id, size = frame.payload.len(), "frame received");
                    self.sync = SyncState::Aligned;
                    return Ok(frame);
                }
            };
        }
    }

    fn scan_for_token(&mut self) -> Result<()> {
        let mut skipped = 0u64;
        loop {
            if self.channel.read_byte()? == START_TOKEN {
                break;
            }
            skipped += 1;
        }
        if skipped > 0 {
            debug!(skipped, "discarded bytes before start token");
            self.skipped += skipped;
        }
        Ok(())
    }

    fn read_crc(&mut self) -> Result<u16> {
        let mut raw = [0u8; CRC_SIZE];
        self.channel.read_into(&mut raw)?;
        Ok(u16::from_le_bytes(raw))
    }

    fn drop_frame(&mut self, err: FrameError) -> FrameError {
        warn!(error = %err, "dropping frame");
        self.sync = SyncState::Unsynchronized;
        err
    }

    /// Synchronization state after the last call.
    pub fn state(&self) -> SyncState {
        self.sync
    }

    /// Total bytes discarded while scanning for a start token.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.channel.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        self.channel.get_mut()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.channel.into_inner()
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T> std::fmt::Debug for FrameReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("config", &self.config)
            .field("sync", &self.sync)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

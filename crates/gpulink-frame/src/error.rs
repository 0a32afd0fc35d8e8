use gpulink_transport::TransportError;

use crate::codec::FrameSection;

/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header checksum did not match. The size field was not trusted.
    #[error("header checksum mismatch (expected {expected:#06x}, got {actual:#06x})")]
    HeaderIntegrity { expected: u16, actual: u16 },

    /// The payload checksum did not match.
    #[error("payload checksum mismatch for message {id} (expected {expected:#06x}, got {actual:#06x})")]
    PayloadIntegrity { id: u8, expected: u16, actual: u16 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Writing one section of a frame failed.
    #[error("failed to write frame {section}: {source}")]
    Write {
        section: FrameSection,
        #[source]
        source: TransportError,
    },

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Integrity and size errors drop one frame; the reader resumes scanning
    /// for the next start token on the following call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::HeaderIntegrity { .. }
                | FrameError::PayloadIntegrity { .. }
                | FrameError::PayloadTooLarge { .. }
        )
    }
}

impl From<TransportError> for FrameError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed { .. } => FrameError::ConnectionClosed,
            TransportError::Io(io) | TransportError::Open { source: io, .. } => FrameError::Io(io),
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

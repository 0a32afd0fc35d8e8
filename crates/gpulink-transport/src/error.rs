use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur on the primary or handshake channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device, FIFO or socket path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before the requested bytes arrived.
    #[error("channel closed after {received} of {requested} bytes")]
    Closed { requested: usize, received: usize },

    /// The handshake channel did not produce enough bytes in time.
    #[error("timed out waiting for {requested} bytes after {elapsed:?}")]
    Timeout { requested: usize, elapsed: Duration },

    /// The handshake channel produced bytes other than the expected literal.
    #[error("unexpected message: expected {expected:02X?}, got {actual:02X?}")]
    UnexpectedMessage { expected: Vec<u8>, actual: Vec<u8> },
}

pub type Result<T> = std::result::Result<T, TransportError>;

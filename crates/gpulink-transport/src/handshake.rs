use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};

/// Size of one handshake message (acknowledgement / opcode pair).
pub const OPCODE_SIZE: usize = 2;

/// Default bound for a handshake read.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for the handshake channel.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeConfig {
    /// Sleep between polls while no bytes are available.
    pub poll_interval: Duration,
    /// Timeout used by [`HandshakeChannel::read_default`] and friends.
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// The secondary, unframed acknowledgement link.
///
/// Reads never block past their timeout. The reader half is expected to be
/// non-blocking; `WouldBlock`, `TimedOut` and zero-length reads are all
/// treated as "nothing yet" and retried after `poll_interval`.
pub struct HandshakeChannel<R, W> {
    reader: R,
    writer: W,
    config: HandshakeConfig,
    pending: BytesMut,
}

impl<R, W> HandshakeChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, HandshakeConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: HandshakeConfig) -> Self {
        Self {
            reader,
            writer,
            config,
            pending: BytesMut::new(),
        }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Consume the channel and return both halves.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: Read, W> HandshakeChannel<R, W> {
    /// Read exactly `n` bytes, polling until they arrive or `timeout` elapses.
    ///
    /// Bytes received before a timeout stay buffered for the next read.
    pub fn read(&mut self, n: usize, timeout: Duration) -> Result<Bytes> {
        let started = Instant::now();
        let mut chunk = [0u8; 64];

        while self.pending.len() < n {
            let want = (n - self.pending.len()).min(chunk.len());
            match self.reader.read(&mut chunk[..want]) {
                Ok(0) => {}
                Ok(read) => {
                    trace!(read, "handshake bytes received");
                    self.pending.extend_from_slice(&chunk[..read]);
                    continue;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {}
                Err(err) => return Err(TransportError::Io(err)),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                debug!(requested = n, ?elapsed, "handshake read timed out");
                return Err(TransportError::Timeout {
                    requested: n,
                    elapsed,
                });
            }
            std::thread::sleep(self.config.poll_interval.min(timeout - elapsed));
        }

        Ok(self.pending.split_to(n).freeze())
    }

    /// Read with the configured default timeout.
    pub fn read_default(&mut self, n: usize) -> Result<Bytes> {
        self.read(n, self.config.timeout)
    }

    /// Read one opcode pair.
    pub fn read_msg(&mut self, timeout: Duration) -> Result<[u8; OPCODE_SIZE]> {
        let bytes = self.read(OPCODE_SIZE, timeout)?;
        Ok([bytes[0], bytes[1]])
    }

    /// Read `expected.len()` bytes and require them to equal `expected`.
    pub fn expect(&mut self, expected: &[u8], timeout: Duration) -> Result<()> {
        let actual = self.read(expected.len(), timeout)?;
        if actual.as_ref() != expected {
            return Err(TransportError::UnexpectedMessage {
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }
}

impl<R, W: Write> HandshakeChannel<R, W> {
    /// Write raw bytes (no framing, no checksum).
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<R, W> std::fmt::Debug for HandshakeChannel<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeChannel")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

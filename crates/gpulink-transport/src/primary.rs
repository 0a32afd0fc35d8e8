use std::io::{ErrorKind, Read, Write};

use bytes::{Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// The primary request/response byte channel.
///
/// Writes are fire-and-forget: there is no implicit acknowledgement.
/// Reads block until exactly the requested number of bytes is available;
/// there is no read timeout. A caller abandons a stuck read only by closing
/// the underlying descriptor.
pub struct PrimaryChannel<T> {
    inner: T,
}

impl<T> PrimaryChannel<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the channel and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> PrimaryChannel<T> {
    /// Read exactly `n` bytes (blocking).
    pub fn read(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(n);
        self.read_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Read a single byte (blocking).
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    /// Fill `buf` completely (blocking).
    ///
    /// Returns `TransportError::Closed` if the stream reaches EOF first.
    /// Interrupted reads are retried; any other I/O error propagates.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(TransportError::Closed {
                        requested: buf.len(),
                        received: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }
}

impl<T: Write> PrimaryChannel<T> {
    /// Write all bytes and flush.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => {
                    return Err(TransportError::Closed {
                        requested: bytes.len(),
                        received: offset,
                    })
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<T> std::fmt::Debug for PrimaryChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryChannel").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_exact_bytes() {
        let mut channel = PrimaryChannel::new(Cursor::new(vec![1u8, 2, 3, 4]));
        assert_eq!(channel.read(3).unwrap().as_ref(), &[1, 2, 3]);
        assert_eq!(channel.read_byte().unwrap(), 4);
    }

    #[test]
    fn eof_mid_read_reports_progress() {
        let mut channel = PrimaryChannel::new(Cursor::new(vec![1u8, 2]));
        let err = channel.read(5).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Closed {
                requested: 5,
                received: 2
            }
        ));
    }

    #[test]
    fn write_reaches_sink() {
        let mut channel = PrimaryChannel::new(Cursor::new(Vec::<u8>::new()));
        channel.write(&[0x7E, 0x03]).unwrap();
        channel.write(&[0x02, 0x00]).unwrap();
        assert_eq!(channel.into_inner().into_inner(), vec![0x7E, 0x03, 0x02, 0x00]);
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            data: vec![9, 8],
        };
        let mut channel = PrimaryChannel::new(reader);
        assert_eq!(channel.read(2).unwrap().as_ref(), &[9, 8]);
    }

    #[test]
    fn broken_pipe_propagates() {
        let mut channel = PrimaryChannel::new(BrokenPipe);
        let err = channel.write(&[1]).unwrap_err();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    struct InterruptedThenData {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

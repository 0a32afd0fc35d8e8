use std::io::Write;

use bytes::BytesMut;
use gpulink_transport::PrimaryChannel;
use tracing::trace;

use crate::codec::{encode_frame_with, Frame, FrameConfig, FrameSection, CRC_SIZE, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete frames to any `Write` stream.
///
/// A frame goes out in three flushed sections: the start token, the header
/// with its checksum, then the payload with its checksum.
pub struct FrameWriter<T> {
    channel: PrimaryChannel<T>,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            channel: PrimaryChannel::new(inner),
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.id, frame.payload.as_ref())
    }

    /// Encode and send a payload under a message id.
    pub fn send(&mut self, id: u8, payload: &[u8]) -> Result<()> {
        let max = self.config.payload_limit();
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        self.buf.clear();
        encode_frame_with(id, payload, self.config.empty_payload, &mut self.buf)?;

        let header_end = 1 + HEADER_SIZE + CRC_SIZE;
        let sections = [
            (FrameSection::Token, 0..1),
            (FrameSection::Header, 1..header_end),
            (FrameSection::Payload, header_end..self.buf.len()),
        ];
        for (section, range) in sections {
            if range.is_empty() {
                continue;
            }
            self.channel
                .write(&self.buf[range])
                .map_err(|source| FrameError::Write { section, source })?;
        }

        trace!(id, size = payload.len(), "frame sent");
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.channel.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        self.channel.get_mut()
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.channel.into_inner()
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T> std::fmt::Debug for FrameWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};

    use gpulink_transport::TransportError;

    use super::*;
    use crate::codec::EmptyPayload;
    use crate::reader::FrameReader;

    #[test]
    fn write_exact_wire_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(3, &[0x01, 0x02]).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(
            wire,
            vec![0x7E, 0x03, 0x02, 0x00, 0x32, 0x3F, 0x01, 0x02, 0x73, 0x13]
        );
    }

    #[test]
    fn written_frames_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(1, b"one").unwrap();
        writer.write_frame(&Frame::new(2, "two")).unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.read_frame().unwrap(), Frame::new(1, "one"));
        assert_eq!(reader.read_frame().unwrap(), Frame::new(2, "two"));
    }

    #[test]
    fn flushes_after_each_section() {
        let mut writer = FrameWriter::new(FlushLog::default());
        writer.send(1, b"abc").unwrap();

        let log = writer.into_inner();
        assert_eq!(log.flushed_at, vec![1, 6, 11]);
    }

    #[test]
    fn bare_empty_payload_skips_payload_section() {
        let cfg = FrameConfig {
            empty_payload: EmptyPayload::Bare,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(FlushLog::default(), cfg);
        writer.send(1, b"").unwrap();

        let log = writer.into_inner();
        assert_eq!(log.flushed_at, vec![1, 6]);
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(1, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn failure_reports_section() {
        let mut writer = FrameWriter::new(FailAfter { remaining: 3 });
        let err = writer.send(1, b"payload").unwrap_err();
        match err {
            FrameError::Write { section, source } => {
                assert_eq!(section, FrameSection::Header);
                assert!(matches!(source, TransportError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_write_reports_token_section() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(1, b"x").unwrap_err();
        assert!(matches!(
            err,
            FrameError::Write {
                section: FrameSection::Token,
                source: TransportError::Closed { .. }
            }
        ));
    }

    #[derive(Default)]
    struct FlushLog {
        data: Vec<u8>,
        flushed_at: Vec<usize>,
    }

    impl Write for FlushLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed_at.push(self.data.len());
            Ok(())
        }
    }

    struct FailAfter {
        remaining: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                return Err(std::io::Error::from(ErrorKind::BrokenPipe));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

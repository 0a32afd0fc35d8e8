use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected link stream: a Unix socket or a device/FIFO file.
///
/// Wraps either a Unix domain socket (simulated device) or a character
/// device / FIFO opened from the filesystem (serial port, simulator pipes).
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Device(File),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
            LinkStreamInner::Device(file) => file.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
            LinkStreamInner::Device(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
            LinkStreamInner::Device(file) => file.flush(),
        }
    }
}

impl LinkStream {
    /// Wrap a connected Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    /// Wrap an already opened device file.
    pub fn from_file(file: File) -> Self {
        Self {
            inner: LinkStreamInner::Device(file),
        }
    }

    /// Open a serial device for reading and writing.
    pub fn open_device(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path.as_ref(), OpenOptions::new().read(true).write(true))
    }

    /// Open the read end of a FIFO or device.
    pub fn open_reader(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path.as_ref(), OpenOptions::new().read(true))
    }

    /// Open the write end of a FIFO or device.
    pub fn open_writer(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path.as_ref(), OpenOptions::new().write(true))
    }

    fn open_with(path: &Path, options: &OpenOptions) -> Result<Self> {
        let file = options.open(path).map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "opened link device");
        Ok(Self::from_file(file))
    }

    /// Switch the stream between blocking and non-blocking reads.
    ///
    /// The handshake channel polls a non-blocking stream; the primary
    /// channel expects a blocking one.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
            LinkStreamInner::Device(file) => set_file_nonblocking(file, nonblocking),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            LinkStreamInner::Device(file) => Ok(Self::from_file(file.try_clone()?)),
        }
    }
}

#[cfg(unix)]
fn set_file_nonblocking(file: &File, nonblocking: bool) -> Result<()> {
    use std::os::fd::AsRawFd;

    let fd = file.as_raw_fd();

    // SAFETY: `fd` is an open descriptor owned by `file` for the duration of
    // both calls; F_GETFL/F_SETFL do not touch memory.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    // SAFETY: see above.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_file_nonblocking(_file: &File, _nonblocking: bool) -> Result<()> {
    Err(TransportError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "non-blocking device files are only supported on unix",
    )))
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => f.debug_struct("LinkStream").field("type", &"unix").finish(),
            LinkStreamInner::Device(_) => {
                f.debug_struct("LinkStream").field("type", &"device").finish()
            }
        }
    }
}

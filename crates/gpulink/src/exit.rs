use std::fmt;
use std::io;

use gpulink_codegen::EmitError;
use gpulink_frame::FrameError;
use gpulink_host::HostError;
use gpulink_idl::SchemaError;
use gpulink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { path, source } => {
            io_error(&format!("{context}: {}", path.display()), source)
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::Closed { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Write { source, .. } => transport_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::Load { path, source } => {
            io_error(&format!("{context}: {}", path.display()), source)
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn emit_error(context: &str, err: EmitError) -> CliError {
    match err {
        EmitError::Io { path, source } => {
            io_error(&format!("{context}: {}", path.display()), source)
        }
        EmitError::Schema(err) => schema_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn host_error(context: &str, err: HostError) -> CliError {
    match err {
        HostError::Transport(err) => transport_error(context, err),
        HostError::Frame(err) => frame_error(context, err),
        HostError::Schema(err) => schema_error(context, err),
        HostError::UnknownMessage(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

/// Errors that can occur while dispatching or exchanging messages.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gpulink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] gpulink_frame::FrameError),

    /// The schema could not be loaded or compiled.
    #[error("schema error: {0}")]
    Schema(#[from] gpulink_idl::SchemaError),

    /// A frame carried an id the schema does not assign.
    #[error("unknown message id {0}")]
    UnknownMessageId(u8),

    /// No message with this name exists in the schema.
    #[error("unknown message `{0}`")]
    UnknownMessage(String),

    /// The payload length does not match the message's packed size.
    #[error("message `{name}` (id {id}) expects {expected} payload bytes, got {actual}")]
    PayloadSize {
        id: u8,
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A field value is missing, of the wrong shape, or out of range.
    #[error("field `{field}`: {message}")]
    InvalidValue { field: String, message: String },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HostError {
    /// Whether the session can keep reading after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            HostError::UnknownMessageId(_) | HostError::PayloadSize { .. } => true,
            HostError::Frame(err) => err.is_recoverable(),
            _ => false,
        }
    }

    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        HostError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;

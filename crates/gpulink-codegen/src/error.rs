use std::path::PathBuf;

use gpulink_idl::SchemaError;

use crate::emitter::Target;

/// Errors raised while emitting bindings for one target.
///
/// An emission error stops that target only; other targets still run.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// A schema type has no representation in the target language.
    #[error("{target}: type `{type_name}` of field `{field}` has no mapping")]
    UnsupportedType {
        target: Target,
        type_name: String,
        field: String,
    },

    /// A schema name would collide with a keyword or generated member.
    #[error("{target}: name `{name}` in `{scope}` is reserved")]
    ReservedName {
        target: Target,
        name: String,
        scope: String,
    },

    /// A generated artifact could not be written.
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type Result<T> = std::result::Result<T, EmitError>;

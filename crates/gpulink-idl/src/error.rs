use std::path::PathBuf;

/// Errors raised while loading, parsing or resolving a schema corpus.
///
/// Any of these aborts the compile run; nothing is emitted.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A schema file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The corpus violates a configured limit or contains an unusable entry.
    #[error("invalid corpus: {0}")]
    Corpus(String),

    /// Unexpected token or malformed annotation.
    #[error("{file}:{line}:{column}: {message}")]
    Syntax {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// A field references a type that is not declared in scope.
    #[error("{file}:{line}: unknown type `{name}`")]
    UnknownType {
        name: String,
        file: PathBuf,
        line: usize,
    },

    /// A declaration, field or enumerator name is used twice.
    #[error("{file}:{line}: duplicate {kind} `{name}`")]
    Duplicate {
        kind: &'static str,
        name: String,
        file: PathBuf,
        line: usize,
    },

    /// A bad bit width or type, or a bit run that does not fill its storage unit.
    #[error("{file}:{line}: invalid bit-field `{field}`: {message}")]
    InvalidBitField {
        field: String,
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// An array was declared with zero length.
    #[error("{file}:{line}: array `{field}` must have a non-zero length")]
    InvalidArray {
        field: String,
        file: PathBuf,
        line: usize,
    },

    /// An enumerator value does not fit the enum's backing type.
    #[error("{file}:{line}: value {value} of `{enumerator}` does not fit {backing}")]
    EnumValueOutOfRange {
        enumerator: String,
        value: i128,
        backing: &'static str,
        file: PathBuf,
        line: usize,
    },

    /// An include annotation names a file that cannot be loaded.
    #[error("{from} includes {path}: {source}")]
    MissingInclude {
        path: PathBuf,
        from: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Include annotations form a cycle.
    #[error("include cycle: {}", format_chain(.chain))]
    IncludeCycle { chain: Vec<PathBuf> },

    /// More messages than a one-byte header id can address.
    #[error("message `{name}` exceeds the id space of {limit} messages")]
    IdSpaceExhausted { name: String, limit: usize },

    /// A struct's packed size does not fit in memory.
    #[error("struct `{name}` is too large to lay out")]
    LayoutOverflow { name: String },

    /// A message payload exceeds what a frame header can describe.
    #[error("message `{name}` is {size} bytes, over the {limit}-byte payload limit")]
    MessageTooLarge {
        name: String,
        size: usize,
        limit: usize,
    },

    /// A layout was requested for a name that is not a declared struct.
    #[error("no struct named `{0}`")]
    UnknownStruct(String),
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, SchemaError>;

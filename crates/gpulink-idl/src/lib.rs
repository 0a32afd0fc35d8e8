//! Schema language for gpulink messages.
//!
//! A corpus of `.th` files declares C-like structs and enums. Compiling a
//! corpus parses every file against its includes, keeps the declarations
//! each file introduces, and numbers every struct not marked
//! `not_message` with a dense one-byte message id. The resulting
//! [`CompilationContext`] is the single source of ids for every emitter and
//! for run-time dispatch.
//!
//! ```text
//! /* include: common.th */
//! /* not_message: Point */
//! struct Point { uint16 x; uint16 y; };
//! struct DrawLine { Point from; Point to; Color color : 4; uint8 width : 4; };
//! ```

pub mod compiler;
pub mod config;
pub mod context;
pub mod corpus;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod tokenizer;

pub use compiler::{compile_corpus, Compilation};
pub use config::CorpusConfig;
pub use context::{CompilationContext, MessageId, MAX_MESSAGES};
pub use corpus::{Corpus, SchemaFile};
pub use error::{Result, SchemaError};
pub use layout::{struct_layout, FieldLayout, LayoutKind, StructLayout, MAX_MESSAGE_SIZE};
pub use metadata::FileMetadata;
pub use model::{
    Declaration, EnumDef, Enumerator, Field, FieldType, Primitive, ScopedType, StructDef,
    TypeScope,
};
pub use parser::parse_declarations;
pub use resolver::{resolve_file, ResolvedFile};

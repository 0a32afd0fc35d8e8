//! Binding generators for gpulink schemas.
//!
//! Every emitter reads message ids from the same
//! [`CompilationContext`](gpulink_idl::CompilationContext), so the C++ and
//! Python bindings of one corpus always agree on which id means which
//! message.

pub mod cpp;
pub mod driver;
pub mod emitter;
pub mod error;
pub mod python;

pub use cpp::CppEmitter;
pub use driver::{emit_target, generate, write_artifacts, OutcomeSummary, TargetOutcome};
pub use emitter::{emitter_for, Artifact, Emitter, FileEmission, Target};
pub use error::{EmitError, Result};
pub use python::PythonEmitter;

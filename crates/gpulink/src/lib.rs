//! Schema compiler and framed device link for a graphics coprocessor.
//!
//! gpulink compiles a C-like schema of structs and enums into C++ and Python
//! bindings that share one message id space, and speaks the framed serial
//! protocol those messages travel over.
//!
//! # Crate Structure
//!
//! - [`idl`]: schema parsing, include resolution and message id assignment
//! - [`codegen`]: C++ and Python binding emitters (behind `codegen` feature)
//! - [`transport`]: primary and handshake byte channels
//! - [`frame`]: token-delimited, CRC-16 protected framing
//! - [`host`]: payload decoding by id and the host session (behind `host` feature)

/// Re-export schema types.
pub mod idl {
    pub use gpulink_idl::*;
}

/// Re-export binding emitters (requires `codegen` feature).
#[cfg(feature = "codegen")]
pub mod codegen {
    pub use gpulink_codegen::*;
}

/// Re-export transport types.
pub mod transport {
    pub use gpulink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gpulink_frame::*;
}

/// Re-export host types (requires `host` feature).
#[cfg(feature = "host")]
pub mod host {
    pub use gpulink_host::*;
}

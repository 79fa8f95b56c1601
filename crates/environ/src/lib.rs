//! Shared environment for entry-trampoline generation: the WebAssembly value
//! and function types that cross the host boundary, the layout of the
//! execution context record, configuration, and the host module builder.

#![deny(missing_docs)]
#![warn(clippy::cast_sign_loss)]

pub mod emscripten;
mod host_func;
mod module;
mod module_environ;
mod tunables;
mod types;
mod vmoffsets;

pub use crate::host_func::*;
pub use crate::module::*;
pub use crate::module_environ::*;
pub use crate::tunables::*;
pub use crate::types::*;
pub use crate::vmoffsets::*;

// Reexport the entity helpers since the index types defined here are used
// with `PrimaryMap` and friends everywhere.
pub use cranelift_entity::*;

use thiserror::Error;

/// WebAssembly page sizes are defined to be 64KiB.
pub const WASM_PAGE_SIZE: u32 = 0x10000;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors produced while parsing a textual signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// A value type name that is not part of the vocabulary.
    #[error("unknown value type `{0}`")]
    UnknownType(String),
    /// The signature text does not have the `params -> results` shape.
    #[error("malformed signature `{0}`")]
    Malformed(String),
    /// A name lacking the `invoke_` prefix.
    #[error("`{0}` is not an emscripten invoke function name")]
    NotInvoke(String),
    /// An emscripten signature character outside `vijfdp`.
    #[error("unknown emscripten signature character `{ch}` in `{name}`")]
    UnknownChar {
        /// The full name being parsed.
        name: String,
        /// The offending character.
        ch: char,
    },
    /// `v` used anywhere but the result position.
    #[error("`v` is only valid as the result of `{0}`")]
    VoidParam(String),
}

//! Result and error types representing the outcome of generating a
//! trampoline.

use entrygen_environ::WasmValType;
use thiserror::Error;

/// A code generation error.
///
/// Each of these indicates a signature the entry ABI cannot express; the
/// trampoline for that signature is not built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// A value type with no register or flat array representation.
    #[error("unsupported value type {0} in entry signature")]
    UnsupportedType(WasmValType),

    /// The argument and result stack area can't be reserved with a single
    /// immediate subtraction.
    #[error("stack slot size {0} is too large to encode as an immediate")]
    StackSlotTooLarge(u32),

    /// More leading parameters are reserved than the ABI passes in registers.
    #[error("{0} reserved leading parameters exceed the integer argument registers")]
    TooManyReservedParams(usize),
}

/// A convenient alias for a `Result` that uses `CodegenError` as the error type.
pub type CodegenResult<T> = Result<T, CodegenError>;

//! Machine code generation for entry trampolines.
//!
//! The entry point is [`EntryTrampoline::emit`], which classifies a
//! WebAssembly signature under the AArch64 entry ABI and produces the
//! instructions that move parameters from the host's flat array into their
//! ABI locations, call the compiled function, and move results back.

#![deny(missing_docs)]

pub mod buffer;
pub mod isa;
pub mod machinst;
pub mod result;
pub mod trampoline;

pub use crate::buffer::{CodeBuffer, CodeOffset};
pub use crate::machinst::{InstId, InstList, MachInst};
pub use crate::result::{CodegenError, CodegenResult};
pub use crate::trampoline::{CompiledEntry, EntryTrampoline};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

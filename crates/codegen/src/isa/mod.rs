//! Instruction set architectures supported by the trampoline generator.

pub mod aarch64;
pub mod reg;

pub use reg::Reg;

//! AArch64 Instruction Set Architecture.

pub mod abi;
pub mod inst;
pub mod regs;

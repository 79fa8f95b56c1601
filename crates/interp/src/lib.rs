//! A small AArch64 interpreter covering the instructions entry trampolines
//! are made of, and a harness that runs a trampoline against a compiled
//! function body the way a host runtime would.

#![deny(missing_docs)]

pub mod bodies;
pub mod decode;
mod harness;
mod interp;
mod memory;

pub use crate::harness::*;
pub use crate::interp::*;
pub use crate::memory::*;

use thiserror::Error;

/// The reason execution stopped before returning to the host.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// The word at `pc` is not an instruction this interpreter knows.
    #[error("undecodable instruction {word:#010x} at pc {pc:#x}")]
    Undecodable {
        /// Address of the word.
        pc: u64,
        /// The word itself.
        word: u32,
    },

    /// An access touched memory outside the mapped region.
    #[error("out-of-bounds access of {size} bytes at {addr:#x}")]
    OutOfBounds {
        /// First byte accessed.
        addr: u64,
        /// Access width in bytes.
        size: u64,
    },

    /// A memory access used `sp` as its base while `sp` wasn't 16-byte
    /// aligned.
    #[error("misaligned stack pointer {sp:#x} at pc {pc:#x}")]
    MisalignedStack {
        /// Address of the faulting instruction.
        pc: u64,
        /// The stack pointer's value.
        sp: u64,
    },

    /// The program counter isn't 4-byte aligned.
    #[error("misaligned pc {0:#x}")]
    MisalignedPc(u64),

    /// The instruction budget ran out.
    #[error("out of fuel")]
    OutOfFuel,
}

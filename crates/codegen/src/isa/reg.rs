//! Physical registers shared by every backend.

use regalloc2::{PReg, RegClass};

/// A physical register.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reg(PReg);

impl Reg {
    /// Create a register from its physical representation.
    pub const fn new(raw: PReg) -> Self {
        Reg(raw)
    }

    /// Get the encoding of the underlying register.
    pub const fn hw_enc(self) -> u8 {
        self.0.hw_enc() as u8
    }

    /// Get the register class.
    pub const fn class(self) -> RegClass {
        self.0.class()
    }

    /// Checks if the register is an integer register.
    pub fn is_int(self) -> bool {
        self.class() == RegClass::Int
    }

    /// Checks if the register is a float or vector register.
    pub fn is_float(self) -> bool {
        self.class() == RegClass::Float
    }
}

impl From<Reg> for PReg {
    fn from(reg: Reg) -> Self {
        reg.0
    }
}

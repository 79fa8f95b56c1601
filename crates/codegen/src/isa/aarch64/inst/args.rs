//! AArch64 ISA definitions: instruction arguments.

use crate::isa::aarch64::regs::show_ireg_sized;
use crate::isa::reg::Reg;
use entrygen_environ::WasmValType;

/// An operand's size in bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandSize {
    /// 32-bit.
    Size32,
    /// 64-bit.
    Size64,
}

impl OperandSize {
    /// Return the sf bit as used in many instruction encodings.
    pub fn sf_bit(self) -> u32 {
        match self {
            OperandSize::Size32 => 0,
            OperandSize::Size64 => 1,
        }
    }
}

/// Type used to communicate the size of a scalar SIMD & FP operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalarSize {
    /// 32-bit.
    Size32,
    /// 64-bit.
    Size64,
    /// 128-bit.
    Size128,
}

impl ScalarSize {
    /// Size of the operand in bytes.
    pub fn bytes(self) -> u32 {
        match self {
            ScalarSize::Size32 => 4,
            ScalarSize::Size64 => 8,
            ScalarSize::Size128 => 16,
        }
    }

    /// Encoded `ftype` bits of a scalar FP data-processing instruction.
    pub fn ftype(self) -> u32 {
        match self {
            ScalarSize::Size32 => 0b00,
            ScalarSize::Size64 => 0b01,
            ScalarSize::Size128 => panic!("no scalar FP arithmetic on 128-bit values"),
        }
    }
}

/// The width of a load or store and which register file it targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemSize {
    /// Integer register of the given size.
    Int(OperandSize),
    /// Float/vector register of the given size.
    Float(ScalarSize),
}

impl MemSize {
    /// The width used to move a value of type `ty`.
    pub fn for_type(ty: WasmValType) -> Option<MemSize> {
        Some(match ty {
            WasmValType::I32 => MemSize::Int(OperandSize::Size32),
            WasmValType::I64 => MemSize::Int(OperandSize::Size64),
            WasmValType::F32 => MemSize::Float(ScalarSize::Size32),
            WasmValType::F64 => MemSize::Float(ScalarSize::Size64),
            WasmValType::V128 => MemSize::Float(ScalarSize::Size128),
            WasmValType::Ref(_) => return None,
        })
    }

    /// Size of the access in bytes.
    pub fn bytes(self) -> u32 {
        match self {
            MemSize::Int(OperandSize::Size32) => 4,
            MemSize::Int(OperandSize::Size64) => 8,
            MemSize::Float(size) => size.bytes(),
        }
    }

    /// Bits 31..22 of a load/store register instruction, without the
    /// unsigned-offset bit.
    pub(crate) fn ldst_op(self, is_load: bool) -> u32 {
        let op = match self {
            MemSize::Int(OperandSize::Size32) => 0b1011100000,
            MemSize::Int(OperandSize::Size64) => 0b1111100000,
            MemSize::Float(ScalarSize::Size32) => 0b1011110000,
            MemSize::Float(ScalarSize::Size64) => 0b1111110000,
            MemSize::Float(ScalarSize::Size128) => 0b0011110010,
        };
        op | u32::from(is_load)
    }
}

/// An unsigned 12-bit immediate, optionally shifted left by 12, as used by
/// `add`/`sub` (immediate).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Imm12 {
    /// The immediate bits.
    pub bits: u16,
    /// Whether the immediate bits are shifted left by 12 or not.
    pub shift12: bool,
}

impl Imm12 {
    /// Compute a Imm12 from raw bits, if possible.
    pub fn maybe_from_u64(val: u64) -> Option<Imm12> {
        if val & !0xfff == 0 {
            Some(Imm12 {
                bits: val as u16,
                shift12: false,
            })
        } else if val & !(0xfff << 12) == 0 {
            Some(Imm12 {
                bits: (val >> 12) as u16,
                shift12: true,
            })
        } else {
            None
        }
    }

    /// Bits for 2-bit "shift" field in e.g. AddI.
    pub fn shift_bits(&self) -> u32 {
        u32::from(self.shift12)
    }

    /// Bits for 12-bit "imm" field in e.g. AddI.
    pub fn imm_bits(&self) -> u32 {
        u32::from(self.bits)
    }

    /// The value this immediate represents.
    pub fn value(&self) -> u32 {
        u32::from(self.bits) << if self.shift12 { 12 } else { 0 }
    }

    /// Assembly rendering: `#imm` or `#imm, lsl #12`.
    pub fn pretty_print(&self) -> String {
        if self.shift12 {
            format!("#{}, lsl #12", self.bits)
        } else {
            format!("#{}", self.bits)
        }
    }
}

/// A signed, unscaled 9-bit offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SImm9 {
    /// The value.
    pub value: i16,
}

impl SImm9 {
    /// Create a signed 9-bit offset from a full-range value, if possible.
    pub fn maybe_from_i64(value: i64) -> Option<SImm9> {
        if (-256..=255).contains(&value) {
            Some(SImm9 {
                value: value as i16,
            })
        } else {
            None
        }
    }

    /// Bits for encoding.
    pub fn bits(&self) -> u32 {
        (self.value as u32) & 0x1ff
    }

    /// Signed value of immediate.
    pub fn value(&self) -> i32 {
        i32::from(self.value)
    }
}

/// An unsigned 12-bit offset, scaled by the size of the access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UImm12Scaled {
    value: u16,
    scale: u16,
}

impl UImm12Scaled {
    /// Create a UImm12Scaled from a raw offset and the access size, if
    /// possible.
    pub fn maybe_from_i64(value: i64, size: MemSize) -> Option<UImm12Scaled> {
        let scale = i64::from(size.bytes());
        if value >= 0 && value % scale == 0 && value / scale <= 0xfff {
            Some(UImm12Scaled {
                value: value as u16,
                scale: scale as u16,
            })
        } else {
            None
        }
    }

    /// Encoded bits.
    pub fn bits(&self) -> u32 {
        u32::from(self.value / self.scale) & 0xfff
    }

    /// Value after scaling.
    pub fn value(&self) -> u32 {
        u32::from(self.value)
    }
}

/// A shifted immediate value in 'imm16' field of `movz`/`movk`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveWideConst {
    /// Immediate value.
    pub bits: u16,
    /// Shift is in multiples of 16 bits.
    pub shift: u8,
}

impl MoveWideConst {
    /// Construct a MoveWideConst from an arbitrary 64-bit constant if possible.
    pub fn maybe_from_u64(value: u64) -> Option<MoveWideConst> {
        let mask0 = 0x0000_0000_0000_ffffu64;
        let mask1 = 0x0000_0000_ffff_0000u64;
        let mask2 = 0x0000_ffff_0000_0000u64;
        let mask3 = 0xffff_0000_0000_0000u64;

        if value == (value & mask0) {
            return Some(MoveWideConst {
                bits: (value & mask0) as u16,
                shift: 0,
            });
        }
        if value == (value & mask1) {
            return Some(MoveWideConst {
                bits: ((value >> 16) & mask0) as u16,
                shift: 1,
            });
        }
        if value == (value & mask2) {
            return Some(MoveWideConst {
                bits: ((value >> 32) & mask0) as u16,
                shift: 2,
            });
        }
        if value == (value & mask3) {
            return Some(MoveWideConst {
                bits: ((value >> 48) & mask0) as u16,
                shift: 3,
            });
        }
        None
    }

    /// Assembly rendering: `#imm` or `#imm, LSL #shift`.
    pub fn pretty_print(&self) -> String {
        if self.shift == 0 {
            format!("#{}", self.bits)
        } else {
            format!("#{}, LSL #{}", self.bits, self.shift * 16)
        }
    }
}

/// Kinds of move-wide instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoveWideOp {
    /// Move wide with zero.
    MovZ,
    /// Move wide with keep.
    MovK,
}

/// Integer ALU operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ALUOp {
    /// Add.
    Add,
    /// Subtract.
    Sub,
}

impl ALUOp {
    /// Mnemonic.
    pub fn op_str(self) -> &'static str {
        match self {
            ALUOp::Add => "add",
            ALUOp::Sub => "sub",
        }
    }
}

/// Binary scalar floating-point operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FPUOp2 {
    /// Add.
    Add,
}

/// A memory addressing mode that maps directly onto a hardware encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AMode {
    /// Unsigned, scaled 12-bit offset from a base register.
    UnsignedOffset {
        /// Base register.
        rn: Reg,
        /// Offset.
        uimm12: UImm12Scaled,
    },
    /// Signed, unscaled 9-bit offset from a base register (`ldur`/`stur`).
    Unscaled {
        /// Base register.
        rn: Reg,
        /// Offset.
        simm9: SImm9,
    },
    /// Access at the base register, which is then advanced by the offset.
    PostIndexed {
        /// Base register, updated by the access.
        rn: Reg,
        /// Amount to add to the base after the access.
        simm9: SImm9,
    },
    /// Base register plus an unscaled offset register.
    RegReg {
        /// Base register.
        rn: Reg,
        /// Offset register.
        rm: Reg,
    },
}

impl AMode {
    /// The base register.
    pub fn base(&self) -> Reg {
        match *self {
            AMode::UnsignedOffset { rn, .. }
            | AMode::Unscaled { rn, .. }
            | AMode::PostIndexed { rn, .. }
            | AMode::RegReg { rn, .. } => rn,
        }
    }

    /// Whether the access uses the unscaled `ldur`/`stur` form.
    pub fn is_unscaled(&self) -> bool {
        matches!(self, AMode::Unscaled { .. })
    }

    /// Assembly rendering, e.g. `[x25], #8`.
    pub fn pretty_print(&self) -> String {
        let base = show_ireg_sized(self.base(), OperandSize::Size64);
        match self {
            AMode::UnsignedOffset { uimm12, .. } if uimm12.value() == 0 => format!("[{base}]"),
            AMode::UnsignedOffset { uimm12, .. } => format!("[{base}, #{}]", uimm12.value()),
            AMode::Unscaled { simm9, .. } if simm9.value() == 0 => format!("[{base}]"),
            AMode::Unscaled { simm9, .. } => format!("[{base}, #{}]", simm9.value()),
            AMode::PostIndexed { simm9, .. } => format!("[{base}], #{}", simm9.value()),
            AMode::RegReg { rm, .. } => format!(
                "[{base}, {}]",
                show_ireg_sized(*rm, OperandSize::Size64)
            ),
        }
    }
}

//! This module defines aarch64-specific machine instruction types.

use crate::buffer::{CodeBuffer, CodeOffset};
use crate::isa::aarch64::regs::{show_ireg_sized, show_vreg_scalar, sp};
use crate::isa::reg::Reg;
use crate::machinst::MachInst;
use smallvec::{SmallVec, smallvec};

mod args;
pub use self::args::*;
mod emit;
pub use self::emit::*;


/// Instruction formats.
///
/// Only the formats entry trampolines (and the bodies used to exercise
/// them) need are modeled; every one of them encodes to exactly one 32-bit
/// word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inst {
    /// A 64-bit register-to-register move. Either side may be `sp`.
    Mov {
        /// Destination.
        rd: Reg,
        /// Source.
        rm: Reg,
    },

    /// An ALU operation with a register source and an immediate source.
    AluRRImm12 {
        /// The operation.
        alu_op: ALUOp,
        /// Operand size.
        size: OperandSize,
        /// Destination; may be `sp`.
        rd: Reg,
        /// Source; may be `sp`.
        rn: Reg,
        /// Immediate source.
        imm12: Imm12,
    },

    /// An ALU operation with two register sources and a register destination.
    AluRRR {
        /// The operation.
        alu_op: ALUOp,
        /// Operand size.
        size: OperandSize,
        /// Destination.
        rd: Reg,
        /// First source.
        rn: Reg,
        /// Second source.
        rm: Reg,
    },

    /// A MOVZ or MOVK with a 16-bit immediate.
    MovWide {
        /// The operation.
        op: MoveWideOp,
        /// Destination.
        rd: Reg,
        /// The shifted immediate.
        imm: MoveWideConst,
        /// Operand size.
        size: OperandSize,
    },

    /// A load into an integer or float/vector register. Integer loads are
    /// zero-extending.
    Load {
        /// Access width and register file.
        size: MemSize,
        /// Destination.
        rd: Reg,
        /// Address.
        mem: AMode,
    },

    /// A store from an integer or float/vector register.
    Store {
        /// Access width and register file.
        size: MemSize,
        /// Source.
        rd: Reg,
        /// Address.
        mem: AMode,
    },

    /// A binary scalar floating-point operation.
    FpuRRR {
        /// The operation.
        fpu_op: FPUOp2,
        /// Operand size.
        size: ScalarSize,
        /// Destination.
        rd: Reg,
        /// First source.
        rn: Reg,
        /// Second source.
        rm: Reg,
    },

    /// A call whose displacement isn't known yet. Must be replaced by
    /// [`Inst::Call`] before emission.
    CallPlaceholder,

    /// A direct call (`bl`) to a byte displacement from this instruction.
    Call {
        /// Displacement in bytes; a multiple of 4.
        offset: i64,
    },

    /// A return through the link register.
    Ret,
}

impl Inst {
    /// Create a 64-bit move instruction.
    pub fn mov64(rd: Reg, rm: Reg) -> Inst {
        assert!(rd.is_int() && rm.is_int());
        Inst::Mov { rd, rm }
    }

    /// Generic constructor for a load (zero-extending where appropriate).
    pub fn gen_load(rd: Reg, mem: AMode, size: MemSize) -> Inst {
        Inst::Load { size, rd, mem }
    }

    /// Generic constructor for a store.
    pub fn gen_store(mem: AMode, rd: Reg, size: MemSize) -> Inst {
        Inst::Store { size, rd, mem }
    }

    /// Create instructions that load a 64-bit constant into `rd`.
    pub fn load_constant(rd: Reg, value: u64) -> SmallVec<[Inst; 4]> {
        if let Some(imm) = MoveWideConst::maybe_from_u64(value) {
            return smallvec![Inst::MovWide {
                op: MoveWideOp::MovZ,
                rd,
                imm,
                size: OperandSize::Size64,
            }];
        }
        let mut insts = SmallVec::new();
        for i in 0..4u8 {
            let bits = (value >> (16 * i)) as u16;
            if bits == 0 {
                continue;
            }
            let op = if insts.is_empty() {
                MoveWideOp::MovZ
            } else {
                MoveWideOp::MovK
            };
            let imm = MoveWideConst { bits, shift: i };
            insts.push(Inst::MovWide {
                op,
                rd,
                imm,
                size: OperandSize::Size64,
            });
        }
        insts
    }

    fn pretty_print_inst(&self) -> String {
        fn show_mem_reg(reg: Reg, size: MemSize) -> String {
            match size {
                MemSize::Int(size) => show_ireg_sized(reg, size),
                MemSize::Float(size) => show_vreg_scalar(reg, size),
            }
        }

        match self {
            Inst::Mov { rd, rm } => {
                let rd = show_ireg_sized(*rd, OperandSize::Size64);
                let rm = show_ireg_sized(*rm, OperandSize::Size64);
                format!("mov {rd}, {rm}")
            }
            Inst::AluRRImm12 {
                alu_op,
                size,
                rd,
                rn,
                imm12,
            } => {
                let op = alu_op.op_str();
                let rd = show_ireg_sized(*rd, *size);
                let rn = show_ireg_sized(*rn, *size);
                let imm12 = imm12.pretty_print();
                format!("{op} {rd}, {rn}, {imm12}")
            }
            Inst::AluRRR {
                alu_op,
                size,
                rd,
                rn,
                rm,
            } => {
                let op = alu_op.op_str();
                let rd = show_ireg_sized(*rd, *size);
                let rn = show_ireg_sized(*rn, *size);
                let rm = show_ireg_sized(*rm, *size);
                format!("{op} {rd}, {rn}, {rm}")
            }
            Inst::MovWide { op, rd, imm, size } => {
                let op_str = match op {
                    MoveWideOp::MovZ => "movz",
                    MoveWideOp::MovK => "movk",
                };
                let rd = show_ireg_sized(*rd, *size);
                let imm = imm.pretty_print();
                format!("{op_str} {rd}, {imm}")
            }
            Inst::Load { size, rd, mem } => {
                let op = if mem.is_unscaled() { "ldur" } else { "ldr" };
                let rd = show_mem_reg(*rd, *size);
                let mem = mem.pretty_print();
                format!("{op} {rd}, {mem}")
            }
            Inst::Store { size, rd, mem } => {
                let op = if mem.is_unscaled() { "stur" } else { "str" };
                let rd = show_mem_reg(*rd, *size);
                let mem = mem.pretty_print();
                format!("{op} {rd}, {mem}")
            }
            Inst::FpuRRR {
                fpu_op,
                size,
                rd,
                rn,
                rm,
            } => {
                let op = match fpu_op {
                    FPUOp2::Add => "fadd",
                };
                let rd = show_vreg_scalar(*rd, *size);
                let rn = show_vreg_scalar(*rn, *size);
                let rm = show_vreg_scalar(*rm, *size);
                format!("{op} {rd}, {rn}, {rm}")
            }
            Inst::CallPlaceholder => "bl <pending>".to_string(),
            Inst::Call { offset } => format!("bl #{offset}"),
            Inst::Ret => "ret".to_string(),
        }
    }
}

impl MachInst for Inst {
    fn byte_size(&self) -> CodeOffset {
        4
    }

    fn emit(&self, sink: &mut CodeBuffer) {
        emit::emit(self, sink)
    }

    fn pretty_print(&self) -> String {
        self.pretty_print_inst()
    }
}

/// Whether `reg` is the stack pointer, as opposed to the zero register
/// sharing its hardware encoding.
pub(crate) fn is_sp(reg: Reg) -> bool {
    reg == sp()
}

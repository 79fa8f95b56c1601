//! AArch64 ISA: binary code emission.

use crate::buffer::CodeBuffer;
use crate::isa::aarch64::inst::*;
use crate::isa::aarch64::regs::{ip0, zero};
use smallvec::{SmallVec, smallvec};

/// Memory addressing mode finalization: turn a base register plus an
/// arbitrary non-negative byte offset into a real addressing mode, possibly
/// by emitting helper instructions that come immediately before the use of
/// the returned mode.
///
/// The helper instructions only clobber `ip0`.
pub fn mem_finalize(base: Reg, off: i64, size: MemSize) -> (SmallVec<[Inst; 4]>, AMode) {
    if let Some(uimm12) = UImm12Scaled::maybe_from_i64(off, size) {
        (smallvec![], AMode::UnsignedOffset { rn: base, uimm12 })
    } else if let Some(simm9) = SImm9::maybe_from_i64(off) {
        (smallvec![], AMode::Unscaled { rn: base, simm9 })
    } else {
        let tmp = ip0();
        log::trace!("mem_finalize: offset {off} materialized in {tmp:?}");
        let insts = Inst::load_constant(tmp, off as u64);
        (insts, AMode::RegReg { rn: base, rm: tmp })
    }
}

//=============================================================================
// Instructions and subcomponents: emission

fn machreg_to_gpr(m: Reg) -> u32 {
    assert!(m.is_int());
    u32::from(m.hw_enc() & 31)
}

fn machreg_to_vec(m: Reg) -> u32 {
    assert!(m.is_float());
    u32::from(m.hw_enc())
}

fn machreg_to_gpr_or_vec(m: Reg) -> u32 {
    u32::from(m.hw_enc() & 31)
}

pub(crate) fn enc_arith_rrr(bits_31_21: u32, bits_15_10: u32, rd: Reg, rn: Reg, rm: Reg) -> u32 {
    (bits_31_21 << 21)
        | (bits_15_10 << 10)
        | machreg_to_gpr(rd)
        | (machreg_to_gpr(rn) << 5)
        | (machreg_to_gpr(rm) << 16)
}

fn enc_arith_rr_imm12(bits_31_24: u32, immshift: u32, imm12: u32, rn: Reg, rd: Reg) -> u32 {
    (bits_31_24 << 24)
        | (immshift << 22)
        | (imm12 << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr(rd)
}

fn enc_jump26(op_31_26: u32, off_26_0: u32) -> u32 {
    assert!(off_26_0 < (1 << 26));
    (op_31_26 << 26) | off_26_0
}

fn enc_move_wide(op: MoveWideOp, rd: Reg, imm: MoveWideConst, size: OperandSize) -> u32 {
    assert!(imm.shift <= 0b11);
    let op = match op {
        MoveWideOp::MovZ => 0b10,
        MoveWideOp::MovK => 0b11,
    };
    0x12800000
        | size.sf_bit() << 31
        | op << 29
        | u32::from(imm.shift) << 21
        | u32::from(imm.bits) << 5
        | machreg_to_gpr(rd)
}

fn enc_ldst_simm9(op_31_22: u32, simm9: SImm9, op_11_10: u32, rn: Reg, rd: Reg) -> u32 {
    (op_31_22 << 22)
        | (simm9.bits() << 12)
        | (op_11_10 << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr_or_vec(rd)
}

fn enc_ldst_uimm12(op_31_22: u32, uimm12: UImm12Scaled, rn: Reg, rd: Reg) -> u32 {
    (op_31_22 << 22)
        | (0b1 << 24)
        | (uimm12.bits() << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr_or_vec(rd)
}

fn enc_ldst_reg(op_31_22: u32, rn: Reg, rm: Reg, rd: Reg) -> u32 {
    // LSL, unscaled.
    let extend_bits = 0b011;
    (op_31_22 << 22)
        | (1 << 21)
        | (machreg_to_gpr(rm) << 16)
        | (extend_bits << 13)
        | (0b10 << 10)
        | (machreg_to_gpr(rn) << 5)
        | machreg_to_gpr_or_vec(rd)
}

fn enc_fpurrr(top22: u32, rd: Reg, rn: Reg, rm: Reg) -> u32 {
    (top22 << 10) | (machreg_to_vec(rm) << 16) | (machreg_to_vec(rn) << 5) | machreg_to_vec(rd)
}

fn enc_ldst(op: u32, mem: &AMode, rd: Reg) -> u32 {
    match *mem {
        AMode::UnsignedOffset { rn, uimm12 } => enc_ldst_uimm12(op, uimm12, rn, rd),
        AMode::Unscaled { rn, simm9 } => enc_ldst_simm9(op, simm9, 0b00, rn, rd),
        AMode::PostIndexed { rn, simm9 } => {
            // Writeback to the register being transferred is unpredictable.
            assert!(!(rd.is_int() && rd == rn));
            enc_ldst_simm9(op, simm9, 0b01, rn, rd)
        }
        AMode::RegReg { rn, rm } => {
            assert!(!is_sp(rm));
            enc_ldst_reg(op, rn, rm, rd)
        }
    }
}

fn check_mem_reg(size: MemSize, rd: Reg) {
    match size {
        MemSize::Int(_) => assert!(rd.is_int() && !is_sp(rd)),
        MemSize::Float(_) => assert!(rd.is_float()),
    }
}

fn branch_offset(offset: i64) -> u32 {
    assert_eq!(offset % 4, 0, "misaligned branch displacement {offset}");
    let words = offset / 4;
    assert!(
        (-(1 << 25)..(1 << 25)).contains(&words),
        "branch displacement {offset} out of range"
    );
    (words as u32) & 0x3ff_ffff
}

pub(crate) fn emit(inst: &Inst, sink: &mut CodeBuffer) {
    match *inst {
        Inst::Mov { rd, rm } => {
            if is_sp(rd) || is_sp(rm) {
                // `mov` to or from sp is an alias of `add rd, rn, #0`.
                sink.put4(enc_arith_rr_imm12(0b1001_0001, 0, 0, rm, rd));
            } else {
                // `mov` is an alias of `orr rd, xzr, rm`.
                sink.put4(enc_arith_rrr(0b10101010_000, 0, rd, zero(), rm));
            }
        }
        Inst::AluRRImm12 {
            alu_op,
            size,
            rd,
            rn,
            imm12,
        } => {
            let top8 = match alu_op {
                ALUOp::Add => 0b000_10001,
                ALUOp::Sub => 0b010_10001,
            } | (size.sf_bit() << 7);
            sink.put4(enc_arith_rr_imm12(
                top8,
                imm12.shift_bits(),
                imm12.imm_bits(),
                rn,
                rd,
            ));
        }
        Inst::AluRRR {
            alu_op,
            size,
            rd,
            rn,
            rm,
        } => {
            // Register 31 means the zero register here, never sp.
            assert!(!is_sp(rd) && !is_sp(rn) && !is_sp(rm));
            let top11 = match alu_op {
                ALUOp::Add => 0b00001011_000,
                ALUOp::Sub => 0b01001011_000,
            } | (size.sf_bit() << 10);
            sink.put4(enc_arith_rrr(top11, 0, rd, rn, rm));
        }
        Inst::MovWide { op, rd, imm, size } => {
            sink.put4(enc_move_wide(op, rd, imm, size));
        }
        Inst::Load { size, rd, ref mem } => {
            check_mem_reg(size, rd);
            sink.put4(enc_ldst(size.ldst_op(true), mem, rd));
        }
        Inst::Store { size, rd, ref mem } => {
            check_mem_reg(size, rd);
            sink.put4(enc_ldst(size.ldst_op(false), mem, rd));
        }
        Inst::FpuRRR {
            fpu_op,
            size,
            rd,
            rn,
            rm,
        } => {
            let top22 = match fpu_op {
                FPUOp2::Add => 0b000_11110_00_1_00000_001010,
            } | (size.ftype() << 12);
            sink.put4(enc_fpurrr(top22, rd, rn, rm));
        }
        Inst::CallPlaceholder => {
            panic!("call placeholder emitted before its displacement was resolved")
        }
        Inst::Call { offset } => {
            sink.put4(enc_jump26(0b100101, branch_offset(offset)));
        }
        Inst::Ret => {
            sink.put4(0xd65f03c0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::aarch64::regs::{sp, xreg};

    #[test]
    fn finalize_prefers_scaled_offsets() {
        let size = MemSize::Int(OperandSize::Size64);
        let (insts, mem) = mem_finalize(sp(), 32760, size);
        assert!(insts.is_empty());
        assert!(matches!(mem, AMode::UnsignedOffset { .. }));

        let (insts, mem) = mem_finalize(sp(), 12, size);
        assert!(insts.is_empty());
        assert!(matches!(mem, AMode::Unscaled { .. }));

        let (insts, mem) = mem_finalize(sp(), 32768, size);
        assert_eq!(insts.len(), 1);
        assert_eq!(mem, AMode::RegReg { rn: sp(), rm: ip0() });

        let (insts, _) = mem_finalize(xreg(3), 0x1_2345, MemSize::Float(ScalarSize::Size128));
        assert_eq!(insts.len(), 2);
    }

    #[test]
    #[should_panic(expected = "placeholder")]
    fn placeholder_is_not_encodable() {
        emit(&Inst::CallPlaceholder, &mut CodeBuffer::new());
    }
}

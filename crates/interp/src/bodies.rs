//! Stand-in compiled function bodies for exercising entry trampolines.
//!
//! A body is placed right after its trampoline and entered through the
//! trampoline's `bl`. Bodies follow the same classification as the
//! trampoline: arguments in `x`/`v` registers and stack slots above `sp`,
//! results likewise with result stack slots above the argument slots.

use entrygen_codegen::isa::aarch64::abi::{ABIArgKind, ABISig};
use entrygen_codegen::isa::aarch64::inst::{
    ALUOp, FPUOp2, Imm12, Inst, MemSize, OperandSize, ScalarSize, mem_finalize,
};
use entrygen_codegen::isa::aarch64::regs::{float_tmp, sp, vreg, xreg};
use entrygen_codegen::isa::reg::Reg;
use entrygen_codegen::{CodeBuffer, InstList};

// Body scratch registers, clobbered freely: x9 is caller-saved and v16 is
// never an argument register.
fn int_scratch() -> Reg {
    xreg(9)
}

fn float_scratch() -> Reg {
    vreg(16)
}

fn finish(insts: &InstList<Inst>) -> Vec<u8> {
    let mut buffer = CodeBuffer::new();
    insts.emit(&mut buffer);
    buffer.finish()
}

/// `add w0, w2, w3; ret`: the body of `(i32, i32) -> i32` addition with two
/// reserved leading parameters.
pub fn sum_i32() -> Vec<u8> {
    let mut insts = InstList::new();
    insts.push(Inst::AluRRR {
        alu_op: ALUOp::Add,
        size: OperandSize::Size32,
        rd: xreg(0),
        rn: xreg(2),
        rm: xreg(3),
    });
    insts.push(Inst::Ret);
    finish(&insts)
}

/// A body returning its marshaled arguments unchanged: the value at each
/// argument location is copied to the result location of the same position.
///
/// # Panics
///
/// Panics if an argument and the result at the same position differ in type.
pub fn echo(sig: &ABISig) -> Vec<u8> {
    let mut insts = InstList::new();
    // Moving in increasing position order never clobbers a pending source:
    // every integer result register index is below its argument's.
    for (arg, ret) in sig.marshaled_args().iter().zip(&sig.rets) {
        assert_eq!(arg.ty, ret.ty, "echo needs matching types at position {}", ret.index);
        copy(&mut insts, arg.kind, ret.kind, ret.mem_size());
    }
    insts.push(Inst::Ret);
    log::trace!("echo body: {} instructions", insts.len());
    finish(&insts)
}

/// A body returning a changed copy of each marshaled argument at the result
/// position of the same index: integers plus one (wrapping at their width),
/// floats doubled. A `v128` has its low 64 bits doubled as an `f64` and its
/// high 64 bits cleared.
///
/// # Panics
///
/// Panics if an argument and the result at the same position differ in type.
pub fn increment(sig: &ABISig) -> Vec<u8> {
    let mut insts = InstList::new();
    for (arg, ret) in sig.marshaled_args().iter().zip(&sig.rets) {
        assert_eq!(arg.ty, ret.ty, "increment needs matching types at position {}", ret.index);
        let size = ret.mem_size();
        let scratch = match size {
            MemSize::Int(_) => int_scratch(),
            MemSize::Float(_) => float_scratch(),
        };
        let src = match arg.kind {
            ABIArgKind::Reg(reg) => reg,
            ABIArgKind::Stack(offset) => {
                let (pre, mem) = mem_finalize(sp(), i64::from(offset), size);
                insts.extend(pre);
                insts.push(Inst::gen_load(scratch, mem, size));
                scratch
            }
        };
        let dst = match ret.kind {
            ABIArgKind::Reg(reg) => reg,
            ABIArgKind::Stack(_) => scratch,
        };
        insts.push(match size {
            MemSize::Int(size) => Inst::AluRRImm12 {
                alu_op: ALUOp::Add,
                size,
                rd: dst,
                rn: src,
                imm12: Imm12 {
                    bits: 1,
                    shift12: false,
                },
            },
            MemSize::Float(size) => Inst::FpuRRR {
                fpu_op: FPUOp2::Add,
                size: match size {
                    ScalarSize::Size128 => ScalarSize::Size64,
                    size => size,
                },
                rd: dst,
                rn: src,
                rm: src,
            },
        });
        if let ABIArgKind::Stack(offset) = ret.kind {
            let (pre, mem) = mem_finalize(sp(), i64::from(offset), size);
            insts.extend(pre);
            insts.push(Inst::gen_store(mem, scratch, size));
        }
    }
    insts.push(Inst::Ret);
    log::trace!("increment body: {} instructions", insts.len());
    finish(&insts)
}

fn copy(insts: &mut InstList<Inst>, from: ABIArgKind, to: ABIArgKind, size: MemSize) {
    let scratch = match size {
        MemSize::Int(_) => int_scratch(),
        MemSize::Float(_) => float_scratch(),
    };
    match (from, to) {
        (ABIArgKind::Reg(src), ABIArgKind::Reg(dst)) if src == dst => {}
        (ABIArgKind::Reg(src), ABIArgKind::Reg(dst)) => match size {
            MemSize::Int(_) => {
                insts.push(Inst::mov64(dst, src));
            }
            MemSize::Float(_) => {
                unreachable!("float arguments and results share registers position by position")
            }
        },
        (ABIArgKind::Stack(offset), ABIArgKind::Reg(dst)) => {
            let (pre, mem) = mem_finalize(sp(), i64::from(offset), size);
            insts.extend(pre);
            insts.push(Inst::gen_load(dst, mem, size));
        }
        (ABIArgKind::Reg(src), ABIArgKind::Stack(offset)) => {
            let (pre, mem) = mem_finalize(sp(), i64::from(offset), size);
            insts.extend(pre);
            insts.push(Inst::gen_store(mem, src, size));
        }
        (ABIArgKind::Stack(a), ABIArgKind::Stack(b)) => {
            let (pre, mem) = mem_finalize(sp(), i64::from(a), size);
            insts.extend(pre);
            insts.push(Inst::gen_load(scratch, mem, size));
            let (pre, mem) = mem_finalize(sp(), i64::from(b), size);
            insts.extend(pre);
            insts.push(Inst::gen_store(mem, scratch, size));
        }
    }
}

// The trampoline's float scratch must survive the body.
const _: () = assert!(float_tmp().hw_enc() != 16);

//! AArch64 register definition.

use crate::isa::aarch64::inst::{OperandSize, ScalarSize};
use crate::isa::reg::Reg;
use regalloc2::{PReg, RegClass};

/// FPR index bound.
pub(crate) const MAX_FPR: u32 = 32;
/// GPR index bound.
pub(crate) const MAX_GPR: u32 = 32;

/// Construct a X-register from an index.
pub const fn xreg(num: u8) -> Reg {
    assert!((num as u32) < MAX_GPR);
    Reg::new(PReg::new(num as usize, RegClass::Int))
}

/// Construct a V-register from an index.
pub const fn vreg(num: u8) -> Reg {
    assert!((num as u32) < MAX_FPR);
    Reg::new(PReg::new(num as usize, RegClass::Float))
}

/// Scratch register.
/// Intra-procedure-call corruptible register, used to materialize
/// addresses that don't fit an immediate addressing mode.
pub const fn ip0() -> Reg {
    xreg(16)
}

/// Frame pointer register.
pub const fn fp() -> Reg {
    xreg(29)
}

/// Link register for function calls.
pub const fn lr() -> Reg {
    xreg(30)
}

/// Zero register.
pub const fn zero() -> Reg {
    xreg(31)
}

/// Stack pointer register.
///
/// In aarch64 the zero and stack pointer registers are contextually
/// different but have the same hardware encoding; to differentiate
/// them, the stack pointer is represented as 31 + 32.
pub const fn sp() -> Reg {
    Reg::new(PReg::new(31 + 32, RegClass::Int))
}

/// Execution context pointer, as passed in by the host.
pub const fn execution_context_ptr() -> Reg {
    xreg(0)
}

/// Module context pointer, as passed in by the host.
pub const fn module_context_ptr() -> Reg {
    xreg(1)
}

/// Pointer to the flat parameter/result array. Callee-saved, so it still
/// points at the array base when the compiled function returns.
pub const fn param_result_ptr() -> Reg {
    xreg(19)
}

/// Copy of the execution context pointer that survives the call; the
/// epilogue restores the host state through it.
pub const fn saved_execution_context_ptr() -> Reg {
    xreg(20)
}

/// Copy of the flat array pointer advanced while marshaling arguments.
pub const fn param_result_ptr_copy() -> Reg {
    xreg(25)
}

/// Top of the scratch stack allocated by the host.
pub const fn host_allocated_stack_ptr() -> Reg {
    xreg(26)
}

/// Integer scratch register.
pub const fn tmp() -> Reg {
    xreg(27)
}

/// Float/vector scratch register.
pub const fn float_tmp() -> Reg {
    vreg(15)
}

/// Integer argument and result registers, in assignment order.
pub const INT_ARG_REGS: [Reg; 8] = [
    xreg(0),
    xreg(1),
    xreg(2),
    xreg(3),
    xreg(4),
    xreg(5),
    xreg(6),
    xreg(7),
];

/// Float/vector argument and result registers, in assignment order.
pub const FLOAT_ARG_REGS: [Reg; 8] = [
    vreg(0),
    vreg(1),
    vreg(2),
    vreg(3),
    vreg(4),
    vreg(5),
    vreg(6),
    vreg(7),
];

/// Registers with a fixed role in every entry trampoline, and that role.
///
/// `x0` and `x1` are not listed: they carry the reserved leading
/// parameters and are classified like any other argument.
pub const TRAMPOLINE_REGS: [(Reg, &str); 9] = [
    (param_result_ptr(), "param/result array"),
    (saved_execution_context_ptr(), "saved execution context"),
    (param_result_ptr_copy(), "param/result array copy"),
    (host_allocated_stack_ptr(), "scratch stack"),
    (tmp(), "integer scratch"),
    (float_tmp(), "float scratch"),
    (ip0(), "address scratch"),
    (fp(), "frame pointer"),
    (lr(), "link register"),
];

const fn mask(regs: &[Reg], class_is_int: bool) -> u32 {
    let mut bits = 0;
    let mut i = 0;
    while i < regs.len() {
        let is_int = matches!(regs[i].class(), RegClass::Int);
        if is_int == class_is_int {
            bits |= 1 << (regs[i].hw_enc() & 31);
        }
        i += 1;
    }
    bits
}

const fn trampoline_regs() -> [Reg; TRAMPOLINE_REGS.len()] {
    let mut regs = [zero(); TRAMPOLINE_REGS.len()];
    let mut i = 0;
    while i < regs.len() {
        regs[i] = TRAMPOLINE_REGS[i].0;
        i += 1;
    }
    regs
}

/// Bitmask of the GPRs the trampoline reserves.
pub const TRAMPOLINE_GPR: u32 = mask(&trampoline_regs(), true);
/// Bitmask of the FPRs the trampoline reserves.
pub const TRAMPOLINE_FPR: u32 = mask(&trampoline_regs(), false);
/// Bitmask of the GPRs the classifier assigns.
pub const ARG_GPR: u32 = mask(&INT_ARG_REGS, true);
/// Bitmask of the FPRs the classifier assigns.
pub const ARG_FPR: u32 = mask(&FLOAT_ARG_REGS, false);

// The trampoline's fixed registers must never hold a classified value.
const _: () = assert!(TRAMPOLINE_GPR & ARG_GPR == 0);
const _: () = assert!(TRAMPOLINE_FPR & ARG_FPR == 0);

/// Renders an integer register at the given width: `x3`/`w3`, `sp`/`wsp`,
/// `xzr`/`wzr`.
pub fn show_ireg_sized(reg: Reg, size: OperandSize) -> String {
    debug_assert!(reg.is_int());
    let prefix = match size {
        OperandSize::Size32 => "w",
        OperandSize::Size64 => "x",
    };
    match reg.hw_enc() {
        63 => match size {
            OperandSize::Size32 => "wsp".to_string(),
            OperandSize::Size64 => "sp".to_string(),
        },
        31 => format!("{prefix}zr"),
        n => format!("{prefix}{n}"),
    }
}

/// Renders a float/vector register viewed as a scalar: `s15`, `d0`, `q1`.
pub fn show_vreg_scalar(reg: Reg, size: ScalarSize) -> String {
    debug_assert!(reg.is_float());
    let prefix = match size {
        ScalarSize::Size32 => "s",
        ScalarSize::Size64 => "d",
        ScalarSize::Size128 => "q",
    };
    format!("{prefix}{}", reg.hw_enc())
}

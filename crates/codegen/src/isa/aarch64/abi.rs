//! Implementation of the entry ABI for AArch64: assigns every parameter and
//! result of a signature to a register or a stack slot.

use crate::isa::aarch64::inst::MemSize;
use crate::isa::aarch64::regs::{FLOAT_ARG_REGS, INT_ARG_REGS};
use crate::isa::reg::Reg;
use crate::result::{CodegenError, CodegenResult};
use entrygen_environ::{WasmFuncType, WasmValType};

/// Where a value lives at the call boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ABIArgKind {
    /// In a register.
    Reg(Reg),
    /// In a stack slot at this byte offset from the stack pointer.
    Stack(u32),
}

/// A classified parameter or result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ABIArg {
    /// Position in the parameter or result list.
    pub index: usize,
    /// The value type.
    pub ty: WasmValType,
    /// The assigned location.
    pub kind: ABIArgKind,
}

impl ABIArg {
    /// Width and register file used to move this value.
    pub fn mem_size(&self) -> MemSize {
        match MemSize::for_type(self.ty) {
            Some(size) => size,
            // Classification rejects every type without a width.
            None => unreachable!("classified value of type {}", self.ty),
        }
    }

    /// Bytes this value occupies in the flat parameter/result array.
    pub fn flat_slot_size(&self) -> u32 {
        self.ty.flat_slot_size()
    }
}

/// A signature with every parameter and result classified.
///
/// The parameter list starts with `reserved_params` pointer-sized values
/// that the host has already placed in registers before entering compiled
/// code; the remaining parameters and all results come from the flat array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ABISig {
    /// Classified parameters, reserved ones first.
    pub args: Vec<ABIArg>,
    /// Classified results.
    pub rets: Vec<ABIArg>,
    /// Number of leading parameters already resident in registers.
    pub reserved_params: usize,
    /// Bytes of stack used by parameters.
    pub arg_stack_size: u32,
    /// Bytes of stack used by results.
    pub ret_stack_size: u32,
}

impl ABISig {
    /// Classifies `sig`, prefixed by `reserved_params` 64-bit pointer
    /// parameters.
    pub fn from_wasm(sig: &WasmFuncType, reserved_params: usize) -> CodegenResult<ABISig> {
        if reserved_params > INT_ARG_REGS.len() {
            return Err(CodegenError::TooManyReservedParams(reserved_params));
        }
        let params: Vec<WasmValType> = core::iter::repeat_n(WasmValType::I64, reserved_params)
            .chain(sig.params().iter().copied())
            .collect();
        let (args, arg_stack_size) = classify(&params)?;
        let (mut rets, ret_stack_size) = classify(sig.returns())?;

        // Result slots live above the argument slots.
        for ret in rets.iter_mut() {
            if let ABIArgKind::Stack(offset) = &mut ret.kind {
                *offset += arg_stack_size;
            }
        }

        let abi = ABISig {
            args,
            rets,
            reserved_params,
            arg_stack_size,
            ret_stack_size,
        };
        log::trace!("classified {sig}: {abi:?}");
        Ok(abi)
    }

    /// The parameters loaded from the flat array.
    pub fn marshaled_args(&self) -> &[ABIArg] {
        &self.args[self.reserved_params..]
    }

    /// Bytes of the flat array the host must provide: parameters and results
    /// share it, so it must fit the larger of the two.
    pub fn flat_array_size(&self) -> u32 {
        let params: u32 = self.marshaled_args().iter().map(|a| a.flat_slot_size()).sum();
        let results: u32 = self.rets.iter().map(|r| r.flat_slot_size()).sum();
        params.max(results)
    }

    /// Stack bytes needed for parameters and results, rounded up to keep
    /// the stack pointer 16-byte aligned.
    pub fn aligned_arg_result_stack_size(&self) -> u32 {
        (self.arg_stack_size + self.ret_stack_size + 15) & !15
    }
}

fn classify(types: &[WasmValType]) -> CodegenResult<(Vec<ABIArg>, u32)> {
    let mut next_x = 0;
    let mut next_v = 0;
    let mut stack_offset = 0u32;
    let mut out = Vec::with_capacity(types.len());

    for (index, &ty) in types.iter().enumerate() {
        let (regs, next) = match ty {
            WasmValType::I32 | WasmValType::I64 => (&INT_ARG_REGS, &mut next_x),
            WasmValType::F32 | WasmValType::F64 | WasmValType::V128 => {
                (&FLOAT_ARG_REGS, &mut next_v)
            }
            WasmValType::Ref(_) => return Err(CodegenError::UnsupportedType(ty)),
        };
        let kind = match regs.get(*next) {
            Some(reg) => {
                *next += 1;
                ABIArgKind::Reg(*reg)
            }
            None => {
                let offset = stack_offset;
                // Slots are at least 8 bytes; vectors take 16.
                stack_offset += if ty == WasmValType::V128 { 16 } else { 8 };
                ABIArgKind::Stack(offset)
            }
        };
        out.push(ABIArg { index, ty, kind });
    }
    Ok((out, stack_offset))
}

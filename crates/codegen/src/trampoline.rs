//! Entry trampolines: the glue that lets a host runtime call compiled code.
//!
//! The host enters a trampoline with
//!
//! * the execution context pointer in `x0` and the module context pointer
//!   in `x1`,
//! * a pointer to the flat parameter/result array in `x19`,
//! * the top of a host-allocated scratch stack in `x26`,
//!
//! and its own frame pointer, stack pointer and return address live in
//! `fp`, `sp` and `lr`. The trampoline stashes those three in the execution
//! context record, switches to the scratch stack, moves the parameters from
//! the array into their ABI locations, calls the compiled function placed
//! directly after the trampoline, writes the results back to the array and
//! restores the host's state from the record.
//!
//! ```text
//! +---------------------+ <- 0
//! | prologue            |
//! | argument marshaling |
//! | bl body ------------+--+
//! | result marshaling   |  |
//! | epilogue, ret       |  |
//! +---------------------+ <+ body_offset
//! | compiled function   |
//! ```

use crate::buffer::{CodeBuffer, CodeOffset};
use crate::isa::aarch64::abi::{ABIArg, ABIArgKind, ABISig};
use crate::isa::aarch64::inst::{ALUOp, AMode, Imm12, Inst, MemSize, OperandSize, SImm9, mem_finalize};
use crate::isa::aarch64::regs;
use crate::isa::reg::Reg;
use crate::machinst::{InstId, InstList, MachInst};
use crate::result::{CodegenError, CodegenResult};
use entrygen_environ::{Tunables, WasmFuncType};
use std::fmt::Write;

/// A finalized entry trampoline.
#[derive(Clone, Debug)]
pub struct CompiledEntry {
    /// The classified signature the trampoline marshals.
    pub sig: ABISig,
    /// The trampoline's instructions, with the call displacement resolved.
    pub insts: InstList<Inst>,
    /// Offset of the call to the compiled function.
    pub call_site: CodeOffset,
    /// Offset right past the trampoline, where the compiled function must be
    /// placed.
    pub body_offset: CodeOffset,
}

impl CompiledEntry {
    /// Encodes the trampoline.
    pub fn emit(&self) -> Vec<u8> {
        let mut buffer = CodeBuffer::new();
        self.insts.emit(&mut buffer);
        debug_assert_eq!(buffer.cur_offset(), self.body_offset);
        buffer.finish()
    }

    /// Renders the trampoline as assembly, one instruction per line prefixed
    /// with its offset.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (offset, _, inst) in self.insts.iter_with_offsets() {
            let _ = writeln!(out, "{offset:>4}: {}", inst.pretty_print());
        }
        out
    }

    /// The instructions' assembly text in order, without offsets.
    pub fn assembly(&self) -> Vec<String> {
        self.insts
            .iter()
            .map(|(_, inst)| inst.pretty_print())
            .collect()
    }
}

/// Builder for the entry trampoline of one signature.
///
/// Each trampoline is built in its own instruction list; nothing is shared
/// between builders.
pub struct EntryTrampoline<'a> {
    insts: InstList<Inst>,
    sig: ABISig,
    tunables: &'a Tunables,
}

impl<'a> EntryTrampoline<'a> {
    /// Generates the entry trampoline for `sig`.
    pub fn emit(sig: &WasmFuncType, tunables: &'a Tunables) -> CodegenResult<CompiledEntry> {
        let abi = ABISig::from_wasm(sig, tunables.reserved_params)?;
        let mut trampoline = EntryTrampoline {
            insts: InstList::new(),
            sig: abi,
            tunables,
        };
        let call = trampoline.emit_body()?;
        let entry = trampoline.finalize(call);
        log::debug!(
            "entry trampoline for {sig}: {} instructions, call at {}, body at {}",
            entry.insts.len(),
            entry.call_site,
            entry.body_offset
        );
        Ok(entry)
    }

    /// Emits everything up to and including `ret`, returning the call
    /// placeholder.
    fn emit_body(&mut self) -> CodegenResult<InstId> {
        let ctx = self.tunables.execution_context;

        // Keep the execution context pointer in a callee-saved register so
        // the epilogue can still reach it, then hand the host's fp, sp and lr
        // over to the record. sp can't be stored directly.
        self.move64(regs::saved_execution_context_ptr(), regs::execution_context_ptr());
        self.save_or_load(regs::fp(), ctx.original_frame_pointer, true);
        self.move64(regs::tmp(), regs::sp());
        self.save_or_load(regs::tmp(), ctx.original_stack_pointer, true);
        self.save_or_load(regs::lr(), ctx.host_return_address, true);

        // Carve the argument/result area out of the scratch stack and switch
        // to it.
        let stack_size = self.sig.aligned_arg_result_stack_size();
        if stack_size > 0 {
            let imm12 = Imm12::maybe_from_u64(u64::from(stack_size))
                .ok_or(CodegenError::StackSlotTooLarge(stack_size))?;
            let stack = regs::host_allocated_stack_ptr();
            self.insts.push(Inst::AluRRImm12 {
                alu_op: ALUOp::Sub,
                size: OperandSize::Size64,
                rd: stack,
                rn: stack,
                imm12,
            });
        }
        self.move64(regs::sp(), regs::host_allocated_stack_ptr());

        // Argument marshaling advances the array pointer, and results must be
        // written from the array's base, so marshal from a copy when both
        // happen.
        let mut array_ptr = regs::param_result_ptr();
        if self.sig.args.len() > self.sig.reserved_params && !self.sig.rets.is_empty() {
            self.move64(regs::param_result_ptr_copy(), regs::param_result_ptr());
            array_ptr = regs::param_result_ptr_copy();
        }
        for arg in self.sig.marshaled_args() {
            pass_arg(&mut self.insts, array_ptr, arg);
        }

        // The displacement to the compiled function depends on the size of
        // everything emitted after the call.
        let call = self.insts.push(Inst::CallPlaceholder);

        for ret in &self.sig.rets {
            pass_result(&mut self.insts, regs::param_result_ptr(), ret);
        }

        self.save_or_load(regs::fp(), ctx.original_frame_pointer, false);
        self.save_or_load(regs::tmp(), ctx.original_stack_pointer, false);
        self.move64(regs::sp(), regs::tmp());
        self.save_or_load(regs::lr(), ctx.host_return_address, false);
        self.insts.push(Inst::Ret);

        Ok(call)
    }

    /// Resolves the call displacement now that the size of the trampoline is
    /// known.
    fn finalize(mut self, call: InstId) -> CompiledEntry {
        let mut call_site = 0;
        let mut body_offset = 0;
        for (id, inst) in self.insts.iter() {
            if id == call {
                call_site = body_offset;
            }
            body_offset += inst.byte_size();
        }
        let offset = i64::from(body_offset) - i64::from(call_site);
        log::trace!("call at {call_site}, body at {body_offset}: bl #{offset}");
        self.insts.replace(call, Inst::Call { offset });
        CompiledEntry {
            sig: self.sig,
            insts: self.insts,
            call_site,
            body_offset,
        }
    }

    fn move64(&mut self, dst: Reg, src: Reg) {
        self.insts.push(Inst::mov64(dst, src));
    }

    /// Stores `reg` to, or loads it from, a field of the execution context
    /// record.
    fn save_or_load(&mut self, reg: Reg, offset: u32, is_save: bool) {
        let size = MemSize::Int(OperandSize::Size64);
        let (insts, mem) =
            mem_finalize(regs::saved_execution_context_ptr(), i64::from(offset), size);
        self.insts.extend(insts);
        self.insts.push(if is_save {
            Inst::gen_store(mem, reg, size)
        } else {
            Inst::gen_load(reg, mem, size)
        });
    }
}

fn scratch_for(arg: &ABIArg) -> Reg {
    match arg.mem_size() {
        MemSize::Int(_) => regs::tmp(),
        MemSize::Float(_) => regs::float_tmp(),
    }
}

fn post_index(ptr: Reg, arg: &ABIArg) -> AMode {
    let simm9 = SImm9::maybe_from_i64(i64::from(arg.flat_slot_size()));
    match simm9 {
        Some(simm9) => AMode::PostIndexed { rn: ptr, simm9 },
        None => unreachable!("flat slots are 8 or 16 bytes"),
    }
}

/// Loads `arg` from the array at `ptr` into its register, or through a
/// scratch register into its stack slot.
fn pass_arg(insts: &mut InstList<Inst>, ptr: Reg, arg: &ABIArg) {
    let size = arg.mem_size();
    let target = match arg.kind {
        ABIArgKind::Reg(reg) => reg,
        ABIArgKind::Stack(_) => scratch_for(arg),
    };
    insts.push(Inst::gen_load(target, post_index(ptr, arg), size));

    if let ABIArgKind::Stack(offset) = arg.kind {
        let (pre, mem) = mem_finalize(regs::sp(), i64::from(offset), size);
        insts.extend(pre);
        insts.push(Inst::gen_store(mem, target, size));
    }
}

fn pass_result(insts: &mut InstList<Inst>, ptr: Reg, ret: &ABIArg) {
    let size = ret.mem_size();
    let source = match ret.kind {
        ABIArgKind::Reg(reg) => reg,
        ABIArgKind::Stack(offset) => {
            let tmp = scratch_for(ret);
            let (pre, mem) = mem_finalize(regs::sp(), i64::from(offset), size);
            insts.extend(pre);
            insts.push(Inst::gen_load(tmp, mem, size));
            tmp
        }
    };
    insts.push(Inst::gen_store(post_index(ptr, ret), source, size));
}

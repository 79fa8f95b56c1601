//! Running an entry trampoline the way a host runtime would.

use crate::Trap;
use crate::interp::{MachineState, Vm};
use crate::memory::Memory;
use entrygen_codegen::CompiledEntry;
use entrygen_environ::{ExecutionContext, Tunables};

/// Where the harness maps its memory.
pub const MEMORY_BASE: u64 = 0x10_0000;

/// The return address the host enters the trampoline with. Execution stops
/// when control reaches it.
pub const HOST_RETURN_ADDRESS: u64 = 0xffff_fff0;

/// The frame pointer the host enters the trampoline with.
pub const HOST_FRAME_POINTER: u64 = 0x7fff_f00d_0000;

const HOST_STACK_SIZE: u64 = 4096;
const MODULE_CONTEXT_SIZE: u64 = 64;

/// The host's `fp`, `sp` and `lr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRegisters {
    /// Frame pointer.
    pub fp: u64,
    /// Stack pointer.
    pub sp: u64,
    /// Link register.
    pub lr: u64,
}

/// Addresses of the regions a call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessLayout {
    /// The trampoline, immediately followed by the body.
    pub code: u64,
    /// The execution context record.
    pub execution_context: u64,
    /// The module context.
    pub module_context: u64,
    /// The flat parameter/result array.
    pub flat_array: u64,
    /// Top of the host's own stack.
    pub host_stack_top: u64,
    /// Bottom of the scratch stack.
    pub scratch_stack_bottom: u64,
    /// Top of the scratch stack.
    pub scratch_stack_top: u64,
}

/// Everything observable after a call returned to the host.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// The flat array after the call; results start at slot 0.
    pub flat: Vec<u64>,
    /// Host registers when the trampoline was entered.
    pub entry: HostRegisters,
    /// Host registers when control came back.
    pub exit: HostRegisters,
    /// The registers as saved in the execution context record.
    pub saved: HostRegisters,
    /// Where everything was mapped.
    pub layout: HarnessLayout,
    /// The machine state when control came back.
    pub state: MachineState,
    /// Instructions executed.
    pub steps: u64,
}

/// Calls trampolines through the interpreter.
#[derive(Debug, Clone)]
pub struct EntryHarness {
    tunables: Tunables,
    fuel: u64,
}

impl EntryHarness {
    /// Creates a harness laying out execution contexts and scratch stacks
    /// according to `tunables`.
    pub fn new(tunables: &Tunables) -> Self {
        Self {
            tunables: tunables.clone(),
            fuel: crate::DEFAULT_FUEL,
        }
    }

    /// Sets the instruction budget of each call.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = fuel;
        self
    }

    /// Runs `entry` with `body` placed right after it. `params` fill the
    /// start of the flat array, which is large enough for the signature's
    /// parameters and results.
    pub fn call(
        &self,
        entry: &CompiledEntry,
        body: &[u8],
        params: &[u64],
    ) -> Result<CallOutcome, Trap> {
        let mut code = entry.emit();
        debug_assert_eq!(code.len() as u64, u64::from(entry.body_offset));
        code.extend_from_slice(body);

        let ctx = &self.tunables.execution_context;
        let record_size = u64::from(ctx.record_size().max(ExecutionContext::SIZE));
        let flat_slots = (entry.sig.flat_array_size() as usize / 8).max(params.len());
        let scratch_size = u64::from(self.tunables.scratch_stack_size);

        let total = code.len() as u64
            + record_size
            + MODULE_CONTEXT_SIZE
            + 8 * flat_slots as u64
            + HOST_STACK_SIZE
            + scratch_size
            + 5 * 16;
        let mut memory = Memory::new(MEMORY_BASE, total as usize);
        let mut alloc = |size: u64| {
            memory.alloc(size, 16).ok_or(Trap::OutOfBounds {
                addr: memory.end(),
                size,
            })
        };
        // The scratch stack comes first so that overrunning it faults.
        let scratch_stack_bottom = alloc(scratch_size)?;
        let code_addr = alloc(code.len() as u64)?;
        let execution_context = alloc(record_size)?;
        let module_context = alloc(MODULE_CONTEXT_SIZE)?;
        let flat_array = alloc(8 * flat_slots as u64)?;
        let host_stack = alloc(HOST_STACK_SIZE)?;
        let layout = HarnessLayout {
            code: code_addr,
            execution_context,
            module_context,
            flat_array,
            host_stack_top: host_stack + HOST_STACK_SIZE,
            scratch_stack_bottom,
            scratch_stack_top: scratch_stack_bottom + scratch_size,
        };
        log::debug!("harness layout: {layout:x?}");

        memory.write_bytes(code_addr, &code)?;
        for (i, param) in params.iter().enumerate() {
            memory.store_u64(flat_array + 8 * i as u64, *param)?;
        }

        let entry_regs = HostRegisters {
            fp: HOST_FRAME_POINTER,
            sp: layout.host_stack_top,
            lr: HOST_RETURN_ADDRESS,
        };
        let mut vm = Vm::new(memory);
        vm.set_fuel(self.fuel);
        let state = vm.state_mut();
        state.set_x(0, execution_context);
        state.set_x(1, module_context);
        state.set_x(19, flat_array);
        state.set_x(26, layout.scratch_stack_top);
        state.set_x(29, entry_regs.fp);
        state.set_x(30, entry_regs.lr);
        state.set_sp(entry_regs.sp);

        let steps = vm.run(code_addr, HOST_RETURN_ADDRESS)?;

        let state = vm.state().clone();
        let memory = vm.memory();
        let exit = HostRegisters {
            fp: state.fp(),
            sp: state.sp(),
            lr: state.lr(),
        };
        let saved = HostRegisters {
            fp: memory.load_u64(execution_context + u64::from(ctx.original_frame_pointer))?,
            sp: memory.load_u64(execution_context + u64::from(ctx.original_stack_pointer))?,
            lr: memory.load_u64(execution_context + u64::from(ctx.host_return_address))?,
        };
        let flat = (0..flat_slots)
            .map(|i| memory.load_u64(flat_array + 8 * i as u64))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("call returned after {steps} instructions: {flat:x?}");

        Ok(CallOutcome {
            flat,
            entry: entry_regs,
            exit,
            saved,
            layout,
            state,
            steps,
        })
    }
}

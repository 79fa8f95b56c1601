//! Interpretation of AArch64 machine code.

use crate::Trap;
use crate::decode::{Addr, LdStKind, Op, XReg, decode};
use crate::memory::Memory;
use core::fmt;
use core::ops::ControlFlow;

/// Instruction budget of a fresh [`Vm`].
pub const DEFAULT_FUEL: u64 = 1 << 20;

/// The architectural register state.
#[derive(Clone, PartialEq, Eq)]
pub struct MachineState {
    x_regs: [u64; 31],
    sp: u64,
    v_regs: [u128; 32],
    pc: u64,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            x_regs: [0; 31],
            sp: 0,
            v_regs: [0; 32],
            pc: 0,
        }
    }
}

impl fmt::Debug for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct RegMap<'a, R>(&'a [R], char);

        impl<R: fmt::LowerHex> fmt::Debug for RegMap<'_, R> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut f = f.debug_map();
                for (i, r) in self.0.iter().enumerate() {
                    f.entry(&format_args!("{}{i}", self.1), &format_args!("{r:#x}"));
                }
                f.finish()
            }
        }

        f.debug_struct("MachineState")
            .field("pc", &format_args!("{:#x}", self.pc))
            .field("sp", &format_args!("{:#x}", self.sp))
            .field("x_regs", &RegMap(&self.x_regs, 'x'))
            .field("v_regs", &RegMap(&self.v_regs, 'v'))
            .finish()
    }
}

impl MachineState {
    /// Reads `x<n>`; `n == 31` reads the zero register.
    pub fn x(&self, n: u8) -> u64 {
        self.x_regs.get(usize::from(n)).copied().unwrap_or(0)
    }

    /// Writes `x<n>`; writes to `n == 31` are discarded.
    pub fn set_x(&mut self, n: u8, value: u64) {
        if let Some(reg) = self.x_regs.get_mut(usize::from(n)) {
            *reg = value;
        }
    }

    /// Reads `v<n>` as a full 128-bit value.
    pub fn v(&self, n: u8) -> u128 {
        self.v_regs[usize::from(n & 31)]
    }

    /// Writes `v<n>` as a full 128-bit value.
    pub fn set_v(&mut self, n: u8, value: u128) {
        self.v_regs[usize::from(n & 31)] = value;
    }

    /// The stack pointer.
    pub fn sp(&self) -> u64 {
        self.sp
    }

    /// Sets the stack pointer.
    pub fn set_sp(&mut self, value: u64) {
        self.sp = value;
    }

    /// The program counter.
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// Sets the program counter.
    pub fn set_pc(&mut self, value: u64) {
        self.pc = value;
    }

    /// The frame pointer, `x29`.
    pub fn fp(&self) -> u64 {
        self.x(29)
    }

    /// The link register, `x30`.
    pub fn lr(&self) -> u64 {
        self.x(30)
    }

    fn get(&self, reg: XReg) -> u64 {
        match reg {
            XReg::X(n) => self.x(n),
            XReg::Sp => self.sp,
            XReg::Zr => 0,
        }
    }

    fn set(&mut self, reg: XReg, value: u64) {
        match reg {
            XReg::X(n) => self.set_x(n, value),
            XReg::Sp => self.sp = value,
            XReg::Zr => {}
        }
    }
}

/// A virtual machine interpreting AArch64 code held in its own [`Memory`].
#[derive(Debug)]
pub struct Vm {
    state: MachineState,
    memory: Memory,
    fuel: u64,
}

impl Vm {
    /// Creates a machine with zeroed registers over `memory`.
    pub fn new(memory: Memory) -> Self {
        Self {
            state: MachineState::default(),
            memory,
            fuel: DEFAULT_FUEL,
        }
    }

    /// Get a shared reference to this VM's machine state.
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Get an exclusive reference to this VM's machine state.
    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    /// The VM's memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// The VM's memory, mutably.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Instructions left before [`Trap::OutOfFuel`].
    pub fn fuel(&self) -> u64 {
        self.fuel
    }

    /// Sets the instruction budget.
    pub fn set_fuel(&mut self, fuel: u64) {
        self.fuel = fuel;
    }

    /// Runs from `entry` until control reaches `return_address`, returning
    /// the number of instructions executed.
    pub fn run(&mut self, entry: u64, return_address: u64) -> Result<u64, Trap> {
        self.state.pc = entry;
        let mut steps = 0;
        loop {
            if self.state.pc == return_address {
                log::trace!("returned to host after {steps} instructions");
                return Ok(steps);
            }
            if self.fuel == 0 {
                return Err(Trap::OutOfFuel);
            }
            self.fuel -= 1;
            steps += 1;
            if let ControlFlow::Break(trap) = self.step() {
                log::debug!("trap after {steps} instructions: {trap}");
                return Err(trap);
            }
        }
    }

    fn step(&mut self) -> ControlFlow<Trap> {
        let pc = self.state.pc;
        if pc % 4 != 0 {
            return ControlFlow::Break(Trap::MisalignedPc(pc));
        }
        let word = match self.memory.load_u32(pc) {
            Ok(word) => word,
            Err(trap) => return ControlFlow::Break(trap),
        };
        let Some(op) = decode(word) else {
            return ControlFlow::Break(Trap::Undecodable { pc, word });
        };
        log::trace!("{pc:#x}: {op}");
        match self.execute(pc, op) {
            Ok(next) => {
                self.state.pc = next;
                ControlFlow::Continue(())
            }
            Err(trap) => ControlFlow::Break(trap),
        }
    }

    /// Executes `op` found at `pc`, returning the next pc.
    fn execute(&mut self, pc: u64, op: Op) -> Result<u64, Trap> {
        let state = &mut self.state;
        let next = pc.wrapping_add(4);
        match op {
            Op::OrrReg { sf, rd, rn, rm } => {
                let value = state.get(rn) | state.get(rm);
                state.set(rd, truncate(sf, value));
            }
            Op::AddSubImm {
                sf,
                sub,
                rd,
                rn,
                imm12,
                shift12,
            } => {
                let imm = u64::from(imm12) << if shift12 { 12 } else { 0 };
                let value = alu(sub, state.get(rn), imm);
                state.set(rd, truncate(sf, value));
            }
            Op::AddSubReg {
                sf,
                sub,
                rd,
                rn,
                rm,
            } => {
                let value = alu(sub, state.get(rn), state.get(rm));
                state.set(rd, truncate(sf, value));
            }
            Op::MovWide {
                sf,
                keep,
                rd,
                imm16,
                shift,
            } => {
                let imm = u64::from(imm16) << shift;
                let value = if keep {
                    (state.get(rd) & !(0xffff << shift)) | imm
                } else {
                    imm
                };
                state.set(rd, truncate(sf, value));
            }
            Op::LdSt {
                load,
                kind,
                rt,
                addr,
            } => self.load_store(pc, load, kind, rt, addr)?,
            Op::FAdd { double, rd, rn, rm } => {
                let value = if double {
                    let a = f64::from_bits(state.v(rn) as u64);
                    let b = f64::from_bits(state.v(rm) as u64);
                    u128::from((a + b).to_bits())
                } else {
                    let a = f32::from_bits(state.v(rn) as u32);
                    let b = f32::from_bits(state.v(rm) as u32);
                    u128::from((a + b).to_bits())
                };
                state.set_v(rd, value);
            }
            Op::Bl { offset } => {
                state.set_x(30, next);
                return Ok(pc.wrapping_add_signed(offset));
            }
            Op::B { offset } => return Ok(pc.wrapping_add_signed(offset)),
            Op::Ret { rn } => return Ok(state.get(rn)),
        }
        Ok(next)
    }

    fn load_store(
        &mut self,
        pc: u64,
        load: bool,
        kind: LdStKind,
        rt: u8,
        addr: Addr,
    ) -> Result<(), Trap> {
        let base = addr.base();
        let base_value = self.state.get(base);
        if base == XReg::Sp && base_value % 16 != 0 {
            return Err(Trap::MisalignedStack {
                pc,
                sp: base_value,
            });
        }
        let (ea, writeback) = match addr {
            Addr::UnsignedOffset { offset, .. } => (base_value.wrapping_add(offset), None),
            Addr::Unscaled { offset, .. } => (base_value.wrapping_add_signed(offset), None),
            Addr::PostIndex { offset, .. } => {
                (base_value, Some(base_value.wrapping_add_signed(offset)))
            }
            Addr::RegOffset { rm, .. } => (base_value.wrapping_add(self.state.get(rm)), None),
        };

        let memory = &mut self.memory;
        let state = &mut self.state;
        if load {
            // Narrow loads zero the rest of the destination register.
            match kind {
                LdStKind::W => state.set_x(rt, u64::from(memory.load_u32(ea)?)),
                LdStKind::X => state.set_x(rt, memory.load_u64(ea)?),
                LdStKind::S => state.set_v(rt, u128::from(memory.load_u32(ea)?)),
                LdStKind::D => state.set_v(rt, u128::from(memory.load_u64(ea)?)),
                LdStKind::Q => state.set_v(rt, memory.load_u128(ea)?),
            }
        } else {
            match kind {
                LdStKind::W => memory.store_u32(ea, state.x(rt) as u32)?,
                LdStKind::X => memory.store_u64(ea, state.x(rt))?,
                LdStKind::S => memory.store_u32(ea, state.v(rt) as u32)?,
                LdStKind::D => memory.store_u64(ea, state.v(rt) as u64)?,
                LdStKind::Q => memory.store_u128(ea, state.v(rt))?,
            }
        }
        if let Some(value) = writeback {
            state.set(base, value);
        }
        Ok(())
    }
}

fn alu(sub: bool, a: u64, b: u64) -> u64 {
    if sub {
        a.wrapping_sub(b)
    } else {
        a.wrapping_add(b)
    }
}

/// 32-bit operations write the low half and zero the upper half.
fn truncate(sf: bool, value: u64) -> u64 {
    if sf { value } else { value & 0xffff_ffff }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u64 = 0x1_0000;

    fn vm_with_code(words: &[u32]) -> Vm {
        let mut memory = Memory::new(BASE, 0x1000);
        let code: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        memory.write_bytes(BASE, &code).unwrap();
        Vm::new(memory)
    }

    #[test]
    fn arithmetic_and_moves() {
        let _ = env_logger::try_init();
        let mut vm = vm_with_code(&[
            0xd2900010, // movz x16, #32768
            0xf2a00030, // movk x16, #1, LSL #16
            0x0b030040, // add w0, w2, w3
            0xaa1003f4, // mov x20, x16
            0xd65f03c0, // ret
        ]);
        vm.state_mut().set_x(2, 0xffff_ffff);
        vm.state_mut().set_x(3, 2);
        vm.state_mut().set_x(30, 0xdead_0000);
        let steps = vm.run(BASE, 0xdead_0000).unwrap();
        assert_eq!(steps, 5);
        assert_eq!(vm.state().x(16), 0x1_8000);
        assert_eq!(vm.state().x(20), 0x1_8000);
        // The 32-bit add wraps and zero-extends.
        assert_eq!(vm.state().x(0), 1);
    }

    #[test]
    fn post_index_and_stack() {
        let mut vm = vm_with_code(&[
            0xb8408722, // ldr w2, [x25], #8
            0x910003fb, // mov x27, sp
            0xf9000a9d, // str x29, [x20, #16]
            0xd65f03c0, // ret
        ]);
        vm.memory_mut().store_u64(BASE + 0x800, u64::MAX).unwrap();
        let state = vm.state_mut();
        state.set_x(25, BASE + 0x800);
        state.set_x(20, BASE + 0x900);
        state.set_x(29, 0x1234);
        state.set_sp(BASE + 0xf00);
        state.set_x(30, 0);
        vm.run(BASE, 0).unwrap();
        assert_eq!(vm.state().x(2), 0xffff_ffff);
        assert_eq!(vm.state().x(25), BASE + 0x808);
        assert_eq!(vm.state().x(27), BASE + 0xf00);
        assert_eq!(vm.memory().load_u64(BASE + 0x910).unwrap(), 0x1234);
    }

    #[test]
    fn float_add_zeroes_upper_lanes() {
        let mut vm = vm_with_code(&[0x1e632840, 0xd65f03c0]); // fadd d0, d2, d3; ret
        vm.state_mut().set_v(0, u128::MAX);
        vm.state_mut().set_v(2, u128::from(1.5f64.to_bits()));
        vm.state_mut().set_v(3, u128::from(2.25f64.to_bits()));
        vm.run(BASE, 0).unwrap();
        assert_eq!(vm.state().v(0), u128::from(3.75f64.to_bits()));
    }

    #[test]
    fn traps() {
        let mut vm = vm_with_code(&[0]);
        assert_eq!(
            vm.run(BASE, 0),
            Err(Trap::Undecodable { pc: BASE, word: 0 })
        );

        let mut vm = vm_with_code(&[0x3d8003ef]); // str q15, [sp]
        vm.state_mut().set_sp(BASE + 0x808);
        assert_eq!(
            vm.run(BASE, 0),
            Err(Trap::MisalignedStack {
                pc: BASE,
                sp: BASE + 0x808
            })
        );

        let mut vm = vm_with_code(&[0xf9000a9d]); // str x29, [x20, #16]
        assert_eq!(
            vm.run(BASE, 0),
            Err(Trap::OutOfBounds { addr: 16, size: 8 })
        );

        let mut vm = vm_with_code(&[0x14000000]); // b #0
        vm.set_fuel(100);
        assert_eq!(vm.run(BASE, 0), Err(Trap::OutOfFuel));
        assert_eq!(vm.fuel(), 0);

        let mut vm = vm_with_code(&[]);
        assert_eq!(vm.run(BASE + 2, 0), Err(Trap::MisalignedPc(BASE + 2)));
    }
}

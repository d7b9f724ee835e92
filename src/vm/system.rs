// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The machine: 64 KiB of flat memory, twenty registers, and a
//! fetch-decode-execute loop.
//!
//! `cycle()` runs until the program yields (`vsync`, `brk`), terminates
//! (`end`), or faults by running the instruction pointer off the end of
//! memory. Zeroed memory decodes as `nop`, so an empty program slides to
//! the top of memory and faults rather than panicking.

use std::collections::HashMap;
use std::fmt;

use crate::core::cpu::{
    Flag, Opcode, Register, MEMORY_SIZE, NUM_GP_REGISTERS, NUM_REGISTERS, OS_BASE, OS_SIZE,
    PROGRAM_BASE, PROGRAM_CAPACITY, STACK_TOP,
};
use crate::vm::device::OutputDevice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmError {
    pub message: String,
}

impl VmError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for VmError {}

/// Why `cycle()` returned. `End` and `Fault` are terminal; after `Vsync`
/// or `Brk` the next `cycle()` resumes at the current instruction pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleResult {
    End,
    Vsync,
    Brk,
    Fault,
}

/// Instruction fetch ran past the end of memory.
struct Fault;

pub struct System {
    memory: Vec<u8>,
    registers: [u16; NUM_REGISTERS],
    os_image: Vec<u8>,
    devices: HashMap<u16, Box<dyn OutputDevice>>,
}

impl System {
    pub fn new(os_image: &[u8]) -> Result<Self, VmError> {
        if os_image.len() > OS_SIZE {
            return Err(VmError::new(format!(
                "OS image too large: {} bytes exceeds region capacity {OS_SIZE}",
                os_image.len()
            )));
        }
        let mut system = Self {
            memory: vec![0; MEMORY_SIZE],
            registers: [0; NUM_REGISTERS],
            os_image: os_image.to_vec(),
            devices: HashMap::new(),
        };
        system.reset();
        Ok(system)
    }

    /// Zeroes memory and registers, re-copies the OS image, and parks the
    /// stack pointer at the top of the stack region.
    pub fn reset(&mut self) {
        self.memory.fill(0);
        self.registers.fill(0);
        let base = OS_BASE as usize;
        self.memory[base..base + self.os_image.len()].copy_from_slice(&self.os_image);
        self.set_reg(Register::RSP, STACK_TOP);
    }

    pub fn load_program(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        if bytes.len() > PROGRAM_CAPACITY {
            return Err(VmError::new(format!(
                "Program too large: {} bytes exceeds region capacity {PROGRAM_CAPACITY}",
                bytes.len()
            )));
        }
        let base = PROGRAM_BASE as usize;
        self.memory[base..base + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Points the instruction pointer at the OS region. The OS image is
    /// responsible for transferring control to the program.
    pub fn boot(&mut self) {
        self.set_reg(Register::RIP, OS_BASE);
    }

    pub fn register_output_device(&mut self, addr: u16, device: Box<dyn OutputDevice>) {
        self.devices.insert(addr, device);
    }

    /// Host-side write to `rin`.
    pub fn set_input(&mut self, value: u16) {
        self.set_reg(Register::RIN, value);
    }

    pub fn debug(&self, reg: Register) -> u16 {
        self.reg(reg)
    }

    pub fn debug_mem(&self, addr: u16, len: usize) -> &[u8] {
        let start = addr as usize;
        let end = (start + len).min(MEMORY_SIZE);
        &self.memory[start..end]
    }

    pub fn cycle(&mut self) -> CycleResult {
        loop {
            match self.step() {
                Ok(None) => {}
                Ok(Some(result)) => return result,
                Err(Fault) => return CycleResult::Fault,
            }
        }
    }

    fn step(&mut self) -> Result<Option<CycleResult>, Fault> {
        let byte = self.fetch_byte()?;
        let Some(opcode) = Opcode::from_byte(byte) else {
            // Linked images never contain undispatchable bytes.
            panic!(
                "undispatchable opcode {byte:#04x} at {:#06x}",
                self.reg(Register::RIP).wrapping_sub(1)
            );
        };
        match opcode {
            Opcode::Nop => {}
            Opcode::End => return Ok(Some(CycleResult::End)),
            Opcode::Vsync => return Ok(Some(CycleResult::Vsync)),
            Opcode::Brk => return Ok(Some(CycleResult::Brk)),

            Opcode::MovImm => {
                let dst = self.fetch_register()?;
                let value = self.fetch_word()?;
                self.set_reg(dst, value);
            }
            Opcode::MovReg => {
                let dst = self.fetch_register()?;
                let src = self.fetch_register()?;
                self.set_reg(dst, self.reg(src));
            }
            Opcode::LodAbs | Opcode::LodInd | Opcode::LodbAbs | Opcode::LodbInd => {
                let dst = self.fetch_register()?;
                let addr = match opcode {
                    Opcode::LodAbs | Opcode::LodbAbs => self.fetch_word()?,
                    _ => self.fetch_register_value()?,
                };
                let value = match opcode {
                    Opcode::LodAbs | Opcode::LodInd => self.read_word(addr),
                    _ => u16::from(self.read_byte(addr)),
                };
                self.set_reg(dst, value);
            }
            Opcode::StoImmAbs
            | Opcode::StoImmInd
            | Opcode::StoRegAbs
            | Opcode::StoRegInd
            | Opcode::StobImmAbs
            | Opcode::StobImmInd
            | Opcode::StobRegAbs
            | Opcode::StobRegInd => {
                let byte_wide = matches!(
                    opcode,
                    Opcode::StobImmAbs
                        | Opcode::StobImmInd
                        | Opcode::StobRegAbs
                        | Opcode::StobRegInd
                );
                let addr = match opcode {
                    Opcode::StoImmAbs
                    | Opcode::StoRegAbs
                    | Opcode::StobImmAbs
                    | Opcode::StobRegAbs => self.fetch_word()?,
                    _ => self.fetch_register_value()?,
                };
                let value = match opcode {
                    Opcode::StoImmAbs | Opcode::StoImmInd => self.fetch_word()?,
                    Opcode::StobImmAbs | Opcode::StobImmInd => u16::from(self.fetch_byte()?),
                    _ => self.fetch_register_value()?,
                };
                if byte_wide {
                    self.write_byte(addr, value as u8);
                } else {
                    self.write_word(addr, value);
                }
            }

            Opcode::AddImm | Opcode::AddReg => self.alu(opcode, |a, b| {
                let wide = u32::from(a) + u32::from(b);
                clamp_high(wide)
            })?,
            Opcode::SubImm | Opcode::SubReg => self.alu(opcode, |a, b| {
                if b > a {
                    (0, Flag::Zero.bit() | Flag::Negative.bit())
                } else {
                    let result = a - b;
                    (result, zero_bit(result))
                }
            })?,
            Opcode::MulImm | Opcode::MulReg => self.alu(opcode, |a, b| {
                let wide = u32::from(a) * u32::from(b);
                clamp_high(wide)
            })?,
            Opcode::DivImm | Opcode::DivReg => self.alu_div(opcode, |a, b| a / b)?,
            Opcode::ModImm | Opcode::ModReg => self.alu_div(opcode, |a, b| a % b)?,
            Opcode::Inc => {
                let reg = self.fetch_register()?;
                let (result, flags) = clamp_high(u32::from(self.reg(reg)) + 1);
                self.set_reg(reg, result);
                self.set_reg(Register::RFL, flags);
            }
            Opcode::Dec => {
                let reg = self.fetch_register()?;
                let value = self.reg(reg);
                let (result, flags) = if value == 0 {
                    (0, Flag::Zero.bit() | Flag::Negative.bit())
                } else {
                    (value - 1, zero_bit(value - 1))
                };
                self.set_reg(reg, result);
                self.set_reg(Register::RFL, flags);
            }

            Opcode::ShlImm | Opcode::ShlReg => self.alu(opcode, |a, b| {
                let wide = u64::from(a) << u64::from(b).min(32);
                clamp_high(wide.min(u64::from(u32::MAX)) as u32)
            })?,
            Opcode::ShrImm | Opcode::ShrReg => self.alu(opcode, |a, b| {
                let result = if b >= 16 { 0 } else { a >> b };
                (result, zero_bit(result))
            })?,
            Opcode::OrImm | Opcode::OrReg => self.alu(opcode, |a, b| {
                let result = a | b;
                (result, zero_bit(result))
            })?,
            Opcode::AndImm | Opcode::AndReg => self.alu(opcode, |a, b| {
                let result = a & b;
                (result, zero_bit(result))
            })?,
            Opcode::XorImm | Opcode::XorReg => self.alu(opcode, |a, b| {
                let result = a ^ b;
                (result, zero_bit(result))
            })?,
            Opcode::Not => {
                let reg = self.fetch_register()?;
                let result = !self.reg(reg);
                self.set_reg(reg, result);
                self.set_reg(Register::RFL, zero_bit(result));
            }

            Opcode::CmpImm | Opcode::CmpReg => {
                let lhs = self.fetch_register_value()?;
                let rhs = if opcode == Opcode::CmpImm {
                    self.fetch_word()?
                } else {
                    self.fetch_register_value()?
                };
                let flags = if lhs == rhs {
                    Flag::Zero.bit()
                } else if lhs < rhs {
                    Flag::Negative.bit()
                } else {
                    0
                };
                self.set_reg(Register::RFL, flags);
            }

            Opcode::JmpAbs
            | Opcode::JmpReg
            | Opcode::JzAbs
            | Opcode::JzReg
            | Opcode::JnzAbs
            | Opcode::JnzReg
            | Opcode::JgAbs
            | Opcode::JgReg
            | Opcode::JgzAbs
            | Opcode::JgzReg
            | Opcode::JlAbs
            | Opcode::JlReg
            | Opcode::JlzAbs
            | Opcode::JlzReg
            | Opcode::JoAbs
            | Opcode::JoReg
            | Opcode::JdzAbs
            | Opcode::JdzReg => {
                let absolute = (opcode.byte() & 1) == 0;
                let target = if absolute {
                    self.fetch_word()?
                } else {
                    self.fetch_register_value()?
                };
                if self.jump_taken(opcode) {
                    self.set_reg(Register::RIP, target);
                }
            }
            Opcode::CallAbs | Opcode::CallReg => {
                let target = if opcode == Opcode::CallAbs {
                    self.fetch_word()?
                } else {
                    self.fetch_register_value()?
                };
                let ret_addr = self.reg(Register::RIP);
                self.push(ret_addr);
                self.set_reg(Register::RIP, target);
            }
            Opcode::Ret => {
                let ret_addr = self.pop();
                self.set_reg(Register::RIP, ret_addr);
            }

            Opcode::PushImm => {
                let value = self.fetch_word()?;
                self.push(value);
            }
            Opcode::PushReg => {
                let reg = self.fetch_register()?;
                self.push(self.reg(reg));
            }
            Opcode::Pop => {
                let reg = self.fetch_register()?;
                let value = self.pop();
                self.set_reg(reg, value);
            }
            Opcode::PushAll => {
                for n in 0..NUM_GP_REGISTERS as u8 {
                    self.push(self.reg(Register::gp(n)));
                }
            }
            Opcode::PopAll => {
                for n in (0..NUM_GP_REGISTERS as u8).rev() {
                    let value = self.pop();
                    self.set_reg(Register::gp(n), value);
                }
            }

            Opcode::OutImmAbs
            | Opcode::OutImmInd
            | Opcode::OutRegAbs
            | Opcode::OutRegInd
            | Opcode::OutbImmAbs
            | Opcode::OutbImmInd
            | Opcode::OutbRegAbs
            | Opcode::OutbRegInd => {
                let byte_wide = matches!(
                    opcode,
                    Opcode::OutbImmAbs
                        | Opcode::OutbImmInd
                        | Opcode::OutbRegAbs
                        | Opcode::OutbRegInd
                );
                let addr = match opcode {
                    Opcode::OutImmAbs
                    | Opcode::OutRegAbs
                    | Opcode::OutbImmAbs
                    | Opcode::OutbRegAbs => self.fetch_word()?,
                    _ => self.fetch_register_value()?,
                };
                let value = match opcode {
                    Opcode::OutImmAbs | Opcode::OutImmInd => self.fetch_word()?,
                    Opcode::OutbImmAbs | Opcode::OutbImmInd => u16::from(self.fetch_byte()?),
                    _ => self.fetch_register_value()?,
                };
                if let Some(device) = self.devices.get_mut(&addr) {
                    if byte_wide {
                        device.outb(addr, value as u8);
                    } else {
                        device.out(addr, value);
                    }
                }
            }
        }
        Ok(None)
    }

    fn alu(
        &mut self,
        opcode: Opcode,
        op: impl Fn(u16, u16) -> (u16, u16),
    ) -> Result<(), Fault> {
        let dst = self.fetch_register()?;
        let rhs = if opcode.byte() & 1 == 0 {
            self.fetch_word()?
        } else {
            self.fetch_register_value()?
        };
        let (result, flags) = op(self.reg(dst), rhs);
        self.set_reg(dst, result);
        self.set_reg(Register::RFL, flags);
        Ok(())
    }

    /// Division family: by zero leaves the destination untouched and sets
    /// DIVBYZERO alone.
    fn alu_div(&mut self, opcode: Opcode, op: impl Fn(u16, u16) -> u16) -> Result<(), Fault> {
        let dst = self.fetch_register()?;
        let rhs = if opcode.byte() & 1 == 0 {
            self.fetch_word()?
        } else {
            self.fetch_register_value()?
        };
        if rhs == 0 {
            self.set_reg(Register::RFL, Flag::DivByZero.bit());
            return Ok(());
        }
        let result = op(self.reg(dst), rhs);
        self.set_reg(dst, result);
        self.set_reg(Register::RFL, zero_bit(result));
        Ok(())
    }

    fn jump_taken(&self, opcode: Opcode) -> bool {
        let flags = self.reg(Register::RFL);
        let zero = flags & Flag::Zero.bit() != 0;
        let negative = flags & Flag::Negative.bit() != 0;
        match opcode {
            Opcode::JmpAbs | Opcode::JmpReg => true,
            Opcode::JzAbs | Opcode::JzReg => zero,
            Opcode::JnzAbs | Opcode::JnzReg => !zero,
            Opcode::JgAbs | Opcode::JgReg => !zero && !negative,
            Opcode::JgzAbs | Opcode::JgzReg => !negative,
            Opcode::JlAbs | Opcode::JlReg => negative,
            Opcode::JlzAbs | Opcode::JlzReg => negative || zero,
            Opcode::JoAbs | Opcode::JoReg => flags & Flag::Overflow.bit() != 0,
            Opcode::JdzAbs | Opcode::JdzReg => flags & Flag::DivByZero.bit() != 0,
            _ => unreachable!("not a jump: {opcode:?}"),
        }
    }

    // Stack grows downward. rsp points at the next free word.
    fn push(&mut self, value: u16) {
        let rsp = self.reg(Register::RSP);
        self.write_word(rsp, value);
        self.set_reg(Register::RSP, rsp.wrapping_sub(2));
    }

    fn pop(&mut self) -> u16 {
        let rsp = self.reg(Register::RSP).wrapping_add(2);
        self.set_reg(Register::RSP, rsp);
        self.read_word(rsp)
    }

    /// Fetches the byte at rip and advances. Advancing past the end of
    /// memory is the fault condition.
    fn fetch_byte(&mut self) -> Result<u8, Fault> {
        let rip = self.reg(Register::RIP);
        let byte = self.memory[rip as usize];
        let next = rip.checked_add(1).ok_or(Fault)?;
        self.set_reg(Register::RIP, next);
        Ok(byte)
    }

    fn fetch_word(&mut self) -> Result<u16, Fault> {
        let hi = self.fetch_byte()?;
        let lo = self.fetch_byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn fetch_register(&mut self) -> Result<Register, Fault> {
        let id = self.fetch_byte()?;
        // Invalid ids only occur when execution runs into data.
        Register::from_id(id).ok_or(Fault)
    }

    fn fetch_register_value(&mut self) -> Result<u16, Fault> {
        let reg = self.fetch_register()?;
        Ok(self.reg(reg))
    }

    fn read_byte(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn read_word(&self, addr: u16) -> u16 {
        let hi = self.memory[addr as usize];
        let lo = self.memory[addr.wrapping_add(1) as usize];
        u16::from_be_bytes([hi, lo])
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }

    fn write_word(&mut self, addr: u16, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.memory[addr as usize] = hi;
        self.memory[addr.wrapping_add(1) as usize] = lo;
    }

    fn reg(&self, reg: Register) -> u16 {
        self.registers[reg.id() as usize]
    }

    fn set_reg(&mut self, reg: Register, value: u16) {
        self.registers[reg.id() as usize] = value;
    }
}

fn zero_bit(result: u16) -> u16 {
    if result == 0 {
        Flag::Zero.bit()
    } else {
        0
    }
}

/// Clamp a wide result to 16 bits, flagging OVERFLOW on saturation.
fn clamp_high(wide: u32) -> (u16, u16) {
    if wide > u32::from(u16::MAX) {
        (u16::MAX, Flag::Overflow.bit())
    } else {
        (wide as u16, zero_bit(wide as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn boot_with(program: &[u8]) -> System {
        // Minimal OS: jump straight to the program region.
        let os = [Opcode::JmpAbs.byte(), 0x40, 0x00];
        let mut system = System::new(&os).expect("os image");
        system.load_program(program).expect("program");
        system.boot();
        system
    }

    fn run(program: &[u8]) -> System {
        let mut system = boot_with(program);
        assert_eq!(system.cycle(), CycleResult::End);
        system
    }

    #[test]
    fn mov_and_end() {
        let system = run(&[Opcode::MovImm.byte(), 0, 0x12, 0x34, Opcode::End.byte()]);
        assert_eq!(system.debug(Register::gp(0)), 0x1234);
    }

    #[test]
    fn add_clamps_and_sets_overflow() {
        let system = run(&[
            Opcode::MovImm.byte(), 0, 0xff, 0xff,
            Opcode::AddImm.byte(), 0, 0x00, 0x02,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.debug(Register::gp(0)), 0xffff);
        assert_eq!(system.debug(Register::RFL), Flag::Overflow.bit());
    }

    #[test]
    fn sub_clamps_to_zero_and_sets_negative() {
        let system = run(&[
            Opcode::MovImm.byte(), 0, 0x00, 0x05,
            Opcode::SubImm.byte(), 0, 0x00, 0x09,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.debug(Register::gp(0)), 0);
        assert_eq!(
            system.debug(Register::RFL),
            Flag::Zero.bit() | Flag::Negative.bit()
        );
    }

    #[test]
    fn div_by_zero_leaves_destination_untouched() {
        let system = run(&[
            Opcode::MovImm.byte(), 0, 0x00, 0x09,
            Opcode::DivImm.byte(), 0, 0x00, 0x00,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.debug(Register::gp(0)), 9);
        assert_eq!(system.debug(Register::RFL), Flag::DivByZero.bit());
    }

    #[test]
    fn mod_by_zero_leaves_destination_untouched() {
        let system = run(&[
            Opcode::MovImm.byte(), 0, 0x00, 0x09,
            Opcode::ModImm.byte(), 0, 0x00, 0x00,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.debug(Register::gp(0)), 9);
        assert_eq!(system.debug(Register::RFL), Flag::DivByZero.bit());
    }

    #[test]
    fn cmp_sets_zero_on_equality_and_jz_branches() {
        // cmp r0, 7 with r0 == 7, then jz over a mov.
        let system = run(&[
            Opcode::MovImm.byte(), 0, 0x00, 0x07,
            Opcode::CmpImm.byte(), 0, 0x00, 0x07,
            Opcode::JzAbs.byte(), 0x40, 0x0f,
            Opcode::MovImm.byte(), 1, 0x00, 0xff,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.debug(Register::gp(1)), 0);
    }

    #[test]
    fn cmp_less_than_sets_negative() {
        let system = run(&[
            Opcode::MovImm.byte(), 0, 0x00, 0x03,
            Opcode::CmpImm.byte(), 0, 0x00, 0x07,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.debug(Register::RFL), Flag::Negative.bit());
    }

    #[test]
    fn call_and_ret_round_trip() {
        // call a routine at 0x400a that sets r5 and returns.
        let system = run(&[
            Opcode::CallAbs.byte(), 0x40, 0x0a,  // 0x4000
            Opcode::MovImm.byte(), 1, 0x00, 0x01, // 0x4003
            Opcode::End.byte(),                   // 0x4007
            Opcode::Nop.byte(),                   // 0x4008
            Opcode::Nop.byte(),                   // 0x4009
            Opcode::MovImm.byte(), 5, 0x00, 0x2a, // 0x400a
            Opcode::Ret.byte(),
        ]);
        assert_eq!(system.debug(Register::gp(5)), 0x2a);
        assert_eq!(system.debug(Register::gp(1)), 1);
        assert_eq!(system.debug(Register::RSP), STACK_TOP);
    }

    #[test]
    fn push_pop_and_pushall_popall() {
        let system = run(&[
            Opcode::PushImm.byte(), 0x12, 0x34,
            Opcode::Pop.byte(), 3,
            Opcode::MovImm.byte(), 0, 0x00, 0x07,
            Opcode::PushAll.byte(),
            Opcode::MovImm.byte(), 0, 0x00, 0x00,
            Opcode::PopAll.byte(),
            Opcode::End.byte(),
        ]);
        assert_eq!(system.debug(Register::gp(3)), 0x1234);
        assert_eq!(system.debug(Register::gp(0)), 7);
        assert_eq!(system.debug(Register::RSP), STACK_TOP);
    }

    #[test]
    fn word_store_and_load_are_big_endian() {
        let system = run(&[
            Opcode::StoImmAbs.byte(), 0x20, 0x00, 0x12, 0x34,
            Opcode::LodAbs.byte(), 0, 0x20, 0x00,
            Opcode::LodbAbs.byte(), 1, 0x20, 0x00,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.debug_mem(0x2000, 2), &[0x12, 0x34]);
        assert_eq!(system.debug(Register::gp(0)), 0x1234);
        assert_eq!(system.debug(Register::gp(1)), 0x12);
    }

    #[test]
    fn vsync_resumes_at_next_cycle() {
        let mut system = boot_with(&[
            Opcode::MovImm.byte(), 0, 0x00, 0x01,
            Opcode::Vsync.byte(),
            Opcode::MovImm.byte(), 0, 0x00, 0x02,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.cycle(), CycleResult::Vsync);
        assert_eq!(system.debug(Register::gp(0)), 1);
        assert_eq!(system.cycle(), CycleResult::End);
        assert_eq!(system.debug(Register::gp(0)), 2);
    }

    #[test]
    fn brk_resumes_at_next_cycle() {
        let mut system = boot_with(&[
            Opcode::MovImm.byte(), 0, 0x00, 0x01,
            Opcode::Brk.byte(),
            Opcode::MovImm.byte(), 0, 0x00, 0x02,
            Opcode::End.byte(),
        ]);
        assert_eq!(system.cycle(), CycleResult::Brk);
        assert_eq!(system.debug(Register::gp(0)), 1);
        assert_eq!(system.cycle(), CycleResult::End);
        assert_eq!(system.debug(Register::gp(0)), 2);
    }

    #[test]
    fn empty_program_faults_at_top_of_memory() {
        let mut system = boot_with(&[]);
        assert_eq!(system.cycle(), CycleResult::Fault);
    }

    #[test]
    fn oversized_program_is_rejected() {
        let mut system = System::new(&[]).expect("os image");
        let err = system.load_program(&vec![0; PROGRAM_CAPACITY + 1]).unwrap_err();
        assert!(err.message.contains("Program too large"));
    }

    #[test]
    fn oversized_os_image_is_rejected() {
        let err = System::new(&vec![0; OS_SIZE + 1]).err().unwrap();
        assert!(err.message.contains("OS image too large"));
    }

    struct Recorder {
        bytes: Rc<RefCell<Vec<u8>>>,
    }

    impl OutputDevice for Recorder {
        fn out(&mut self, _addr: u16, value: u16) {
            self.bytes.borrow_mut().extend_from_slice(&value.to_be_bytes());
        }

        fn outb(&mut self, _addr: u16, value: u8) {
            self.bytes.borrow_mut().push(value);
        }
    }

    #[test]
    fn out_dispatches_to_registered_device() {
        let bytes = Rc::new(RefCell::new(Vec::new()));
        let mut system = boot_with(&[
            Opcode::OutbImmAbs.byte(), 0x3f, 0xff, b'A',
            Opcode::OutImmAbs.byte(), 0x3f, 0xff, 0x42, 0x43,
            Opcode::OutbImmAbs.byte(), 0x12, 0x00, b'Z', // no device: dropped
            Opcode::End.byte(),
        ]);
        system.register_output_device(0x3fff, Box::new(Recorder { bytes: bytes.clone() }));
        assert_eq!(system.cycle(), CycleResult::End);
        assert_eq!(*bytes.borrow(), vec![b'A', 0x42, 0x43]);
    }

    #[test]
    fn set_input_is_readable_through_rin() {
        let mut system = boot_with(&[
            Opcode::MovReg.byte(), 0, Register::RIN.id(),
            Opcode::End.byte(),
        ]);
        system.set_input(0x00aa);
        assert_eq!(system.cycle(), CycleResult::End);
        assert_eq!(system.debug(Register::gp(0)), 0x00aa);
    }
}

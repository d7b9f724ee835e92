// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Machine description shared by the assembler and the execution engine.
//!
//! Everything the two halves must agree on lives here: the register file,
//! the flags register layout, the opcode table, the memory map, and the
//! binary header format.

/// Total addressable memory, one flat 16-bit space.
pub const MEMORY_SIZE: usize = 0x10000;

/// Base of the OS region, where `System::boot` starts executing.
pub const OS_BASE: u16 = 0x0000;
/// Size of the OS region.
pub const OS_SIZE: usize = 0x2000;

/// Base of the screen/data region.
pub const DATA_BASE: u16 = 0x2000;
/// Size of the screen/data region.
pub const DATA_SIZE: usize = 0x2000;

/// Base of the program region, where `System::load_program` copies binaries.
pub const PROGRAM_BASE: u16 = 0x4000;
/// Program region capacity; linked binaries larger than this are rejected.
pub const PROGRAM_CAPACITY: usize = STACK_BASE as usize - PROGRAM_BASE as usize;

/// Base of the stack region.
pub const STACK_BASE: u16 = 0xf800;
/// Initial RSP value; the stack grows downward from here.
pub const STACK_TOP: u16 = 0xfffe;

/// Conventional address of the console output device.
pub const CONSOLE_ADDR: u16 = 0x3fff;

/// Binary header magic signature.
pub const HEADER_MAGIC: u16 = 0xbf16;
/// Binary header length in bytes.
pub const HEADER_LEN: usize = 10;

/// Number of general-purpose registers (r0-r15).
pub const NUM_GP_REGISTERS: usize = 16;
/// Total register file size, including the engine-owned registers.
pub const NUM_REGISTERS: usize = 20;

/// A register id, as encoded into operand bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(u8);

impl Register {
    pub const RIP: Register = Register(16);
    pub const RSP: Register = Register(17);
    pub const RFL: Register = Register(18);
    pub const RIN: Register = Register(19);

    /// General-purpose register rN. Panics for n > 15; callers index from
    /// the tokenizer, which never produces more.
    pub fn gp(n: u8) -> Self {
        assert!(n < NUM_GP_REGISTERS as u8, "no such register r{n}");
        Register(n)
    }

    pub fn from_id(id: u8) -> Option<Self> {
        if (id as usize) < NUM_REGISTERS {
            Some(Register(id))
        } else {
            None
        }
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// Registers the engine owns; programs may read them but never write.
    pub fn is_engine_owned(self) -> bool {
        matches!(self, Register::RIP | Register::RFL | Register::RIN)
    }

    pub fn name(self) -> String {
        match self {
            Register::RIP => "rip".to_string(),
            Register::RSP => "rsp".to_string(),
            Register::RFL => "rfl".to_string(),
            Register::RIN => "rin".to_string(),
            Register(n) => format!("r{n}"),
        }
    }

    /// Parse a register name: `r0`-`r15`, `rip`, `rsp`, `rfl`, `rin`.
    /// Case-insensitive, like every other name in the language.
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "rip" => return Some(Register::RIP),
            "rsp" => return Some(Register::RSP),
            "rfl" => return Some(Register::RFL),
            "rin" => return Some(Register::RIN),
            _ => {}
        }
        let digits = lower.strip_prefix('r')?;
        let n: u8 = digits.parse().ok()?;
        // Reject forms like r01; the tokenizer only recognizes canonical names.
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        if (n as usize) < NUM_GP_REGISTERS {
            Some(Register(n))
        } else {
            None
        }
    }
}

/// Bits of the flags register, recomputed by every ALU and compare op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Zero = 0x1,
    Negative = 0x2,
    Overflow = 0x4,
    DivByZero = 0x8,
}

impl Flag {
    pub fn bit(self) -> u16 {
        self as u16
    }
}

/// Operand width for immediates and memory accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
        }
    }

    /// Whether a value fits the width's unsigned range.
    pub fn fits(self, value: u16) -> bool {
        match self {
            Width::Byte => value <= 0xff,
            Width::Word => true,
        }
    }
}

/// The opcode table. Operand bytes follow the opcode in declaration order;
/// register operands are one id byte, immediates are big-endian and sized
/// by the instruction form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    End = 0x01,
    Vsync = 0x02,
    Brk = 0x03,

    MovImm = 0x10,
    MovReg = 0x11,
    LodAbs = 0x12,
    LodInd = 0x13,
    LodbAbs = 0x14,
    LodbInd = 0x15,
    StoImmAbs = 0x16,
    StoImmInd = 0x17,
    StoRegAbs = 0x18,
    StoRegInd = 0x19,
    StobImmAbs = 0x1a,
    StobImmInd = 0x1b,
    StobRegAbs = 0x1c,
    StobRegInd = 0x1d,

    AddImm = 0x20,
    AddReg = 0x21,
    SubImm = 0x22,
    SubReg = 0x23,
    MulImm = 0x24,
    MulReg = 0x25,
    DivImm = 0x26,
    DivReg = 0x27,
    ModImm = 0x28,
    ModReg = 0x29,
    Inc = 0x2a,
    Dec = 0x2b,

    ShlImm = 0x30,
    ShlReg = 0x31,
    ShrImm = 0x32,
    ShrReg = 0x33,
    OrImm = 0x34,
    OrReg = 0x35,
    AndImm = 0x36,
    AndReg = 0x37,
    XorImm = 0x38,
    XorReg = 0x39,
    Not = 0x3a,

    CmpImm = 0x3e,
    CmpReg = 0x3f,

    JmpAbs = 0x40,
    JmpReg = 0x41,
    JzAbs = 0x42,
    JzReg = 0x43,
    JnzAbs = 0x44,
    JnzReg = 0x45,
    JgAbs = 0x46,
    JgReg = 0x47,
    JgzAbs = 0x48,
    JgzReg = 0x49,
    JlAbs = 0x4a,
    JlReg = 0x4b,
    JlzAbs = 0x4c,
    JlzReg = 0x4d,
    JoAbs = 0x4e,
    JoReg = 0x4f,
    JdzAbs = 0x50,
    JdzReg = 0x51,
    CallAbs = 0x52,
    CallReg = 0x53,
    Ret = 0x54,

    PushImm = 0x60,
    PushReg = 0x61,
    Pop = 0x62,
    PushAll = 0x63,
    PopAll = 0x64,

    OutImmAbs = 0x70,
    OutImmInd = 0x71,
    OutRegAbs = 0x72,
    OutRegInd = 0x73,
    OutbImmAbs = 0x74,
    OutbImmInd = 0x75,
    OutbRegAbs = 0x76,
    OutbRegInd = 0x77,
}

impl Opcode {
    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match b {
            0x00 => Nop,
            0x01 => End,
            0x02 => Vsync,
            0x03 => Brk,
            0x10 => MovImm,
            0x11 => MovReg,
            0x12 => LodAbs,
            0x13 => LodInd,
            0x14 => LodbAbs,
            0x15 => LodbInd,
            0x16 => StoImmAbs,
            0x17 => StoImmInd,
            0x18 => StoRegAbs,
            0x19 => StoRegInd,
            0x1a => StobImmAbs,
            0x1b => StobImmInd,
            0x1c => StobRegAbs,
            0x1d => StobRegInd,
            0x20 => AddImm,
            0x21 => AddReg,
            0x22 => SubImm,
            0x23 => SubReg,
            0x24 => MulImm,
            0x25 => MulReg,
            0x26 => DivImm,
            0x27 => DivReg,
            0x28 => ModImm,
            0x29 => ModReg,
            0x2a => Inc,
            0x2b => Dec,
            0x30 => ShlImm,
            0x31 => ShlReg,
            0x32 => ShrImm,
            0x33 => ShrReg,
            0x34 => OrImm,
            0x35 => OrReg,
            0x36 => AndImm,
            0x37 => AndReg,
            0x38 => XorImm,
            0x39 => XorReg,
            0x3a => Not,
            0x3e => CmpImm,
            0x3f => CmpReg,
            0x40 => JmpAbs,
            0x41 => JmpReg,
            0x42 => JzAbs,
            0x43 => JzReg,
            0x44 => JnzAbs,
            0x45 => JnzReg,
            0x46 => JgAbs,
            0x47 => JgReg,
            0x48 => JgzAbs,
            0x49 => JgzReg,
            0x4a => JlAbs,
            0x4b => JlReg,
            0x4c => JlzAbs,
            0x4d => JlzReg,
            0x4e => JoAbs,
            0x4f => JoReg,
            0x50 => JdzAbs,
            0x51 => JdzReg,
            0x52 => CallAbs,
            0x53 => CallReg,
            0x54 => Ret,
            0x60 => PushImm,
            0x61 => PushReg,
            0x62 => Pop,
            0x63 => PushAll,
            0x64 => PopAll,
            0x70 => OutImmAbs,
            0x71 => OutImmInd,
            0x72 => OutRegAbs,
            0x73 => OutRegInd,
            0x74 => OutbImmAbs,
            0x75 => OutbImmInd,
            0x76 => OutbRegAbs,
            0x77 => OutbRegInd,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_parse_accepts_full_file() {
        assert_eq!(Register::parse("r0"), Some(Register::gp(0)));
        assert_eq!(Register::parse("R15"), Some(Register::gp(15)));
        assert_eq!(Register::parse("rip"), Some(Register::RIP));
        assert_eq!(Register::parse("RSP"), Some(Register::RSP));
        assert_eq!(Register::parse("rfl"), Some(Register::RFL));
        assert_eq!(Register::parse("rin"), Some(Register::RIN));
    }

    #[test]
    fn register_parse_rejects_non_registers() {
        assert_eq!(Register::parse("r16"), None);
        assert_eq!(Register::parse("r01"), None);
        assert_eq!(Register::parse("radius"), None);
        assert_eq!(Register::parse("x0"), None);
    }

    #[test]
    fn engine_owned_registers() {
        assert!(Register::RIP.is_engine_owned());
        assert!(Register::RFL.is_engine_owned());
        assert!(Register::RIN.is_engine_owned());
        assert!(!Register::RSP.is_engine_owned());
        assert!(!Register::gp(0).is_engine_owned());
    }

    #[test]
    fn opcode_bytes_round_trip() {
        for b in 0..=0xffu8 {
            if let Some(op) = Opcode::from_byte(b) {
                assert_eq!(op.byte(), b);
            }
        }
        assert_eq!(Opcode::from_byte(0x00), Some(Opcode::Nop));
        assert_eq!(Opcode::from_byte(0x77), Some(Opcode::OutbRegInd));
        assert_eq!(Opcode::from_byte(0xff), None);
    }

    #[test]
    fn memory_map_regions_are_disjoint() {
        assert_eq!(OS_BASE as usize + OS_SIZE, DATA_BASE as usize);
        assert_eq!(DATA_BASE as usize + DATA_SIZE, PROGRAM_BASE as usize);
        assert_eq!(PROGRAM_BASE as usize + PROGRAM_CAPACITY, STACK_BASE as usize);
        assert!((STACK_TOP as usize) < MEMORY_SIZE);
    }
}

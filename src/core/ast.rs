// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Module AST shared by the checker, macro expander, and code generator.
//!
//! Instructions are one exhaustive sum type so every pass that matches on
//! them stays exhaustive under compiler checking.

use crate::core::cpu::{Register, Width};

/// An operand value that may still be symbolic (a label or immediate macro
/// name). Must be fully literal by the time linking completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmediateExpr {
    pub kind: ImmediateKind,
    pub width: Width,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmediateKind {
    Literal(u16),
    Symbol(String),
}

impl ImmediateExpr {
    pub fn literal(value: u16, width: Width) -> Self {
        Self {
            kind: ImmediateKind::Literal(value),
            width,
        }
    }

    pub fn symbol(name: impl Into<String>, width: Width) -> Self {
        Self {
            kind: ImmediateKind::Symbol(name.into()),
            width,
        }
    }

    pub fn symbol_name(&self) -> Option<&str> {
        match &self.kind {
            ImmediateKind::Symbol(name) => Some(name),
            ImmediateKind::Literal(_) => None,
        }
    }
}

/// A value source operand: immediate or register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Imm(ImmediateExpr),
    Reg(Register),
}

/// An address operand: absolute (literal or label) or register-indirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Abs(ImmediateExpr),
    Reg(Register),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Or,
    And,
    Xor,
    Cmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Inc,
    Dec,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCond {
    Always,
    Zero,
    NotZero,
    Greater,
    GreaterOrZero,
    Less,
    LessOrZero,
    Overflow,
    DivByZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    End,
    Vsync,
    Brk,
    Ret,
    PushAll,
    PopAll,
    Mov { dst: Register, src: Source },
    Alu { op: AluOp, dst: Register, src: Source },
    Unary { op: UnaryOp, reg: Register },
    Load { width: Width, dst: Register, addr: Address },
    Store { width: Width, addr: Address, src: Source },
    Jump { cond: JumpCond, target: Address },
    Call { target: Address },
    Push { src: Source },
    Pop { reg: Register },
    Out { width: Width, addr: Address, src: Source },
}

impl Instruction {
    /// The register this instruction writes, if any. Used by the checker to
    /// reject writes to engine-owned registers.
    pub fn write_target(&self) -> Option<Register> {
        match self {
            Instruction::Mov { dst, .. } => Some(*dst),
            // `cmp` only writes flags, through the engine.
            Instruction::Alu {
                op: AluOp::Cmp, ..
            } => None,
            Instruction::Alu { dst, .. } => Some(*dst),
            Instruction::Unary { reg, .. } => Some(*reg),
            Instruction::Load { dst, .. } => Some(*dst),
            Instruction::Pop { reg } => Some(*reg),
            Instruction::Nop
            | Instruction::End
            | Instruction::Vsync
            | Instruction::Brk
            | Instruction::Ret
            | Instruction::PushAll
            | Instruction::PopAll
            | Instruction::Store { .. }
            | Instruction::Jump { .. }
            | Instruction::Call { .. }
            | Instruction::Push { .. }
            | Instruction::Out { .. } => None,
        }
    }

    /// Every immediate operand, for reference scanning.
    pub fn immediates(&self) -> Vec<&ImmediateExpr> {
        let mut out = Vec::new();
        match self {
            Instruction::Mov { src, .. }
            | Instruction::Alu { src, .. }
            | Instruction::Push { src } => {
                if let Source::Imm(imm) = src {
                    out.push(imm);
                }
            }
            Instruction::Load { addr, .. } => {
                if let Address::Abs(imm) = addr {
                    out.push(imm);
                }
            }
            Instruction::Store { addr, src, .. } | Instruction::Out { addr, src, .. } => {
                if let Address::Abs(imm) = addr {
                    out.push(imm);
                }
                if let Source::Imm(imm) = src {
                    out.push(imm);
                }
            }
            Instruction::Jump { target, .. } | Instruction::Call { target } => {
                if let Address::Abs(imm) = target {
                    out.push(imm);
                }
            }
            Instruction::Nop
            | Instruction::End
            | Instruction::Vsync
            | Instruction::Brk
            | Instruction::Ret
            | Instruction::PushAll
            | Instruction::PopAll
            | Instruction::Unary { .. }
            | Instruction::Pop { .. } => {}
        }
        out
    }

    /// Mutable references to every immediate operand, for macro expansion.
    pub fn immediates_mut(&mut self) -> Vec<&mut ImmediateExpr> {
        let mut out = Vec::new();
        match self {
            Instruction::Mov { src, .. }
            | Instruction::Alu { src, .. }
            | Instruction::Push { src } => {
                if let Source::Imm(imm) = src {
                    out.push(imm);
                }
            }
            Instruction::Load { addr, .. } => {
                if let Address::Abs(imm) = addr {
                    out.push(imm);
                }
            }
            Instruction::Store { addr, src, .. } | Instruction::Out { addr, src, .. } => {
                if let Address::Abs(imm) = addr {
                    out.push(imm);
                }
                if let Source::Imm(imm) = src {
                    out.push(imm);
                }
            }
            Instruction::Jump { target, .. } | Instruction::Call { target } => {
                if let Address::Abs(imm) = target {
                    out.push(imm);
                }
            }
            Instruction::Nop
            | Instruction::End
            | Instruction::Vsync
            | Instruction::Brk
            | Instruction::Ret
            | Instruction::PushAll
            | Instruction::PopAll
            | Instruction::Unary { .. }
            | Instruction::Pop { .. } => {}
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDirective {
    /// `db` - literal bytes.
    Bytes(Vec<ImmediateExpr>),
    /// `dw` - big-endian words.
    Words(Vec<ImmediateExpr>),
    /// `dstr` - length-prefixed string: one length byte, then the raw bytes.
    Str(Vec<u8>),
}

impl DataDirective {
    pub fn immediates(&self) -> Vec<&ImmediateExpr> {
        match self {
            DataDirective::Bytes(values) | DataDirective::Words(values) => values.iter().collect(),
            DataDirective::Str(_) => Vec::new(),
        }
    }

    pub fn immediates_mut(&mut self) -> Vec<&mut ImmediateExpr> {
        match self {
            DataDirective::Bytes(values) | DataDirective::Words(values) => {
                values.iter_mut().collect()
            }
            DataDirective::Str(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Instruction { instr: Instruction, line: u32 },
    Label { name: String, line: u32 },
    Data { directive: DataDirective, line: u32 },
}

/// A `proc name: ... ret` declaration. The closing `ret` is part of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcDecl {
    pub name: String,
    pub public: bool,
    pub body: Vec<Statement>,
    pub line: u32,
}

/// An `imm8`/`imm16` named-constant declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmDecl {
    pub name: String,
    pub public: bool,
    pub width: Width,
    pub value: u16,
    pub line: u32,
}

/// A `use a, b from path` import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseDecl {
    pub path: String,
    pub names: Vec<String>,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Entrypoint,
    Library,
}

/// Top-level items in declaration order; codegen emits them in this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Statement(Statement),
    Proc(ProcDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAst {
    pub path: String,
    pub kind: ModuleKind,
    pub items: Vec<Item>,
    pub imms: Vec<ImmDecl>,
    pub uses: Vec<UseDecl>,
}

impl ModuleAst {
    pub fn new(path: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            path: path.into(),
            kind,
            items: Vec::new(),
            imms: Vec::new(),
            uses: Vec::new(),
        }
    }

    /// All statements, top-level and inside procedures, in declaration order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.items.iter().flat_map(|item| match item {
            Item::Statement(stmt) => std::slice::from_ref(stmt).iter(),
            Item::Proc(proc) => proc.body.iter(),
        })
    }

    pub fn statements_mut(&mut self) -> impl Iterator<Item = &mut Statement> {
        self.items.iter_mut().flat_map(|item| match item {
            Item::Statement(stmt) => std::slice::from_mut(stmt).iter_mut(),
            Item::Proc(proc) => proc.body.iter_mut(),
        })
    }

    pub fn imm_decl(&self, name: &str) -> Option<&ImmDecl> {
        self.imms
            .iter()
            .find(|decl| decl.name.eq_ignore_ascii_case(name))
    }

}

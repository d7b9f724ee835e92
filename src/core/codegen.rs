// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Per-module byte emission.
//!
//! Produces one [`CodeModule`] per source module: raw bytes with label
//! offsets recorded and symbolic operands left as zero-filled fixup sites
//! for the linker. Words are big-endian.

use std::collections::{HashMap, HashSet};

use crate::core::ast::{
    Address, AluOp, DataDirective, ImmediateExpr, ImmediateKind, Instruction, Item, JumpCond,
    ModuleAst, Source, Statement, UnaryOp, UseDecl,
};
use crate::core::cpu::{Opcode, Width};
use crate::core::error::{AsmError, AsmErrorKind, Diagnostic};
use crate::core::resolver::exported_names;

/// A symbolic operand awaiting an address from the linker. `offset` is the
/// position of the placeholder bytes within the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixupSite {
    pub offset: u16,
    pub symbol: String,
    pub width: Width,
    pub line: u32,
}

/// One module's generated code, ready for layout and linking.
#[derive(Debug, Clone)]
pub struct CodeModule {
    pub path: String,
    pub bytes: Vec<u8>,
    pub labels: HashMap<String, u16>,
    pub unresolved: Vec<FixupSite>,
    pub exports: HashSet<String>,
    pub imports: Vec<UseDecl>,
    /// Offset of the `main:` label when the module defines one.
    pub main_entry: Option<u16>,
}

pub fn generate_module(module: &ModuleAst) -> Result<CodeModule, Vec<Diagnostic>> {
    let mut gen = Generator {
        path: module.path.clone(),
        bytes: Vec::new(),
        labels: HashMap::new(),
        unresolved: Vec::new(),
        diagnostics: Vec::new(),
    };

    for item in &module.items {
        match item {
            Item::Statement(stmt) => gen.emit_statement(stmt),
            Item::Proc(proc) => {
                gen.define_label(&proc.name, proc.line);
                for stmt in &proc.body {
                    gen.emit_statement(stmt);
                }
            }
        }
    }

    if !gen.diagnostics.is_empty() {
        return Err(gen.diagnostics);
    }
    let main_entry = gen.labels.get("main").copied();
    Ok(CodeModule {
        path: gen.path,
        bytes: gen.bytes,
        labels: gen.labels,
        unresolved: gen.unresolved,
        exports: exported_names(module),
        imports: module.uses.clone(),
        main_entry,
    })
}

struct Generator {
    path: String,
    bytes: Vec<u8>,
    labels: HashMap<String, u16>,
    unresolved: Vec<FixupSite>,
    diagnostics: Vec<Diagnostic>,
}

impl Generator {
    fn offset(&self) -> u16 {
        self.bytes.len() as u16
    }

    fn define_label(&mut self, name: &str, line: u32) {
        if self.labels.contains_key(name) {
            self.diagnostics.push(
                Diagnostic::error(AsmError::new(
                    AsmErrorKind::Codegen,
                    format!("Duplicate label: {name}"),
                ))
                .in_module(&self.path)
                .at_line(line),
            );
            return;
        }
        self.labels.insert(name.to_string(), self.offset());
    }

    fn emit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Label { name, line } => self.define_label(name, *line),
            Statement::Instruction { instr, line } => self.emit_instruction(instr, *line),
            Statement::Data { directive, line } => self.emit_data(directive, *line),
        }
    }

    fn emit_data(&mut self, directive: &DataDirective, line: u32) {
        match directive {
            DataDirective::Bytes(values) => {
                for value in values {
                    self.emit_imm(value, line);
                }
            }
            DataDirective::Words(values) => {
                for value in values {
                    self.emit_imm(value, line);
                }
            }
            DataDirective::Str(text) => {
                self.bytes.push(text.len() as u8);
                self.bytes.extend_from_slice(text);
            }
        }
    }

    /// Literal values are written in place; symbols leave zeroed placeholder
    /// bytes and a fixup site.
    fn emit_imm(&mut self, imm: &ImmediateExpr, line: u32) {
        match &imm.kind {
            ImmediateKind::Literal(value) => match imm.width {
                Width::Byte => self.bytes.push(*value as u8),
                Width::Word => self.bytes.extend_from_slice(&value.to_be_bytes()),
            },
            ImmediateKind::Symbol(name) => {
                self.unresolved.push(FixupSite {
                    offset: self.offset(),
                    symbol: name.clone(),
                    width: imm.width,
                    line,
                });
                for _ in 0..imm.width.bytes() {
                    self.bytes.push(0);
                }
            }
        }
    }

    fn emit_instruction(&mut self, instr: &Instruction, line: u32) {
        match instr {
            Instruction::Nop => self.op(Opcode::Nop),
            Instruction::End => self.op(Opcode::End),
            Instruction::Vsync => self.op(Opcode::Vsync),
            Instruction::Brk => self.op(Opcode::Brk),
            Instruction::Ret => self.op(Opcode::Ret),
            Instruction::PushAll => self.op(Opcode::PushAll),
            Instruction::PopAll => self.op(Opcode::PopAll),
            Instruction::Mov { dst, src } => match src {
                Source::Imm(imm) => {
                    self.op(Opcode::MovImm);
                    self.bytes.push(dst.id());
                    self.emit_imm(imm, line);
                }
                Source::Reg(src) => {
                    self.op(Opcode::MovReg);
                    self.bytes.push(dst.id());
                    self.bytes.push(src.id());
                }
            },
            Instruction::Alu { op, dst, src } => {
                let opcode = alu_opcode(*op, matches!(src, Source::Imm(_)));
                self.op(opcode);
                self.bytes.push(dst.id());
                match src {
                    Source::Imm(imm) => self.emit_imm(imm, line),
                    Source::Reg(src) => self.bytes.push(src.id()),
                }
            }
            Instruction::Unary { op, reg } => {
                self.op(match op {
                    UnaryOp::Inc => Opcode::Inc,
                    UnaryOp::Dec => Opcode::Dec,
                    UnaryOp::Not => Opcode::Not,
                });
                self.bytes.push(reg.id());
            }
            Instruction::Load { width, dst, addr } => {
                let opcode = match (width, addr) {
                    (Width::Word, Address::Abs(_)) => Opcode::LodAbs,
                    (Width::Word, Address::Reg(_)) => Opcode::LodInd,
                    (Width::Byte, Address::Abs(_)) => Opcode::LodbAbs,
                    (Width::Byte, Address::Reg(_)) => Opcode::LodbInd,
                };
                self.op(opcode);
                self.bytes.push(dst.id());
                self.emit_address(addr, line);
            }
            Instruction::Store { width, addr, src } => {
                let opcode = match (width, src, addr) {
                    (Width::Word, Source::Imm(_), Address::Abs(_)) => Opcode::StoImmAbs,
                    (Width::Word, Source::Imm(_), Address::Reg(_)) => Opcode::StoImmInd,
                    (Width::Word, Source::Reg(_), Address::Abs(_)) => Opcode::StoRegAbs,
                    (Width::Word, Source::Reg(_), Address::Reg(_)) => Opcode::StoRegInd,
                    (Width::Byte, Source::Imm(_), Address::Abs(_)) => Opcode::StobImmAbs,
                    (Width::Byte, Source::Imm(_), Address::Reg(_)) => Opcode::StobImmInd,
                    (Width::Byte, Source::Reg(_), Address::Abs(_)) => Opcode::StobRegAbs,
                    (Width::Byte, Source::Reg(_), Address::Reg(_)) => Opcode::StobRegInd,
                };
                self.op(opcode);
                self.emit_address(addr, line);
                self.emit_source(src, line);
            }
            Instruction::Jump { cond, target } => {
                let opcode = jump_opcode(*cond, matches!(target, Address::Abs(_)));
                self.op(opcode);
                self.emit_address(target, line);
            }
            Instruction::Call { target } => {
                self.op(match target {
                    Address::Abs(_) => Opcode::CallAbs,
                    Address::Reg(_) => Opcode::CallReg,
                });
                self.emit_address(target, line);
            }
            Instruction::Push { src } => match src {
                Source::Imm(imm) => {
                    self.op(Opcode::PushImm);
                    self.emit_imm(imm, line);
                }
                Source::Reg(reg) => {
                    self.op(Opcode::PushReg);
                    self.bytes.push(reg.id());
                }
            },
            Instruction::Pop { reg } => {
                self.op(Opcode::Pop);
                self.bytes.push(reg.id());
            }
            Instruction::Out { width, addr, src } => {
                let opcode = match (width, src, addr) {
                    (Width::Word, Source::Imm(_), Address::Abs(_)) => Opcode::OutImmAbs,
                    (Width::Word, Source::Imm(_), Address::Reg(_)) => Opcode::OutImmInd,
                    (Width::Word, Source::Reg(_), Address::Abs(_)) => Opcode::OutRegAbs,
                    (Width::Word, Source::Reg(_), Address::Reg(_)) => Opcode::OutRegInd,
                    (Width::Byte, Source::Imm(_), Address::Abs(_)) => Opcode::OutbImmAbs,
                    (Width::Byte, Source::Imm(_), Address::Reg(_)) => Opcode::OutbImmInd,
                    (Width::Byte, Source::Reg(_), Address::Abs(_)) => Opcode::OutbRegAbs,
                    (Width::Byte, Source::Reg(_), Address::Reg(_)) => Opcode::OutbRegInd,
                };
                self.op(opcode);
                self.emit_address(addr, line);
                self.emit_source(src, line);
            }
        }
    }

    fn emit_address(&mut self, addr: &Address, line: u32) {
        match addr {
            Address::Abs(imm) => self.emit_imm(imm, line),
            Address::Reg(reg) => self.bytes.push(reg.id()),
        }
    }

    fn emit_source(&mut self, src: &Source, line: u32) {
        match src {
            Source::Imm(imm) => self.emit_imm(imm, line),
            Source::Reg(reg) => self.bytes.push(reg.id()),
        }
    }

    fn op(&mut self, opcode: Opcode) {
        self.bytes.push(opcode.byte());
    }
}

fn alu_opcode(op: AluOp, imm: bool) -> Opcode {
    match (op, imm) {
        (AluOp::Add, true) => Opcode::AddImm,
        (AluOp::Add, false) => Opcode::AddReg,
        (AluOp::Sub, true) => Opcode::SubImm,
        (AluOp::Sub, false) => Opcode::SubReg,
        (AluOp::Mul, true) => Opcode::MulImm,
        (AluOp::Mul, false) => Opcode::MulReg,
        (AluOp::Div, true) => Opcode::DivImm,
        (AluOp::Div, false) => Opcode::DivReg,
        (AluOp::Mod, true) => Opcode::ModImm,
        (AluOp::Mod, false) => Opcode::ModReg,
        (AluOp::Shl, true) => Opcode::ShlImm,
        (AluOp::Shl, false) => Opcode::ShlReg,
        (AluOp::Shr, true) => Opcode::ShrImm,
        (AluOp::Shr, false) => Opcode::ShrReg,
        (AluOp::Or, true) => Opcode::OrImm,
        (AluOp::Or, false) => Opcode::OrReg,
        (AluOp::And, true) => Opcode::AndImm,
        (AluOp::And, false) => Opcode::AndReg,
        (AluOp::Xor, true) => Opcode::XorImm,
        (AluOp::Xor, false) => Opcode::XorReg,
        (AluOp::Cmp, true) => Opcode::CmpImm,
        (AluOp::Cmp, false) => Opcode::CmpReg,
    }
}

fn jump_opcode(cond: JumpCond, abs: bool) -> Opcode {
    match (cond, abs) {
        (JumpCond::Always, true) => Opcode::JmpAbs,
        (JumpCond::Always, false) => Opcode::JmpReg,
        (JumpCond::Zero, true) => Opcode::JzAbs,
        (JumpCond::Zero, false) => Opcode::JzReg,
        (JumpCond::NotZero, true) => Opcode::JnzAbs,
        (JumpCond::NotZero, false) => Opcode::JnzReg,
        (JumpCond::Greater, true) => Opcode::JgAbs,
        (JumpCond::Greater, false) => Opcode::JgReg,
        (JumpCond::GreaterOrZero, true) => Opcode::JgzAbs,
        (JumpCond::GreaterOrZero, false) => Opcode::JgzReg,
        (JumpCond::Less, true) => Opcode::JlAbs,
        (JumpCond::Less, false) => Opcode::JlReg,
        (JumpCond::LessOrZero, true) => Opcode::JlzAbs,
        (JumpCond::LessOrZero, false) => Opcode::JlzReg,
        (JumpCond::Overflow, true) => Opcode::JoAbs,
        (JumpCond::Overflow, false) => Opcode::JoReg,
        (JumpCond::DivByZero, true) => Opcode::JdzAbs,
        (JumpCond::DivByZero, false) => Opcode::JdzReg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ast::ModuleKind;
    use crate::core::parser::parse_module;

    fn generate(source: &str) -> CodeModule {
        let module = parse_module("test", source, ModuleKind::Entrypoint).expect("parse");
        generate_module(&module).expect("generate")
    }

    #[test]
    fn encodes_mov_immediate_big_endian() {
        let code = generate("mov r3, 0x1234");
        assert_eq!(code.bytes, vec![Opcode::MovImm.byte(), 3, 0x12, 0x34]);
    }

    #[test]
    fn encodes_register_forms_compactly() {
        let code = generate("mov r1, r2\ninc r5\nend");
        assert_eq!(
            code.bytes,
            vec![
                Opcode::MovReg.byte(),
                1,
                2,
                Opcode::Inc.byte(),
                5,
                Opcode::End.byte(),
            ]
        );
    }

    #[test]
    fn encodes_store_operand_order_addr_then_value() {
        let code = generate("stob 0x3fff, 0x41");
        assert_eq!(
            code.bytes,
            vec![Opcode::StobImmAbs.byte(), 0x3f, 0xff, 0x41]
        );
    }

    #[test]
    fn label_reference_leaves_fixup_site() {
        let code = generate("jmp skip\nnop\nskip: end");
        assert_eq!(code.bytes[0], Opcode::JmpAbs.byte());
        assert_eq!(&code.bytes[1..3], &[0, 0]);
        assert_eq!(code.unresolved.len(), 1);
        assert_eq!(code.unresolved[0].symbol, "skip");
        assert_eq!(code.unresolved[0].offset, 1);
        assert_eq!(code.labels["skip"], 4);
    }

    #[test]
    fn dstr_is_length_prefixed() {
        let code = generate("greeting: dstr \"hello world\"");
        assert_eq!(code.bytes[0], 11);
        assert_eq!(&code.bytes[1..], b"hello world");
        assert_eq!(code.labels["greeting"], 0);
    }

    #[test]
    fn dw_emits_big_endian_words() {
        let code = generate("dw 0x1234, 7");
        assert_eq!(code.bytes, vec![0x12, 0x34, 0x00, 0x07]);
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let module =
            parse_module("test", "here: nop\nhere: end", ModuleKind::Entrypoint).expect("parse");
        let diags = generate_module(&module).unwrap_err();
        assert!(diags[0].error.message.contains("Duplicate label: here"));
    }

    #[test]
    fn main_label_recorded_as_entry() {
        let code = generate("nop\nmain: mov r0, 1\nend");
        assert_eq!(code.main_entry, Some(1));
        assert!(generate("nop\nend").main_entry.is_none());
    }

    #[test]
    fn proc_name_defines_its_label() {
        let code = generate("proc wait:\n nop\n ret\ncall wait");
        assert_eq!(code.labels["wait"], 0);
        assert!(code.exports.is_empty());
        let code = generate("pub proc wait:\n ret");
        assert!(code.exports.contains("wait"));
    }
}

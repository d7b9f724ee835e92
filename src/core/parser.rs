// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Recursive-descent parser for tokenized module source.
//!
//! One token of lookahead, fail-fast: the first parse error aborts the
//! module, matching the tokenizer's policy.

use crate::core::ast::{
    Address, AluOp, DataDirective, ImmDecl, ImmediateExpr, Instruction, Item, JumpCond, ModuleAst,
    ModuleKind, ProcDecl, Source, Statement, UnaryOp, UseDecl,
};
use crate::core::cpu::{Register, Width};
use crate::core::error::AsmErrorKind;
use crate::core::tokenizer::{Keyword, Span, Token, TokenKind, Tokenizer};

/// A fatal lexical or syntactic error. `kind` distinguishes the two for
/// diagnostic labeling.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: AsmErrorKind,
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: AsmErrorKind::Parse,
            message: message.into(),
            span,
        }
    }
}

/// Tokenize and parse one module's source text.
pub fn parse_module(
    path: &str,
    source: &str,
    kind: ModuleKind,
) -> Result<ModuleAst, ParseError> {
    let tokens = Tokenizer::tokenize(source).map_err(|err| ParseError {
        kind: AsmErrorKind::Lex,
        message: err.message,
        span: err.span,
    })?;
    Parser::new(tokens).parse(path, kind)
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    pub fn parse(mut self, path: &str, kind: ModuleKind) -> Result<ModuleAst, ParseError> {
        let mut module = ModuleAst::new(path, kind);
        loop {
            self.skip_eols();
            if matches!(self.peek().kind, TokenKind::Eof) {
                return Ok(module);
            }
            self.parse_top_level(&mut module)?;
        }
    }

    fn parse_top_level(&mut self, module: &mut ModuleAst) -> Result<(), ParseError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Identifier(_) => {
                let stmt = self.parse_label()?;
                module.items.push(Item::Statement(stmt));
                Ok(())
            }
            TokenKind::Keyword(Keyword::Pub) => {
                self.advance();
                match self.peek().kind {
                    TokenKind::Keyword(Keyword::Proc) => {
                        let proc = self.parse_proc(true)?;
                        module.items.push(Item::Proc(proc));
                        Ok(())
                    }
                    TokenKind::Keyword(Keyword::Imm8) | TokenKind::Keyword(Keyword::Imm16) => {
                        let decl = self.parse_imm_decl(true)?;
                        module.imms.push(decl);
                        Ok(())
                    }
                    _ => Err(ParseError::new(
                        "Expected proc, imm8, or imm16 after pub",
                        self.peek().span,
                    )),
                }
            }
            TokenKind::Keyword(Keyword::Proc) => {
                let proc = self.parse_proc(false)?;
                module.items.push(Item::Proc(proc));
                Ok(())
            }
            TokenKind::Keyword(Keyword::Imm8) | TokenKind::Keyword(Keyword::Imm16) => {
                let decl = self.parse_imm_decl(false)?;
                module.imms.push(decl);
                Ok(())
            }
            TokenKind::Keyword(Keyword::Use) => {
                let use_decl = self.parse_use()?;
                module.uses.push(use_decl);
                Ok(())
            }
            TokenKind::Keyword(_) => {
                let stmt = self.parse_statement()?;
                module.items.push(Item::Statement(stmt));
                Ok(())
            }
            _ => Err(self.unrecognized(&token)),
        }
    }

    /// A statement valid both at top level and inside a procedure body:
    /// label definition, data directive, or instruction.
    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Identifier(_) => self.parse_label(),
            TokenKind::Keyword(Keyword::Db) => self.parse_data_bytes(),
            TokenKind::Keyword(Keyword::Dw) => self.parse_data_words(),
            TokenKind::Keyword(Keyword::Dstr) => self.parse_data_str(),
            TokenKind::Keyword(keyword) => self.parse_instruction(*keyword, token.span),
            _ => Err(self.unrecognized(&token)),
        }
    }

    fn parse_label(&mut self) -> Result<Statement, ParseError> {
        let token = self.advance();
        let name = match token.kind {
            TokenKind::Identifier(name) => name,
            _ => unreachable!("caller checked for identifier"),
        };
        if !matches!(self.peek().kind, TokenKind::Colon) {
            return Err(self.unrecognized(&Token {
                kind: TokenKind::Identifier(name),
                span: token.span,
            }));
        }
        self.advance();
        Ok(Statement::Label {
            name,
            line: token.span.line,
        })
    }

    fn parse_instruction(&mut self, keyword: Keyword, span: Span) -> Result<Statement, ParseError> {
        self.advance();
        let line = span.line;
        let instr = match keyword {
            Keyword::Nop => Instruction::Nop,
            Keyword::End => Instruction::End,
            Keyword::Vsync => Instruction::Vsync,
            Keyword::Brk => Instruction::Brk,
            Keyword::Ret => Instruction::Ret,
            Keyword::PushAll => Instruction::PushAll,
            Keyword::PopAll => Instruction::PopAll,
            Keyword::Mov => {
                let dst = self.expect_register()?;
                self.expect_comma()?;
                let src = self.parse_source(Width::Word)?;
                Instruction::Mov { dst, src }
            }
            Keyword::Add
            | Keyword::Sub
            | Keyword::Mul
            | Keyword::Div
            | Keyword::Mod
            | Keyword::Shl
            | Keyword::Shr
            | Keyword::Or
            | Keyword::And
            | Keyword::Xor
            | Keyword::Cmp => {
                let op = match keyword {
                    Keyword::Add => AluOp::Add,
                    Keyword::Sub => AluOp::Sub,
                    Keyword::Mul => AluOp::Mul,
                    Keyword::Div => AluOp::Div,
                    Keyword::Mod => AluOp::Mod,
                    Keyword::Shl => AluOp::Shl,
                    Keyword::Shr => AluOp::Shr,
                    Keyword::Or => AluOp::Or,
                    Keyword::And => AluOp::And,
                    Keyword::Xor => AluOp::Xor,
                    _ => AluOp::Cmp,
                };
                let dst = self.expect_register()?;
                self.expect_comma()?;
                let src = self.parse_source(Width::Word)?;
                Instruction::Alu { op, dst, src }
            }
            Keyword::Inc | Keyword::Dec | Keyword::Not => {
                let op = match keyword {
                    Keyword::Inc => UnaryOp::Inc,
                    Keyword::Dec => UnaryOp::Dec,
                    _ => UnaryOp::Not,
                };
                let reg = self.expect_register()?;
                Instruction::Unary { op, reg }
            }
            Keyword::Lod | Keyword::Lodb => {
                let width = if keyword == Keyword::Lod {
                    Width::Word
                } else {
                    Width::Byte
                };
                let dst = self.expect_register()?;
                self.expect_comma()?;
                let addr = self.parse_address()?;
                Instruction::Load { width, dst, addr }
            }
            Keyword::Sto | Keyword::Stob => {
                let width = if keyword == Keyword::Sto {
                    Width::Word
                } else {
                    Width::Byte
                };
                let addr = self.parse_address()?;
                self.expect_comma()?;
                let src = self.parse_source(width)?;
                Instruction::Store { width, addr, src }
            }
            Keyword::Jmp
            | Keyword::Jz
            | Keyword::Jnz
            | Keyword::Jg
            | Keyword::Jgz
            | Keyword::Jl
            | Keyword::Jlz
            | Keyword::Jo
            | Keyword::Jdz => {
                let cond = match keyword {
                    Keyword::Jmp => JumpCond::Always,
                    Keyword::Jz => JumpCond::Zero,
                    Keyword::Jnz => JumpCond::NotZero,
                    Keyword::Jg => JumpCond::Greater,
                    Keyword::Jgz => JumpCond::GreaterOrZero,
                    Keyword::Jl => JumpCond::Less,
                    Keyword::Jlz => JumpCond::LessOrZero,
                    Keyword::Jo => JumpCond::Overflow,
                    _ => JumpCond::DivByZero,
                };
                let target = self.parse_address()?;
                Instruction::Jump { cond, target }
            }
            Keyword::Call => {
                let target = self.parse_address()?;
                Instruction::Call { target }
            }
            Keyword::Push => {
                let src = self.parse_source(Width::Word)?;
                Instruction::Push { src }
            }
            Keyword::Pop => {
                let reg = self.expect_register()?;
                Instruction::Pop { reg }
            }
            Keyword::Out | Keyword::Outb => {
                let width = if keyword == Keyword::Out {
                    Width::Word
                } else {
                    Width::Byte
                };
                let addr = self.parse_address()?;
                self.expect_comma()?;
                let src = self.parse_source(width)?;
                Instruction::Out { width, addr, src }
            }
            Keyword::Proc
            | Keyword::Pub
            | Keyword::Use
            | Keyword::From
            | Keyword::Imm8
            | Keyword::Imm16
            | Keyword::Db
            | Keyword::Dw
            | Keyword::Dstr => {
                return Err(ParseError::new(
                    "Declaration not allowed here",
                    span,
                ))
            }
        };
        self.expect_end_of_statement()?;
        Ok(Statement::Instruction { instr, line })
    }

    fn parse_proc(&mut self, public: bool) -> Result<ProcDecl, ParseError> {
        let proc_span = self.advance().span;
        let name = self.expect_name()?;
        self.expect_colon()?;
        let mut body = Vec::new();
        loop {
            self.skip_eols();
            if matches!(self.peek().kind, TokenKind::Eof) {
                return Err(ParseError::new(
                    format!("Procedure without ret: {name}"),
                    proc_span,
                ));
            }
            let stmt = self.parse_statement()?;
            let done = matches!(
                stmt,
                Statement::Instruction {
                    instr: Instruction::Ret,
                    ..
                }
            );
            body.push(stmt);
            if done {
                return Ok(ProcDecl {
                    name,
                    public,
                    body,
                    line: proc_span.line,
                });
            }
        }
    }

    fn parse_imm_decl(&mut self, public: bool) -> Result<ImmDecl, ParseError> {
        let token = self.advance();
        let width = match token.kind {
            TokenKind::Keyword(Keyword::Imm8) => Width::Byte,
            _ => Width::Word,
        };
        let name = self.expect_name()?;
        self.expect_colon()?;
        let (value, span) = self.expect_number()?;
        if !width.fits(value) {
            return Err(ParseError::new(
                format!("Immediate does not fit in a byte: {value}"),
                span,
            ));
        }
        self.expect_end_of_statement()?;
        Ok(ImmDecl {
            name,
            public,
            width,
            value,
            line: token.span.line,
        })
    }

    fn parse_use(&mut self) -> Result<UseDecl, ParseError> {
        let use_span = self.advance().span;
        let mut names = vec![self.expect_name()?];
        while matches!(self.peek().kind, TokenKind::Comma) {
            self.advance();
            names.push(self.expect_name()?);
        }
        match self.peek().kind {
            TokenKind::Keyword(Keyword::From) => {
                self.advance();
            }
            _ => {
                return Err(ParseError::new(
                    "Expected from in use declaration",
                    self.peek().span,
                ))
            }
        }
        let token = self.advance();
        let path = match token.kind {
            TokenKind::Identifier(name) => name,
            TokenKind::Str(lit) => String::from_utf8_lossy(&lit.bytes).to_string(),
            _ => {
                return Err(ParseError::new(
                    format!("Expected module path, found {}", token.to_source_text()),
                    token.span,
                ))
            }
        };
        self.expect_end_of_statement()?;
        Ok(UseDecl {
            path,
            names,
            line: use_span.line,
        })
    }

    fn parse_data_bytes(&mut self) -> Result<Statement, ParseError> {
        let span = self.advance().span;
        let values = self.parse_immediate_list(Width::Byte)?;
        self.expect_end_of_statement()?;
        Ok(Statement::Data {
            directive: DataDirective::Bytes(values),
            line: span.line,
        })
    }

    fn parse_data_words(&mut self) -> Result<Statement, ParseError> {
        let span = self.advance().span;
        let values = self.parse_immediate_list(Width::Word)?;
        self.expect_end_of_statement()?;
        Ok(Statement::Data {
            directive: DataDirective::Words(values),
            line: span.line,
        })
    }

    fn parse_data_str(&mut self) -> Result<Statement, ParseError> {
        let span = self.advance().span;
        let token = self.advance();
        let bytes = match token.kind {
            TokenKind::Str(lit) => lit.bytes,
            _ => {
                return Err(ParseError::new(
                    format!("Expected string, found {}", self.describe(&token)),
                    token.span,
                ))
            }
        };
        if bytes.len() > 0xff {
            return Err(ParseError::new(
                "String constant longer than 255 bytes",
                token.span,
            ));
        }
        self.expect_end_of_statement()?;
        Ok(Statement::Data {
            directive: DataDirective::Str(bytes),
            line: span.line,
        })
    }

    fn parse_immediate_list(&mut self, width: Width) -> Result<Vec<ImmediateExpr>, ParseError> {
        let mut values = vec![self.parse_immediate(width)?];
        while matches!(self.peek().kind, TokenKind::Comma) {
            self.advance();
            values.push(self.parse_immediate(width)?);
        }
        Ok(values)
    }

    /// A literal or still-symbolic immediate of the given width.
    fn parse_immediate(&mut self, width: Width) -> Result<ImmediateExpr, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(num) => {
                if !width.fits(num.value) {
                    return Err(ParseError::new(
                        format!("Immediate does not fit in a byte: {}", num.text),
                        token.span,
                    ));
                }
                Ok(ImmediateExpr::literal(num.value, width))
            }
            TokenKind::Identifier(name) => Ok(ImmediateExpr::symbol(name, width)),
            _ => Err(ParseError::new(
                format!("Expected immediate, found {}", self.describe(&token)),
                token.span,
            )),
        }
    }

    fn parse_source(&mut self, width: Width) -> Result<Source, ParseError> {
        if let TokenKind::Register(reg) = self.peek().kind {
            self.advance();
            return Ok(Source::Reg(reg));
        }
        Ok(Source::Imm(self.parse_immediate(width)?))
    }

    fn parse_address(&mut self) -> Result<Address, ParseError> {
        if let TokenKind::Register(reg) = self.peek().kind {
            self.advance();
            return Ok(Address::Reg(reg));
        }
        Ok(Address::Abs(self.parse_immediate(Width::Word)?))
    }

    fn expect_register(&mut self) -> Result<Register, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Register(reg) => Ok(reg),
            _ => Err(ParseError::new(
                format!("Expected register, found {}", self.describe(&token)),
                token.span,
            )),
        }
    }

    /// A plain identifier naming a symbol being declared.
    fn expect_name(&mut self) -> Result<String, ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Identifier(name) => Ok(name),
            _ => Err(ParseError::new(
                format!("Expected name, found {}", self.describe(&token)),
                token.span,
            )),
        }
    }

    fn expect_number(&mut self) -> Result<(u16, Span), ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(num) => Ok((num.value, token.span)),
            _ => Err(ParseError::new(
                format!("Expected number, found {}", self.describe(&token)),
                token.span,
            )),
        }
    }

    fn expect_comma(&mut self) -> Result<(), ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Comma => Ok(()),
            _ => Err(ParseError::new(
                format!("Expected ',', found {}", self.describe(&token)),
                token.span,
            )),
        }
    }

    fn expect_colon(&mut self) -> Result<(), ParseError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Colon => Ok(()),
            _ => Err(ParseError::new(
                format!("Expected ':', found {}", self.describe(&token)),
                token.span,
            )),
        }
    }

    fn expect_end_of_statement(&mut self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Eol => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => {
                let token = self.peek().clone();
                Err(ParseError::new(
                    format!("Expected end of line, found {}", self.describe(&token)),
                    token.span,
                ))
            }
        }
    }

    fn unrecognized(&self, token: &Token) -> ParseError {
        ParseError::new(
            format!("Unrecognized statement: {}", token.to_source_text()),
            token.span,
        )
    }

    fn describe(&self, token: &Token) -> String {
        match &token.kind {
            TokenKind::Identifier(name) => format!("identifier {name}"),
            TokenKind::Register(reg) => format!("register {}", reg.name()),
            TokenKind::Keyword(_) => format!("keyword {}", token.to_source_text()),
            TokenKind::Number(num) => format!("number {}", num.text),
            TokenKind::Str(lit) => format!("string {}", lit.raw),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Eol => "end of line".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }

    fn skip_eols(&mut self) {
        while matches!(self.peek().kind, TokenKind::Eol) {
            self.index += 1;
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::parse_module;
    use crate::core::ast::{
        Address, AluOp, DataDirective, ImmediateExpr, Instruction, Item, JumpCond, ModuleKind,
        Source, Statement,
    };
    use crate::core::cpu::{Register, Width};

    fn parse(source: &str) -> crate::core::ast::ModuleAst {
        parse_module("test", source, ModuleKind::Entrypoint).expect("parse")
    }

    fn first_instruction(source: &str) -> Instruction {
        let module = parse(source);
        match &module.items[0] {
            Item::Statement(Statement::Instruction { instr, .. }) => instr.clone(),
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn parses_no_operand_forms() {
        assert_eq!(first_instruction("nop"), Instruction::Nop);
        assert_eq!(first_instruction("end"), Instruction::End);
        assert_eq!(first_instruction("vsync"), Instruction::Vsync);
        assert_eq!(first_instruction("pushall"), Instruction::PushAll);
    }

    #[test]
    fn parses_mov_immediate_and_register() {
        assert_eq!(
            first_instruction("mov r0, 0x1234"),
            Instruction::Mov {
                dst: Register::gp(0),
                src: Source::Imm(ImmediateExpr::literal(0x1234, Width::Word)),
            }
        );
        assert_eq!(
            first_instruction("mov r1, r2"),
            Instruction::Mov {
                dst: Register::gp(1),
                src: Source::Reg(Register::gp(2)),
            }
        );
    }

    #[test]
    fn parses_alu_and_unary() {
        assert_eq!(
            first_instruction("add r3, 5"),
            Instruction::Alu {
                op: AluOp::Add,
                dst: Register::gp(3),
                src: Source::Imm(ImmediateExpr::literal(5, Width::Word)),
            }
        );
        assert_eq!(
            first_instruction("inc r7"),
            Instruction::Unary {
                op: crate::core::ast::UnaryOp::Inc,
                reg: Register::gp(7),
            }
        );
    }

    #[test]
    fn parses_memory_forms() {
        assert_eq!(
            first_instruction("lod r0, 0x2000"),
            Instruction::Load {
                width: Width::Word,
                dst: Register::gp(0),
                addr: Address::Abs(ImmediateExpr::literal(0x2000, Width::Word)),
            }
        );
        assert_eq!(
            first_instruction("lodb r0, buffer"),
            Instruction::Load {
                width: Width::Byte,
                dst: Register::gp(0),
                addr: Address::Abs(ImmediateExpr::symbol("buffer", Width::Word)),
            }
        );
        assert_eq!(
            first_instruction("sto r4, r5"),
            Instruction::Store {
                width: Width::Word,
                addr: Address::Reg(Register::gp(4)),
                src: Source::Reg(Register::gp(5)),
            }
        );
        assert_eq!(
            first_instruction("stob 0x2000, 0xff"),
            Instruction::Store {
                width: Width::Byte,
                addr: Address::Abs(ImmediateExpr::literal(0x2000, Width::Word)),
                src: Source::Imm(ImmediateExpr::literal(0xff, Width::Byte)),
            }
        );
    }

    #[test]
    fn parses_jumps_and_label_targets() {
        assert_eq!(
            first_instruction("jz done"),
            Instruction::Jump {
                cond: JumpCond::Zero,
                target: Address::Abs(ImmediateExpr::symbol("done", Width::Word)),
            }
        );
        assert_eq!(
            first_instruction("jmp r9"),
            Instruction::Jump {
                cond: JumpCond::Always,
                target: Address::Reg(Register::gp(9)),
            }
        );
    }

    #[test]
    fn label_may_precede_statement_on_one_line() {
        let module = parse("done: end");
        assert!(matches!(
            &module.items[0],
            Item::Statement(Statement::Label { name, .. }) if name == "done"
        ));
        assert!(matches!(
            &module.items[1],
            Item::Statement(Statement::Instruction {
                instr: Instruction::End,
                ..
            })
        ));
    }

    #[test]
    fn parses_data_directives() {
        let module = parse("db 1, 2, 0xff\ndw 0xffff\ndstr \"hello world\"");
        assert!(matches!(
            &module.items[0],
            Item::Statement(Statement::Data {
                directive: DataDirective::Bytes(values),
                ..
            }) if values.len() == 3
        ));
        assert!(matches!(
            &module.items[2],
            Item::Statement(Statement::Data {
                directive: DataDirective::Str(bytes),
                ..
            }) if bytes == b"hello world"
        ));
    }

    #[test]
    fn db_rejects_word_values() {
        let err = parse_module("test", "db 0x100", ModuleKind::Entrypoint).unwrap_err();
        assert!(err.message.contains("fit in a byte"));
    }

    #[test]
    fn parses_proc_with_ret() {
        let module = parse("pub proc blink:\n  mov r0, 1\n  ret");
        match &module.items[0] {
            Item::Proc(proc) => {
                assert_eq!(proc.name, "blink");
                assert!(proc.public);
                assert_eq!(proc.body.len(), 2);
            }
            other => panic!("expected proc, got {other:?}"),
        }
    }

    #[test]
    fn proc_without_ret_is_rejected() {
        let err = parse_module("test", "proc f:\nmov r0, 1", ModuleKind::Library).unwrap_err();
        assert!(err.message.contains("Procedure without ret"));
    }

    #[test]
    fn parses_use_and_imm_declarations() {
        let module = parse("use blink, delay from \"gfx\"\npub imm16 vram: 0x2000\nimm8 tiny: 3");
        assert_eq!(module.uses.len(), 1);
        assert_eq!(module.uses[0].path, "gfx");
        assert_eq!(module.uses[0].names, vec!["blink", "delay"]);
        assert_eq!(module.imms.len(), 2);
        assert!(module.imms[0].public);
        assert_eq!(module.imms[1].width, Width::Byte);
        assert_eq!(module.imms[1].value, 3);
    }

    #[test]
    fn imm8_value_must_fit() {
        let err = parse_module("test", "imm8 big: 0x100", ModuleKind::Library).unwrap_err();
        assert!(err.message.contains("fit in a byte"));
    }

    #[test]
    fn unrecognized_leading_token_names_text() {
        let err = parse_module("test", "POTATO", ModuleKind::Entrypoint).unwrap_err();
        assert!(err.message.contains("POTATO"), "got: {}", err.message);
    }

    #[test]
    fn expected_register_names_found_category() {
        let err = parse_module("test", "inc 0x1234", ModuleKind::Entrypoint).unwrap_err();
        assert!(err.message.contains("Expected register"), "got: {}", err.message);
        assert!(err.message.contains("number 0x1234"), "got: {}", err.message);
    }

    #[test]
    fn trailing_operand_is_rejected() {
        let err = parse_module("test", "nop r0", ModuleKind::Entrypoint).unwrap_err();
        assert!(err.message.contains("Expected end of line"));
    }
}

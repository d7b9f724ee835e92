// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tokenizer for bitforge assembly source with spans.
//!
//! Consumes one module's full text and produces tokens up to [`TokenKind::Eof`].
//! Register names are lexed ahead of identifiers so `r2` can never shadow a
//! user symbol, and the keyword table is fixed (the instruction set is not
//! extensible at runtime).

use crate::core::cpu::Register;
use crate::core::text_utils::{
    is_bin_digit, is_digit, is_hex_digit, is_ident_char, is_ident_start, is_oct_digit, is_space,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub col_start: usize,
    pub col_end: usize,
}

impl Span {
    fn new(line: u32, start: usize, end: usize) -> Self {
        Self {
            line,
            col_start: start + 1,
            col_end: end + 1,
        }
    }
}

/// The fixed keyword table: every mnemonic and declaration word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Nop,
    End,
    Vsync,
    Brk,
    Mov,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Inc,
    Dec,
    Shl,
    Shr,
    Or,
    And,
    Xor,
    Not,
    Cmp,
    Sto,
    Stob,
    Lod,
    Lodb,
    Jmp,
    Jz,
    Jnz,
    Jg,
    Jgz,
    Jl,
    Jlz,
    Jo,
    Jdz,
    Call,
    Ret,
    Push,
    Pop,
    PushAll,
    PopAll,
    Out,
    Outb,
    Proc,
    Pub,
    Use,
    From,
    Imm8,
    Imm16,
    Db,
    Dw,
    Dstr,
}

impl Keyword {
    pub fn lookup(ident: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match ident.to_ascii_lowercase().as_str() {
            "nop" => Nop,
            "end" => End,
            "vsync" => Vsync,
            "brk" => Brk,
            "mov" => Mov,
            "add" => Add,
            "sub" => Sub,
            "mul" => Mul,
            "div" => Div,
            "mod" => Mod,
            "inc" => Inc,
            "dec" => Dec,
            "shl" => Shl,
            "shr" => Shr,
            "or" => Or,
            "and" => And,
            "xor" => Xor,
            "not" => Not,
            "cmp" => Cmp,
            "sto" => Sto,
            "stob" => Stob,
            "lod" => Lod,
            "lodb" => Lodb,
            "jmp" => Jmp,
            "jz" => Jz,
            "jnz" => Jnz,
            "jg" => Jg,
            "jgz" => Jgz,
            "jl" => Jl,
            "jlz" => Jlz,
            "jo" => Jo,
            "jdz" => Jdz,
            "call" => Call,
            "ret" => Ret,
            "push" => Push,
            "pop" => Pop,
            "pushall" => PushAll,
            "popall" => PopAll,
            "out" => Out,
            "outb" => Outb,
            "proc" => Proc,
            "pub" => Pub,
            "use" => Use,
            "from" => From,
            "imm8" => Imm8,
            "imm16" => Imm16,
            "db" => Db,
            "dw" => Dw,
            "dstr" => Dstr,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use Keyword::*;
        match self {
            Nop => "nop",
            End => "end",
            Vsync => "vsync",
            Brk => "brk",
            Mov => "mov",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Inc => "inc",
            Dec => "dec",
            Shl => "shl",
            Shr => "shr",
            Or => "or",
            And => "and",
            Xor => "xor",
            Not => "not",
            Cmp => "cmp",
            Sto => "sto",
            Stob => "stob",
            Lod => "lod",
            Lodb => "lodb",
            Jmp => "jmp",
            Jz => "jz",
            Jnz => "jnz",
            Jg => "jg",
            Jgz => "jgz",
            Jl => "jl",
            Jlz => "jlz",
            Jo => "jo",
            Jdz => "jdz",
            Call => "call",
            Ret => "ret",
            Push => "push",
            Pop => "pop",
            PushAll => "pushall",
            PopAll => "popall",
            Out => "out",
            Outb => "outb",
            Proc => "proc",
            Pub => "pub",
            Use => "use",
            From => "from",
            Imm8 => "imm8",
            Imm16 => "imm16",
            Db => "db",
            Dw => "dw",
            Dstr => "dstr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLiteral {
    pub text: String,
    pub value: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub raw: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    Register(Register),
    Keyword(Keyword),
    Number(NumberLiteral),
    Str(StringLiteral),
    Comma,
    Colon,
    Eol,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Source-shaped rendering, used by "unexpected token" diagnostics.
    pub fn to_source_text(&self) -> String {
        match &self.kind {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Register(reg) => reg.name(),
            TokenKind::Keyword(keyword) => keyword.name().to_string(),
            TokenKind::Number(num) => num.text.clone(),
            TokenKind::Str(lit) => lit.raw.clone(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::Eol => "end of line".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenizeError {
    pub message: String,
    pub span: Span,
}

pub struct Tokenizer<'a> {
    input: &'a [u8],
    cursor: usize,
    line: u32,
    line_start: usize,
}

impl<'a> Tokenizer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            input: source.as_bytes(),
            cursor: 0,
            line: 1,
            line_start: 0,
        }
    }

    /// Tokenize the whole input. Fail-fast: the first lexical error aborts.
    pub fn tokenize(source: &'a str) -> Result<Vec<Token>, TokenizeError> {
        let mut tokenizer = Tokenizer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = tokenizer.next_token()?;
            let done = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, TokenizeError> {
        loop {
            self.skip_spaces();
            let start = self.cursor;
            let c = self.current_byte();
            match c {
                0 => {
                    return Ok(Token {
                        kind: TokenKind::Eof,
                        span: self.span(start),
                    })
                }
                b'\n' => {
                    let token = Token {
                        kind: TokenKind::Eol,
                        span: self.span(start),
                    };
                    self.advance_line();
                    return Ok(token);
                }
                b'/' => match self.peek_byte(1) {
                    b'/' => {
                        while self.current_byte() != 0 && self.current_byte() != b'\n' {
                            self.cursor += 1;
                        }
                    }
                    b'*' => {
                        if self.skip_block_comment(start)? {
                            // A comment spanning lines still separates the
                            // statements around it.
                            return Ok(Token {
                                kind: TokenKind::Eol,
                                span: self.span(start),
                            });
                        }
                    }
                    _ => {
                        return Err(self.illegal_char(c, start));
                    }
                },
                b',' => {
                    self.cursor += 1;
                    return Ok(Token {
                        kind: TokenKind::Comma,
                        span: self.span(start),
                    });
                }
                b':' => {
                    self.cursor += 1;
                    return Ok(Token {
                        kind: TokenKind::Colon,
                        span: self.span(start),
                    });
                }
                b'"' => return self.scan_string(start),
                _ if is_digit(c) => return self.scan_number(start),
                _ if is_ident_start(c) => return Ok(self.scan_identifier(start)),
                _ => return Err(self.illegal_char(c, start)),
            }
        }
    }

    fn scan_identifier(&mut self, start: usize) -> Token {
        while is_ident_char(self.current_byte()) {
            self.cursor += 1;
        }
        let text = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        let kind = if let Some(reg) = Register::parse(&text) {
            TokenKind::Register(reg)
        } else if let Some(keyword) = Keyword::lookup(&text) {
            TokenKind::Keyword(keyword)
        } else {
            TokenKind::Identifier(text)
        };
        Token {
            kind,
            span: self.span(start),
        }
    }

    fn scan_number(&mut self, start: usize) -> Result<Token, TokenizeError> {
        let (radix, digits_start) = match (self.current_byte(), self.peek_byte(1)) {
            (b'0', b'b' | b'B') => (2, start + 2),
            (b'0', b'o' | b'O') => (8, start + 2),
            (b'0', b'x' | b'X') => (16, start + 2),
            _ => (10, start),
        };
        self.cursor = digits_start;
        let digit_ok = |c: u8| match radix {
            2 => is_bin_digit(c),
            8 => is_oct_digit(c),
            16 => is_hex_digit(c),
            _ => is_digit(c),
        };
        while digit_ok(self.current_byte()) {
            self.cursor += 1;
        }
        let text = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        let digits = &text[digits_start - start..];
        if digits.is_empty() || is_ident_char(self.current_byte()) {
            // Trailing identifier characters make this a malformed literal,
            // not an identifier: identifiers cannot start with a digit.
            while is_ident_char(self.current_byte()) {
                self.cursor += 1;
            }
            let full = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
            return Err(TokenizeError {
                message: format!("Illegal character in number literal: {full}"),
                span: self.span(start),
            });
        }
        let value = u32::from_str_radix(digits, radix)
            .ok()
            .filter(|v| *v <= 0xffff)
            .ok_or_else(|| TokenizeError {
                message: format!("Number out of 16-bit range: {text}"),
                span: self.span(start),
            })?;
        Ok(Token {
            kind: TokenKind::Number(NumberLiteral {
                text,
                value: value as u16,
            }),
            span: self.span(start),
        })
    }

    fn scan_string(&mut self, start: usize) -> Result<Token, TokenizeError> {
        let start_line = self.line;
        self.cursor += 1;
        let content_start = self.cursor;
        // No escape sequences: the only special character is the closing quote.
        loop {
            match self.current_byte() {
                0 => {
                    return Err(TokenizeError {
                        message: format!("Unterminated string starting on line {start_line}"),
                        span: self.span(start),
                    })
                }
                b'"' => break,
                b'\n' => {
                    self.cursor += 1;
                    self.advance_line_counters();
                }
                _ => self.cursor += 1,
            }
        }
        let bytes = self.input[content_start..self.cursor].to_vec();
        self.cursor += 1;
        let raw = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        Ok(Token {
            kind: TokenKind::Str(StringLiteral { raw, bytes }),
            span: Span::new(start_line, start, self.cursor),
        })
    }

    /// Skip a `/* ... */` comment; returns whether it spanned a newline.
    fn skip_block_comment(&mut self, start: usize) -> Result<bool, TokenizeError> {
        let start_line = self.line;
        self.cursor += 2;
        let mut saw_newline = false;
        loop {
            match self.current_byte() {
                0 => {
                    return Err(TokenizeError {
                        message: format!("Unterminated block comment starting on line {start_line}"),
                        span: Span::new(start_line, start, start + 2),
                    })
                }
                b'*' if self.peek_byte(1) == b'/' => {
                    self.cursor += 2;
                    return Ok(saw_newline);
                }
                b'\n' => {
                    self.cursor += 1;
                    self.advance_line_counters();
                    saw_newline = true;
                }
                _ => self.cursor += 1,
            }
        }
    }

    fn illegal_char(&self, c: u8, start: usize) -> TokenizeError {
        TokenizeError {
            message: format!("Illegal character: '{}'", c as char),
            span: self.span(start),
        }
    }

    fn skip_spaces(&mut self) {
        while is_space(self.current_byte()) {
            self.cursor += 1;
        }
    }

    fn advance_line(&mut self) {
        self.cursor += 1;
        self.advance_line_counters();
    }

    fn advance_line_counters(&mut self) {
        self.line += 1;
        self.line_start = self.cursor;
    }

    fn span(&self, start: usize) -> Span {
        let col_start = start.saturating_sub(self.line_start);
        let col_end = self
            .cursor
            .max(start + 1)
            .saturating_sub(self.line_start)
            .max(col_start + 1);
        Span::new(self.line, col_start, col_end)
    }

    fn current_byte(&self) -> u8 {
        self.input.get(self.cursor).copied().unwrap_or(0)
    }

    fn peek_byte(&self, offset: usize) -> u8 {
        self.input.get(self.cursor + offset).copied().unwrap_or(0)
    }
}

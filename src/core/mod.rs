// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Compiler core for the bitforge platform.
//!
//! This module provides the assembler pipeline stages, each a standalone
//! pass over the previous stage's output:
//!
//! - [`cpu`] - machine description: registers, flags, opcodes, memory map
//! - [`text_utils`] - byte classification helpers
//! - [`tokenizer`] - token scanning with line/column spans
//! - [`ast`] - module AST shared by all passes
//! - [`parser`] - recursive-descent statement parsing
//! - [`resolver`] - module-graph resolution over `use` imports
//! - [`checker`] - engine-owned register write checking
//! - [`expander`] - immediate-macro substitution
//! - [`deadcode`] - unused library procedure elimination
//! - [`codegen`] - per-module byte emission
//! - [`linker`] - layout, symbol resolution, and patching

pub mod ast;
pub mod checker;
pub mod codegen;
pub mod cpu;
pub mod deadcode;
pub mod error;
pub mod expander;
pub mod linker;
pub mod parser;
pub mod resolver;
pub mod text_utils;
pub mod tokenizer;

// Re-exports for convenience
pub use ast::{ImmediateExpr, Instruction, ModuleAst, Statement};
pub use cpu::{Flag, Opcode, Register, Width};
pub use error::{AsmError, AsmErrorKind, Diagnostic, Severity};
pub use parser::ParseError;
pub use resolver::{ProgramAst, Source, SourceResolver};
pub use tokenizer::{Span, Token, TokenKind, TokenizeError, Tokenizer};

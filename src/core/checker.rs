// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Static checks over the resolved program.
//!
//! Unlike the parser this pass accumulates: every violation in the program
//! is reported in one run.

use crate::core::ast::Statement;
use crate::core::error::{AsmError, AsmErrorKind, Diagnostic};
use crate::core::resolver::ProgramAst;

/// Writes to rip, rfl, and rin are reserved to the engine. rsp stays
/// writable so programs can rebase their stack.
pub fn check_program(program: &ProgramAst) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for module in program.modules() {
        for statement in module.statements() {
            let Statement::Instruction { instr, line } = statement else {
                continue;
            };
            if let Some(reg) = instr.write_target() {
                if reg.is_engine_owned() {
                    diagnostics.push(
                        Diagnostic::error(AsmError::new(
                            AsmErrorKind::Check,
                            format!("Cannot write to engine-owned register {}", reg.name()),
                        ))
                        .in_module(&module.path)
                        .at_line(*line),
                    );
                }
            }
        }
    }
    diagnostics
}

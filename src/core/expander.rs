// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Immediate-macro expansion.
//!
//! Replaces symbolic operands that name an `imm8`/`imm16` declaration with
//! their literal values. Local declarations shadow imported ones. Symbols
//! that match no declaration are left alone for the linker, which treats
//! them as label references.

use std::collections::HashMap;

use crate::core::ast::{ImmediateExpr, ImmediateKind, Statement};
use crate::core::cpu::Width;
use crate::core::error::{AsmError, AsmErrorKind, Diagnostic};
use crate::core::resolver::ProgramAst;

pub fn expand_program(program: &mut ProgramAst) -> Vec<Diagnostic> {
    // Imported imm values by (importer path, name), local values shadow.
    let mut tables: HashMap<String, HashMap<String, u16>> = HashMap::new();
    for module in program.modules() {
        let mut table = HashMap::new();
        for use_decl in &module.uses {
            let Some(library) = program.libraries.get(&use_decl.path) else {
                continue;
            };
            for name in &use_decl.names {
                if let Some(imm) = library.imm_decl(name) {
                    if imm.public {
                        table.insert(name.clone(), imm.value);
                    }
                }
            }
        }
        for imm in &module.imms {
            table.insert(imm.name.clone(), imm.value);
        }
        tables.insert(module.path.clone(), table);
    }

    let mut diagnostics = Vec::new();
    for module in program.modules_mut() {
        let table = &tables[&module.path];
        let path = module.path.clone();
        for statement in module.statements_mut() {
            let (immediates, line): (Vec<&mut ImmediateExpr>, u32) = match statement {
                Statement::Instruction { instr, line } => (instr.immediates_mut(), *line),
                Statement::Data { directive, line } => (directive.immediates_mut(), *line),
                Statement::Label { .. } => continue,
            };
            for imm in immediates {
                let ImmediateKind::Symbol(name) = &imm.kind else {
                    continue;
                };
                let Some(&value) = table.get(name) else {
                    continue;
                };
                if imm.width == Width::Byte && !Width::Byte.fits(value) {
                    diagnostics.push(
                        Diagnostic::error(AsmError::new(
                            AsmErrorKind::Codegen,
                            format!("Immediate macro {name} value {value} does not fit in a byte"),
                        ))
                        .in_module(&path)
                        .at_line(line),
                    );
                    continue;
                }
                imm.kind = ImmediateKind::Literal(value);
            }
        }
    }
    diagnostics
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Unused library procedure elimination.
//!
//! A library procedure survives when some importer names it in a `use`
//! declaration, or when a surviving part of the same library references it.
//! Entrypoint items are never pruned.

use std::collections::{HashMap, HashSet};

use crate::core::ast::{Item, ModuleAst, Statement};
use crate::core::resolver::ProgramAst;

pub fn eliminate_dead_code(program: &mut ProgramAst) {
    let mut roots: HashMap<String, HashSet<String>> = HashMap::new();
    for module in program.modules() {
        for use_decl in &module.uses {
            roots
                .entry(use_decl.path.clone())
                .or_default()
                .extend(use_decl.names.iter().cloned());
        }
    }

    for (path, module) in &mut program.libraries {
        let root_names = roots.remove(path).unwrap_or_default();
        prune_module(module, &root_names);
    }
}

fn prune_module(module: &mut ModuleAst, roots: &HashSet<String>) {
    // Fixpoint over local references: a root proc calling a private
    // helper keeps the helper alive.
    let mut live: HashSet<String> = roots.clone();
    loop {
        let mut referenced = HashSet::new();
        for item in &module.items {
            match item {
                Item::Statement(stmt) => collect_symbols(stmt, &mut referenced),
                Item::Proc(proc) if live.contains(&proc.name) => {
                    for stmt in &proc.body {
                        collect_symbols(stmt, &mut referenced);
                    }
                }
                Item::Proc(_) => {}
            }
        }
        let before = live.len();
        live.extend(referenced);
        if live.len() == before {
            break;
        }
    }

    module.items.retain(|item| match item {
        Item::Statement(_) => true,
        Item::Proc(proc) => live.contains(&proc.name),
    });
}

fn collect_symbols(statement: &Statement, out: &mut HashSet<String>) {
    let immediates = match statement {
        Statement::Instruction { instr, .. } => instr.immediates(),
        Statement::Data { directive, .. } => directive.immediates(),
        Statement::Label { .. } => return,
    };
    for imm in immediates {
        if let Some(name) = imm.symbol_name() {
            out.insert(name.to_string());
        }
    }
}

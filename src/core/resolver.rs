// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Module-graph resolution.
//!
//! Starting from the entrypoint module, walks `use` declarations breadth
//! first, parsing every reachable library exactly once. Import cycles are
//! rejected as each new edge is added, so the first closed loop reported is
//! the one nearest the entrypoint.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::core::ast::{Item, ModuleAst, ModuleKind};
use crate::core::error::{AsmError, AsmErrorKind, Diagnostic};
use crate::core::parser::parse_module;

/// One loadable unit of assembly source. `is_library` is the resolver's
/// view of the module's role; the graph walk checks it against how the
/// module is actually reached.
#[derive(Debug, Clone)]
pub struct Source {
    pub path: String,
    pub code: String,
    pub is_library: bool,
}

/// Supplies module source text by path. The CLI backs this with the
/// filesystem; [`MapResolver`] backs it with memory for tests and embedding.
pub trait SourceResolver {
    fn resolve(&self, path: &str) -> Result<Source, AsmError>;

    /// Paths of every source this resolver treats as a non-library module.
    fn entry_sources(&self) -> Vec<String>;
}

/// In-memory resolver. Every path except the designated entrypoint is a
/// library.
pub struct MapResolver {
    entry: String,
    sources: HashMap<String, String>,
}

impl MapResolver {
    pub fn new(entry: &str, entries: &[(&str, &str)]) -> Self {
        Self {
            entry: entry.to_string(),
            sources: entries
                .iter()
                .map(|(path, code)| (path.to_string(), code.to_string()))
                .collect(),
        }
    }
}

impl SourceResolver for MapResolver {
    fn resolve(&self, path: &str) -> Result<Source, AsmError> {
        self.sources
            .get(path)
            .map(|code| Source {
                path: path.to_string(),
                code: code.clone(),
                is_library: path != self.entry,
            })
            .ok_or_else(|| AsmError::new(AsmErrorKind::Io, format!("Module not found: {path}")))
    }

    fn entry_sources(&self) -> Vec<String> {
        self.sources
            .keys()
            .filter(|path| *path == &self.entry)
            .cloned()
            .collect()
    }
}

/// The fully resolved program: one entrypoint plus every reachable library,
/// keyed by module path. `BTreeMap` gives libraries a stable layout order.
#[derive(Debug, Clone)]
pub struct ProgramAst {
    pub entry: ModuleAst,
    pub libraries: BTreeMap<String, ModuleAst>,
}

impl ProgramAst {
    pub fn library(&self, path: &str) -> Option<&ModuleAst> {
        self.libraries.get(path)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleAst> {
        std::iter::once(&self.entry).chain(self.libraries.values())
    }

    pub fn modules_mut(&mut self) -> impl Iterator<Item = &mut ModuleAst> {
        std::iter::once(&mut self.entry).chain(self.libraries.values_mut())
    }
}

/// Names a module exports: its `pub proc` and `pub imm` declarations.
pub fn exported_names(module: &ModuleAst) -> HashSet<String> {
    let mut names = HashSet::new();
    for item in &module.items {
        if let Item::Proc(proc) = item {
            if proc.public {
                names.insert(proc.name.clone());
            }
        }
    }
    for imm in &module.imms {
        if imm.public {
            names.insert(imm.name.clone());
        }
    }
    names
}

pub fn resolve_program(
    resolver: &dyn SourceResolver,
    entry_path: &str,
) -> Result<ProgramAst, Vec<Diagnostic>> {
    let entry_source = load_source(resolver, entry_path)?;
    if entry_source.is_library {
        return Err(vec![resolve_diag(
            format!("Module {entry_path} is a library, not an entrypoint"),
            entry_path,
            0,
        )]);
    }
    let entry = parse_source(&entry_source, ModuleKind::Entrypoint)?;

    let mut libraries: BTreeMap<String, ModuleAst> = BTreeMap::new();
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    for use_decl in &entry.uses {
        edges
            .entry(entry_path.to_string())
            .or_default()
            .push(use_decl.path.clone());
        if let Some(cycle) = find_cycle(&edges, entry_path) {
            return Err(vec![resolve_diag(
                format!("Circular module import: {}", cycle.join(" -> ")),
                entry_path,
                use_decl.line,
            )]);
        }
        queue.push_back(use_decl.path.clone());
    }

    while let Some(path) = queue.pop_front() {
        if libraries.contains_key(&path) {
            continue;
        }
        let source = load_source(resolver, &path)?;
        if !source.is_library {
            return Err(vec![resolve_diag(
                format!("Module {path} is the entrypoint, not a library"),
                &path,
                0,
            )]);
        }
        let module = parse_source(&source, ModuleKind::Library)?;
        for use_decl in &module.uses {
            edges
                .entry(path.clone())
                .or_default()
                .push(use_decl.path.clone());
            if let Some(cycle) = find_cycle(&edges, entry_path) {
                return Err(vec![resolve_diag(
                    format!("Circular module import: {}", cycle.join(" -> ")),
                    &path,
                    use_decl.line,
                )]);
            }
            queue.push_back(use_decl.path.clone());
        }
        libraries.insert(path, module);
    }

    let program = ProgramAst { entry, libraries };
    let diagnostics = check_imports(&program);
    if diagnostics.is_empty() {
        Ok(program)
    } else {
        Err(diagnostics)
    }
}

fn load_source(resolver: &dyn SourceResolver, path: &str) -> Result<Source, Vec<Diagnostic>> {
    resolver
        .resolve(path)
        .map_err(|err| vec![Diagnostic::error(err).in_module(path)])
}

fn parse_source(source: &Source, kind: ModuleKind) -> Result<ModuleAst, Vec<Diagnostic>> {
    parse_module(&source.path, &source.code, kind).map_err(|err| {
        vec![Diagnostic::error(AsmError::new(err.kind, err.message))
            .in_module(&source.path)
            .at_line(err.span.line)]
    })
}

/// Every imported name must be exported by the module it is imported from.
fn check_imports(program: &ProgramAst) -> Vec<Diagnostic> {
    let mut exports: HashMap<&str, HashSet<String>> = HashMap::new();
    for (path, module) in &program.libraries {
        exports.insert(path.as_str(), exported_names(module));
    }

    let mut diagnostics = Vec::new();
    for module in program.modules() {
        for use_decl in &module.uses {
            let Some(exported) = exports.get(use_decl.path.as_str()) else {
                continue;
            };
            for name in &use_decl.names {
                if !exported.contains(name) {
                    diagnostics.push(resolve_diag(
                        format!("Module {} does not export {name}", use_decl.path),
                        &module.path,
                        use_decl.line,
                    ));
                }
            }
        }
    }
    diagnostics
}

fn resolve_diag(message: String, path: &str, line: u32) -> Diagnostic {
    let diag = Diagnostic::error(AsmError::new(AsmErrorKind::Resolve, message)).in_module(path);
    if line > 0 {
        diag.at_line(line)
    } else {
        diag
    }
}

/// DFS from the entrypoint over the import edges collected so far. Returns
/// the closed path when one exists.
fn find_cycle(edges: &HashMap<String, Vec<String>>, root: &str) -> Option<Vec<String>> {
    let mut visiting = Vec::new();
    let mut visited = HashSet::new();
    dfs(edges, root, &mut visiting, &mut visited)
}

fn dfs(
    edges: &HashMap<String, Vec<String>>,
    node: &str,
    visiting: &mut Vec<String>,
    visited: &mut HashSet<String>,
) -> Option<Vec<String>> {
    if let Some(pos) = visiting.iter().position(|n| n == node) {
        let mut cycle: Vec<String> = visiting[pos..].to_vec();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    if visited.contains(node) {
        return None;
    }
    visiting.push(node.to_string());
    if let Some(next) = edges.get(node) {
        for dep in next {
            if let Some(cycle) = dfs(edges, dep, visiting, visited) {
                return Some(cycle);
            }
        }
    }
    visiting.pop();
    visited.insert(node.to_string());
    None
}

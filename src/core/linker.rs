// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Layout, symbol resolution, and patching.
//!
//! The entrypoint module lands at the load base, libraries follow in the
//! order given (sorted by path upstream). Each fixup site resolves against
//! the owning module's labels first, then against imported exports.

use std::collections::HashMap;

use crate::core::codegen::CodeModule;
use crate::core::cpu::{Width, HEADER_LEN, HEADER_MAGIC, PROGRAM_BASE, PROGRAM_CAPACITY};
use crate::core::error::{AsmError, AsmErrorKind, Diagnostic};

#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Prefix the image with the 10-byte descriptor header.
    pub emit_header: bool,
    /// Address the image will be loaded at. Label fixups are absolute.
    pub base_addr: u16,
    /// Format version stamped into the header.
    pub version: u16,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            emit_header: false,
            base_addr: PROGRAM_BASE,
            version: 1,
        }
    }
}

pub fn link(modules: &[CodeModule], options: &LinkOptions) -> Result<Vec<u8>, Vec<Diagnostic>> {
    let header_len = if options.emit_header { HEADER_LEN } else { 0 };

    // Code-blob offset of each module.
    let mut offsets: HashMap<&str, u16> = HashMap::new();
    let mut code_len: usize = 0;
    for module in modules {
        offsets.insert(module.path.as_str(), code_len as u16);
        code_len += module.bytes.len();
    }

    let total_len = header_len + code_len;
    if total_len > PROGRAM_CAPACITY {
        return Err(vec![Diagnostic::error(AsmError::new(
            AsmErrorKind::Link,
            format!(
                "Program too large: {total_len} bytes exceeds region capacity {PROGRAM_CAPACITY}"
            ),
        ))]);
    }

    let code_base = options.base_addr.wrapping_add(header_len as u16);

    let mut diagnostics = Vec::new();
    let mut image = Vec::with_capacity(total_len);
    if options.emit_header {
        let entry_addr = code_base.wrapping_add(modules[0].main_entry.unwrap_or(0));
        image.extend_from_slice(&HEADER_MAGIC.to_be_bytes());
        image.extend_from_slice(&options.version.to_be_bytes());
        image.extend_from_slice(&(total_len as u16).to_be_bytes());
        image.extend_from_slice(&entry_addr.to_be_bytes());
        image.extend_from_slice(&(total_len as u16).to_be_bytes());
    }

    for module in modules {
        let mut bytes = module.bytes.clone();
        for fixup in &module.unresolved {
            let Some(address) = resolve_symbol(module, modules, &offsets, code_base, &fixup.symbol)
            else {
                diagnostics.push(
                    Diagnostic::error(AsmError::new(
                        AsmErrorKind::Link,
                        format!("Unresolved symbol: {}", fixup.symbol),
                    ))
                    .in_module(&module.path)
                    .at_line(fixup.line),
                );
                continue;
            };
            let site = fixup.offset as usize;
            match fixup.width {
                Width::Word => {
                    bytes[site..site + 2].copy_from_slice(&address.to_be_bytes());
                }
                Width::Byte => {
                    if !Width::Byte.fits(address) {
                        diagnostics.push(
                            Diagnostic::error(AsmError::new(
                                AsmErrorKind::Link,
                                format!(
                                    "Address {address:#06x} of {} does not fit in a byte operand",
                                    fixup.symbol
                                ),
                            ))
                            .in_module(&module.path)
                            .at_line(fixup.line),
                        );
                        continue;
                    }
                    bytes[site] = address as u8;
                }
            }
        }
        image.extend_from_slice(&bytes);
    }

    if diagnostics.is_empty() {
        Ok(image)
    } else {
        Err(diagnostics)
    }
}

/// Own-module labels shadow imported names.
fn resolve_symbol(
    module: &CodeModule,
    modules: &[CodeModule],
    offsets: &HashMap<&str, u16>,
    code_base: u16,
    symbol: &str,
) -> Option<u16> {
    if let Some(&label) = module.labels.get(symbol) {
        return Some(code_base.wrapping_add(offsets[module.path.as_str()]).wrapping_add(label));
    }
    for use_decl in &module.imports {
        if !use_decl.names.iter().any(|name| name == symbol) {
            continue;
        }
        let library = modules.iter().find(|m| m.path == use_decl.path)?;
        if !library.exports.contains(symbol) {
            continue;
        }
        let &label = library.labels.get(symbol)?;
        return Some(
            code_base
                .wrapping_add(offsets[library.path.as_str()])
                .wrapping_add(label),
        );
    }
    None
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pipeline orchestration and the command-line entrypoint.
//!
//! `assemble` drives the full pipeline over a [`SourceResolver`]:
//! resolve -> check -> expand -> prune -> codegen -> link. `run` wraps it
//! for the CLI, adding file IO and the `--run` execution mode.

pub mod cli;

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use crate::core::checker::check_program;
use crate::core::codegen::{generate_module, CodeModule};
use crate::core::cpu::{Register, CONSOLE_ADDR, NUM_GP_REGISTERS, OS_BASE, PROGRAM_BASE};
use crate::core::deadcode::eliminate_dead_code;
use crate::core::error::{AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic};
use crate::core::expander::expand_program;
use crate::core::linker::{link, LinkOptions};
use crate::core::resolver::{resolve_program, Source, SourceResolver};
use crate::vm::{Console, CycleResult, System};

use cli::{validate_cli, Cli, CliConfig};

/// Assemble the module graph rooted at `entry` into one linked image.
pub fn assemble(
    resolver: &dyn SourceResolver,
    entry: &str,
    options: &LinkOptions,
) -> Result<Vec<u8>, Vec<Diagnostic>> {
    let mut program = resolve_program(resolver, entry)?;

    let diagnostics = check_program(&program);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let diagnostics = expand_program(&mut program);
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    eliminate_dead_code(&mut program);

    let mut modules: Vec<CodeModule> = Vec::new();
    let mut diagnostics = Vec::new();
    for module in program.modules() {
        match generate_module(module) {
            Ok(code) => modules.push(code),
            Err(mut diags) => diagnostics.append(&mut diags),
        }
    }
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    link(&modules, options)
}

/// Check-only entry: empty when the program assembles cleanly.
pub fn assemble_check(resolver: &dyn SourceResolver, entry: &str) -> Vec<Diagnostic> {
    match assemble(resolver, entry, &LinkOptions::default()) {
        Ok(_) => Vec::new(),
        Err(diagnostics) => diagnostics,
    }
}

/// Filesystem resolver: the entry file plus sibling `<path>.asm` libraries.
pub struct FileResolver {
    entry: String,
    entry_file: PathBuf,
    dir: PathBuf,
}

impl FileResolver {
    pub fn new(entry: &str, entry_file: PathBuf) -> Self {
        let dir = entry_file
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            entry: entry.to_string(),
            entry_file,
            dir,
        }
    }
}

impl SourceResolver for FileResolver {
    fn resolve(&self, path: &str) -> Result<Source, AsmError> {
        let is_library = path != self.entry;
        let file = if is_library {
            self.dir.join(format!("{path}.asm"))
        } else {
            self.entry_file.clone()
        };
        let code = fs::read_to_string(&file).map_err(|err| {
            AsmError::new(
                AsmErrorKind::Io,
                format!("Cannot read {}: {err}", file.display()),
            )
        })?;
        Ok(Source {
            path: path.to_string(),
            code,
            is_library,
        })
    }

    fn entry_sources(&self) -> Vec<String> {
        vec![self.entry.clone()]
    }
}

/// CLI entrypoint, called from `main`.
pub fn run() -> Result<AsmRunReport, AsmRunError> {
    let cli = Cli::parse();
    let config = validate_cli(&cli)?;
    run_with_config(&config)
}

pub fn run_with_config(config: &CliConfig) -> Result<AsmRunReport, AsmRunError> {
    let resolver = FileResolver::new(&config.entry, config.input.clone());

    if config.check {
        let diagnostics = assemble_check(&resolver, &config.entry);
        if diagnostics
            .iter()
            .any(|d| d.severity == crate::core::error::Severity::Error)
        {
            return Err(AsmRunError::new(diagnostics));
        }
        return Ok(AsmRunReport::new(diagnostics));
    }

    let image = assemble(&resolver, &config.entry, &config.link).map_err(AsmRunError::new)?;

    if config.run {
        return execute(&image, config.max_cycles);
    }

    fs::write(&config.output, &image).map_err(|err| {
        AsmRunError::single(AsmError::new(
            AsmErrorKind::Io,
            format!("Cannot write {}: {err}", config.output.display()),
        ))
    })?;
    Ok(AsmRunReport::default())
}

/// The stock boot image: a single jump from the OS region into the program
/// region, assembled through the same pipeline as everything else.
fn boot_image() -> Result<Vec<u8>, AsmRunError> {
    let code = format!("jmp {PROGRAM_BASE:#06x}");
    let resolver = crate::core::resolver::MapResolver::new("boot", &[("boot", code.as_str())]);
    let options = LinkOptions {
        emit_header: false,
        base_addr: OS_BASE,
        version: 1,
    };
    assemble(&resolver, "boot", &options).map_err(AsmRunError::new)
}

fn execute(image: &[u8], max_cycles: u64) -> Result<AsmRunReport, AsmRunError> {
    let boot = boot_image()?;
    let mut system = System::new(&boot).map_err(run_error)?;
    system.load_program(image).map_err(run_error)?;
    system.register_output_device(CONSOLE_ADDR, Box::new(Console));
    system.boot();

    let mut cycles: u64 = 0;
    let outcome = loop {
        if cycles >= max_cycles {
            break None;
        }
        cycles += 1;
        match system.cycle() {
            CycleResult::Vsync | CycleResult::Brk => {}
            terminal => break Some(terminal),
        }
    };

    match outcome {
        Some(CycleResult::End) => {}
        Some(CycleResult::Fault) => {
            return Err(AsmRunError::single(AsmError::new(
                AsmErrorKind::Io,
                format!("Execution faulted after {cycles} cycles"),
            )));
        }
        None => {
            return Err(AsmRunError::single(AsmError::new(
                AsmErrorKind::Io,
                format!("Cycle cap of {max_cycles} reached"),
            )));
        }
        Some(_) => unreachable!("vsync and brk resume"),
    }

    println!();
    for n in 0..NUM_GP_REGISTERS as u8 {
        let reg = Register::gp(n);
        println!("{:<4} = {:#06x}", reg.name(), system.debug(reg));
    }
    for reg in [Register::RIP, Register::RSP, Register::RFL, Register::RIN] {
        println!("{:<4} = {:#06x}", reg.name(), system.debug(reg));
    }
    Ok(AsmRunReport::default())
}

fn run_error(err: crate::vm::VmError) -> AsmRunError {
    AsmRunError::single(AsmError::new(AsmErrorKind::Io, err.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cpu::{Flag, STACK_TOP};
    use crate::core::resolver::MapResolver;

    fn build(sources: &[(&str, &str)]) -> Vec<u8> {
        let resolver = MapResolver::new("main", sources);
        assemble(&resolver, "main", &LinkOptions::default()).expect("assemble")
    }

    fn check(sources: &[(&str, &str)]) -> Vec<Diagnostic> {
        let resolver = MapResolver::new("main", sources);
        assemble_check(&resolver, "main")
    }

    /// Assemble, load behind the stock boot image, and run to the first
    /// terminal result.
    fn run_program(sources: &[(&str, &str)]) -> (System, CycleResult) {
        let image = build(sources);
        let boot = boot_image().expect("boot image");
        let mut system = System::new(&boot).expect("system");
        system.load_program(&image).expect("load");
        system.boot();
        let result = system.cycle();
        (system, result)
    }

    #[test]
    fn file_resolver_enumerates_its_entry() {
        let resolver = FileResolver::new("demo", PathBuf::from("demo.asm"));
        assert_eq!(resolver.entry_sources(), vec!["demo".to_string()]);
    }

    #[test]
    fn radix_literals_assemble_to_the_same_value() {
        for literal in ["4660", "0b0001001000110100", "0o11064", "0x1234"] {
            let source = format!("mov r0, {literal}\nend");
            let (system, result) = run_program(&[("main", source.as_str())]);
            assert_eq!(result, CycleResult::End);
            assert_eq!(system.debug(Register::gp(0)), 0x1234, "literal {literal}");
        }
    }

    #[test]
    fn dw_and_dstr_load_back() {
        let (system, result) = run_program(&[(
            "main",
            "lod r0, answer\nlodb r1, greeting\nend\n\
             answer: dw 0x2a2a\ngreeting: dstr \"hello world\"",
        )]);
        assert_eq!(result, CycleResult::End);
        assert_eq!(system.debug(Register::gp(0)), 0x2a2a);
        // dstr is length-prefixed; a byte load at the label reads the length.
        assert_eq!(system.debug(Register::gp(1)), 11);
    }

    #[test]
    fn add_overflow_clamps_and_flags() {
        let (system, _) = run_program(&[("main", "mov r0, 0xffff\nadd r0, 10\nend")]);
        assert_eq!(system.debug(Register::gp(0)), 0xffff);
        assert_eq!(system.debug(Register::RFL), Flag::Overflow.bit());
    }

    #[test]
    fn div_by_zero_sets_only_its_flag() {
        let (system, _) = run_program(&[("main", "mov r0, 100\nmov r1, 0\ndiv r0, r1\nend")]);
        assert_eq!(system.debug(Register::gp(0)), 100);
        assert_eq!(system.debug(Register::RFL), Flag::DivByZero.bit());
    }

    #[test]
    fn cmp_and_jz_branch() {
        let (system, _) = run_program(&[(
            "main",
            "mov r0, 7\ncmp r0, 7\njz equal\nmov r1, 0xdead\nend\nequal: mov r1, 1\nend",
        )]);
        assert_eq!(system.debug(Register::gp(1)), 1);
    }

    #[test]
    fn imported_proc_links_and_runs() {
        let (system, result) = run_program(&[
            ("main", "use answer from lib\ncall answer\nend"),
            ("lib", "pub proc answer:\n mov r14, 0x2a\n ret"),
        ]);
        assert_eq!(result, CycleResult::End);
        assert_eq!(system.debug(Register::gp(14)), 0x2a);
        assert_eq!(system.debug(Register::RSP), STACK_TOP);
    }

    #[test]
    fn unused_library_procs_shrink_the_binary() {
        let lib = "pub proc blink:\n mov r0, 1\n ret\npub proc fade:\n mov r0, 2\n ret";
        let both = build(&[
            ("main", "use blink, fade from gfx\ncall blink\ncall fade\nend"),
            ("gfx", lib),
        ]);
        let one = build(&[
            ("main", "use blink from gfx\ncall blink\nend"),
            ("gfx", lib),
        ]);
        assert!(one.len() < both.len());
    }

    #[test]
    fn imported_imm_expands_in_place() {
        let (system, _) = run_program(&[
            ("main", "use vram from gfx\nmov r0, vram\nend"),
            ("gfx", "pub imm16 vram: 0x2000"),
        ]);
        assert_eq!(system.debug(Register::gp(0)), 0x2000);
    }

    #[test]
    fn import_cycle_is_rejected() {
        let diags = check(&[
            ("main", "use f from a\nend"),
            ("a", "use g from b\npub proc f:\n ret"),
            ("b", "use f from a\npub proc g:\n ret"),
        ]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].error.message.contains("Circular module import"));
    }

    #[test]
    fn unrecognized_statement_diagnostic_names_the_token() {
        let diags = check(&[("main", "POTATO")]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].error.message.contains("POTATO"));
        assert_eq!(diags[0].path.as_deref(), Some("main"));
    }

    #[test]
    fn inc_with_a_number_reports_expected_register() {
        let diags = check(&[("main", "inc 0x1234\nend")]);
        assert!(diags[0].error.message.contains("Expected register"));
        assert!(diags[0].error.message.contains("0x1234"));
    }

    #[test]
    fn engine_owned_register_write_is_rejected() {
        let diags = check(&[("main", "mov rip, 0\nend")]);
        assert!(diags[0].error.message.contains("engine-owned"));
    }

    #[test]
    fn end_terminates_and_empty_program_faults() {
        let (_, result) = run_program(&[("main", "end")]);
        assert_eq!(result, CycleResult::End);

        // No end: execution NOP-slides off the top of memory.
        let (_, result) = run_program(&[("main", "nop")]);
        assert_eq!(result, CycleResult::Fault);
    }

    #[test]
    fn vsync_yields_and_resumes() {
        let (mut system, result) =
            run_program(&[("main", "mov r0, 1\nvsync\nmov r0, 2\nend")]);
        assert_eq!(result, CycleResult::Vsync);
        assert_eq!(system.debug(Register::gp(0)), 1);
        assert_eq!(system.cycle(), CycleResult::End);
        assert_eq!(system.debug(Register::gp(0)), 2);
    }

    #[test]
    fn header_is_present_only_when_requested() {
        let resolver = MapResolver::new("main", &[("main", "main: end")]);
        let bare = assemble(&resolver, "main", &LinkOptions::default()).expect("assemble");
        assert_eq!(bare.len(), 1);

        let options = LinkOptions {
            emit_header: true,
            ..LinkOptions::default()
        };
        let with_header = assemble(&resolver, "main", &options).expect("assemble");
        assert_eq!(with_header.len(), 11);
        assert_eq!(
            &with_header[0..2],
            &crate::core::cpu::HEADER_MAGIC.to_be_bytes()
        );
    }

    #[test]
    fn multiple_errors_surface_together() {
        let diags = check(&[("main", "mov rip, 1\nmov rfl, 2\nend")]);
        assert_eq!(diags.len(), 2);
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::core::cpu::PROGRAM_BASE;
use crate::core::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::core::linker::LinkOptions;

const LONG_ABOUT: &str = "Assembler and runtime for the bitforge 16-bit platform.

Assembles a module file plus every library it imports into one binary
image. With --check, diagnostics are reported and no output is written.
With --run, the image is loaded into the emulated system and executed
with a console device mapped at 0x3FFF.";

#[derive(Parser, Debug)]
#[command(
    name = "bitforge",
    disable_version_flag = true,
    about = "Assembler and runtime for the bitforge 16-bit platform",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'i',
        long = "infile",
        value_name = "FILE",
        long_help = "Input module file (.asm). Imported libraries are looked up as sibling .asm files named after their module path."
    )]
    pub infile: Option<String>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Output binary filename. Defaults to the input base with a .bin extension."
    )]
    pub outfile: Option<String>,
    #[arg(
        long = "header",
        long_help = "Prefix the image with the 10-byte descriptor header (magic, format version, length, entry address)."
    )]
    pub header: bool,
    #[arg(
        short = 'b',
        long = "base",
        value_name = "aaaa",
        long_help = "Load base address (4 hex digits). Label references are resolved against it. Defaults to 4000, the program region origin."
    )]
    pub base: Option<String>,
    #[arg(
        long = "version",
        value_name = "n",
        long_help = "Format version stamped into the header. Defaults to 1."
    )]
    pub format_version: Option<u16>,
    #[arg(
        short = 'c',
        long = "check",
        long_help = "Check only: run the full pipeline, report diagnostics, write nothing."
    )]
    pub check: bool,
    #[arg(
        short = 'r',
        long = "run",
        long_help = "Assemble and execute in the emulated system instead of writing a binary."
    )]
    pub run: bool,
    #[arg(
        long = "max-cycles",
        value_name = "N",
        long_help = "Cap on engine cycles (vsync/brk resumptions) when running. Defaults to 10000."
    )]
    pub max_cycles: Option<u64>,
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub input: PathBuf,
    /// Module path of the entry file (its basename without extension).
    pub entry: String,
    pub output: PathBuf,
    pub link: LinkOptions,
    pub check: bool,
    pub run: bool,
    pub max_cycles: u64,
}

fn cli_error(message: impl Into<String>) -> AsmRunError {
    AsmRunError::single(AsmError::new(AsmErrorKind::Cli, message))
}

fn input_base_from_path(path: &Path) -> Result<String, AsmRunError> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| cli_error("Invalid input file name"))?;
    if !file_name.ends_with(".asm") {
        return Err(cli_error("Input file must end with .asm"));
    }
    Ok(file_name.strip_suffix(".asm").unwrap_or(file_name).to_string())
}

fn parse_base(text: &str) -> Result<u16, AsmRunError> {
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(cli_error(format!(
            "Invalid base address '{text}': expected 4 hex digits"
        )));
    }
    u16::from_str_radix(text, 16)
        .map_err(|_| cli_error(format!("Invalid base address '{text}'")))
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    let Some(infile) = cli.infile.as_deref() else {
        return Err(cli_error("No input file specified. Use -i/--infile"));
    };
    let input = PathBuf::from(infile);
    let entry = input_base_from_path(&input)?;

    if cli.check && cli.run {
        return Err(cli_error("--check and --run are mutually exclusive"));
    }
    if cli.run && cli.header {
        return Err(cli_error("--run executes headerless images; drop --header"));
    }

    let base_addr = match cli.base.as_deref() {
        Some(text) => parse_base(text)?,
        None => PROGRAM_BASE,
    };
    if cli.run && base_addr != PROGRAM_BASE {
        return Err(cli_error(
            "--run loads at the program region origin; drop --base",
        ));
    }

    let output = match cli.outfile.as_deref() {
        Some(name) => PathBuf::from(name),
        None => input.with_extension("bin"),
    };

    Ok(CliConfig {
        input,
        entry,
        output,
        link: LinkOptions {
            emit_header: cli.header,
            base_addr,
            version: cli.format_version.unwrap_or(1),
        },
        check: cli.check,
        run: cli.run,
        max_cycles: cli.max_cycles.unwrap_or(10_000),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("bitforge").chain(args.iter().copied()))
    }

    #[test]
    fn requires_an_input_file() {
        let err = validate_cli(&parse(&[])).unwrap_err();
        assert!(err.diagnostics()[0]
            .error
            .message
            .contains("No input file specified"));
    }

    #[test]
    fn input_must_be_an_asm_file() {
        let err = validate_cli(&parse(&["-i", "prog.bin"])).unwrap_err();
        assert!(err.diagnostics()[0]
            .error
            .message
            .contains("must end with .asm"));
    }

    #[test]
    fn defaults_fill_in() {
        let config = validate_cli(&parse(&["-i", "demo/prog.asm"])).expect("config");
        assert_eq!(config.entry, "prog");
        assert_eq!(config.output, PathBuf::from("demo/prog.bin"));
        assert_eq!(config.link.base_addr, PROGRAM_BASE);
        assert!(!config.link.emit_header);
        assert_eq!(config.max_cycles, 10_000);
    }

    #[test]
    fn header_base_and_version_flow_into_link_options() {
        let config = validate_cli(&parse(&[
            "-i", "prog.asm", "--header", "-b", "0000", "--version", "3",
        ]))
        .expect("config");
        assert!(config.link.emit_header);
        assert_eq!(config.link.base_addr, 0);
        assert_eq!(config.link.version, 3);
    }

    #[test]
    fn rejects_malformed_base() {
        let err = validate_cli(&parse(&["-i", "prog.asm", "-b", "40"])).unwrap_err();
        assert!(err.diagnostics()[0]
            .error
            .message
            .contains("expected 4 hex digits"));
    }

    #[test]
    fn check_and_run_are_exclusive() {
        let err = validate_cli(&parse(&["-i", "prog.asm", "-c", "-r"])).unwrap_err();
        assert!(err.diagnostics()[0]
            .error
            .message
            .contains("mutually exclusive"));
    }
}

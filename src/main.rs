// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for bitforge.

fn main() {
    let use_color = std::env::var("NO_COLOR").is_err();
    match bitforge::assembler::run() {
        Ok(report) => {
            for diag in report.diagnostics() {
                eprintln!("{}", diag.format_with_path(use_color));
            }
        }
        Err(err) => {
            for diag in err.diagnostics() {
                eprintln!("{}", diag.format_with_path(use_color));
            }
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

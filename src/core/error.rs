// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Diagnostics shared by every assembler stage.

use std::fmt;

/// Which stage produced an error. Drives the prefix in formatted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Lex,
    Parse,
    Resolve,
    Check,
    Codegen,
    Link,
    Cli,
    Io,
}

impl AsmErrorKind {
    fn label(self) -> &'static str {
        match self {
            AsmErrorKind::Lex => "lex",
            AsmErrorKind::Parse => "parse",
            AsmErrorKind::Resolve => "resolve",
            AsmErrorKind::Check => "check",
            AsmErrorKind::Codegen => "codegen",
            AsmErrorKind::Link => "link",
            AsmErrorKind::Cli => "cli",
            AsmErrorKind::Io => "io",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    pub kind: AsmErrorKind,
    pub message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for AsmError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Severity::Error => "\x1b[31m",
            Severity::Warning => "\x1b[33m",
        }
    }
}

/// One reportable finding, positioned in a module where possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: Option<String>,
    pub line: Option<u32>,
    pub severity: Severity,
    pub error: AsmError,
}

impl Diagnostic {
    pub fn error(error: AsmError) -> Self {
        Self {
            path: None,
            line: None,
            severity: Severity::Error,
            error,
        }
    }

    pub fn warning(error: AsmError) -> Self {
        Self {
            path: None,
            line: None,
            severity: Severity::Warning,
            error,
        }
    }

    #[must_use]
    pub fn in_module(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    #[must_use]
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn format(&self) -> String {
        self.render(false)
    }

    /// Formatted with severity colored when `use_color` is set.
    pub fn format_with_path(&self, use_color: bool) -> String {
        self.render(use_color)
    }

    fn render(&self, use_color: bool) -> String {
        let mut out = String::new();
        if let Some(path) = &self.path {
            out.push_str(path);
            if let Some(line) = self.line {
                out.push_str(&format!(":{line}"));
            }
            out.push_str(": ");
        }
        if use_color {
            out.push_str(&format!(
                "{}{}\x1b[0m",
                self.severity.color(),
                self.severity.label()
            ));
        } else {
            out.push_str(self.severity.label());
        }
        out.push_str(&format!(" [{}]: {}", self.error.kind.label(), self.error.message));
        out
    }
}

/// Terminal failure of an assembler run, carrying every diagnostic collected
/// before the run stopped.
#[derive(Debug, Clone)]
pub struct AsmRunError {
    diagnostics: Vec<Diagnostic>,
}

impl AsmRunError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn single(error: AsmError) -> Self {
        Self {
            diagnostics: vec![Diagnostic::error(error)],
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        write!(f, "assembly failed with {errors} error(s)")
    }
}

impl std::error::Error for AsmRunError {}

/// Successful run summary. Warnings survive success.
#[derive(Debug, Clone, Default)]
pub struct AsmRunReport {
    diagnostics: Vec<Diagnostic>,
}

impl AsmRunReport {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_renders_path_and_line() {
        let diag = Diagnostic::error(AsmError::new(AsmErrorKind::Parse, "Expected register"))
            .in_module("gfx")
            .at_line(12);
        assert_eq!(diag.format(), "gfx:12: error [parse]: Expected register");
    }

    #[test]
    fn diagnostic_without_position_omits_prefix() {
        let diag = Diagnostic::error(AsmError::new(AsmErrorKind::Cli, "No input file"));
        assert_eq!(diag.format(), "error [cli]: No input file");
    }

    #[test]
    fn colored_output_wraps_severity_only() {
        let diag = Diagnostic::warning(AsmError::new(AsmErrorKind::Check, "unused import"));
        let rendered = diag.format_with_path(true);
        assert!(rendered.starts_with("\x1b[33mwarning\x1b[0m"));
        assert!(rendered.ends_with("[check]: unused import"));
    }
}

use std::sync::Mutex;

use colored::Colorize;

use crate::span::{SourceFile, Span};

/// Stable diagnostic codes. Codes are part of the compiler's public surface
/// (lint config, test suites, editor tooling key off of them) so existing
/// values must never be renumbered.
pub mod codes {
    pub const DANGLING_REFERENCE: &str = "E0401";
    pub const SEALED_UNIT: &str = "E0402";
    pub const MISSING_OPERATION: &str = "E0410";
    pub const RECURSIVE_LAYOUT: &str = "E0411";
    pub const UNRESOLVED_NAME: &str = "E0420";
    pub const UNRESOLVED_CALLEE: &str = "E0421";
    pub const DUPLICATE_DEFINITION: &str = "E0422";
    pub const EVALUATION_TRAP: &str = "E0430";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// A secondary location attached to a diagnostic ("previous definition was
/// here", "field declared here", ...)
#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub span: Span,
    pub message: String,
    pub labels: Vec<Label>,
}

impl Diagnostic {
    pub fn error(code: &'static str, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            span,
            message: message.into(),
            labels: Vec::new(),
        }
    }

    pub fn warning(code: &'static str, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            span,
            message: message.into(),
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
        });
        self
    }
}

/// Collects diagnostics raised during lowering and interpretation.
///
/// Records are append-only and immutable once emitted. `emit` takes `&self`
/// so independent lowering workers can share one engine; order is preserved
/// per worker and each record lands atomically.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    records: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, diagnostic: Diagnostic) {
        log::debug!(
            "diagnostic {}[{}]: {}",
            diagnostic.severity,
            diagnostic.code,
            diagnostic.message
        );

        self.records.lock().unwrap().push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.records
            .lock()
            .unwrap()
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Removes and returns every record emitted so far, in emission order.
    /// Called once by the reporting layer at the end of an invocation.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.records.lock().unwrap())
    }

    /// Renders every pending record against `source`, drip-style: one
    /// location line, the offending source line, and a caret column.
    pub fn render(&self, source: &SourceFile, out: &mut impl std::io::Write) -> std::io::Result<()> {
        let records = self.records.lock().unwrap();

        for diagnostic in records.iter() {
            let row = source.row_for_position(diagnostic.span.start);
            let column = source.column_for_position(diagnostic.span.start);

            let severity = match diagnostic.severity {
                Severity::Error => diagnostic.severity.to_string().red().bold(),
                Severity::Warning => diagnostic.severity.to_string().yellow().bold(),
                Severity::Note => diagnostic.severity.to_string().cyan().bold(),
            };

            writeln!(
                out,
                "{}: {} ({}:{row}:{column})",
                format!("{severity}[{}]", diagnostic.code),
                diagnostic.message,
                source.origin,
            )?;

            let line = source.line_for_position(diagnostic.span.start);
            writeln!(out, "    {line}")?;
            writeln!(out, "    {}{}", " ".repeat(column - 1), "^".red().bold())?;

            for label in &diagnostic.labels {
                let row = source.row_for_position(label.span.start);
                let column = source.column_for_position(label.span.start);
                writeln!(
                    out,
                    "    {} {} ({}:{row}:{column})",
                    "note:".cyan(),
                    label.message,
                    source.origin,
                )?;
            }
        }

        let errors = records
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        let warnings = records
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();

        if errors + warnings > 0 {
            writeln!(
                out,
                "{}: {errors} error(s), {warnings} warning(s)",
                "summary".bold()
            )?;
        }

        Ok(())
    }
}

//! Diagnostic formatting for CLI output
//!
//! This module implements diagnostic emitters for different output formats:
//! - `TerminalEmitter`: rustc-style output to stderr
//! - `JsonEmitter`: machine-readable JSON output
//!
//! Both emitters support:
//! - `--strict` mode: escalates warnings to errors, hints to warnings
//! - `--quiet` mode: suppresses all output except errors
//!
//! ## Exit Code Semantics
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success: no errors (warnings/hints/info allowed) |
//! | 1 | Failure: one or more errors emitted |
//!
//! `--quiet` never changes the exit code; `--strict` does, since a workbook
//! with only warnings then exits 1.

use std::io::Write;
use std::process;

use devplan_core::{Diagnostic, DiagnosticEmitter, Severity};
use serde::Serialize;

// ============================================================================
// Exit Code
// ============================================================================

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// No errors (warnings/hints/info allowed)
    Success = 0,
    /// One or more errors emitted
    Failure = 1,
}

impl ExitCode {
    /// Determine exit code from an error count that already reflects policy
    pub fn from_error_count(count: usize) -> Self {
        if count > 0 {
            ExitCode::Failure
        } else {
            ExitCode::Success
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code as u8)
    }
}

// ============================================================================
// Diagnostic Config
// ============================================================================

/// Severity policy for diagnostic output
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticConfig {
    /// Escalate severities: warnings become errors, hints become warnings
    pub strict: bool,
    /// Suppress all output except errors
    pub quiet: bool,
}

impl DiagnosticConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Default::default()
        }
    }

    /// Escalate severity according to strict mode rules
    pub fn effective_severity(&self, severity: Severity) -> Severity {
        if self.strict {
            match severity {
                Severity::Warning => Severity::Error,
                Severity::Hint => Severity::Warning,
                s => s,
            }
        } else {
            severity
        }
    }

    /// In quiet mode only effective errors are shown
    pub fn should_show(&self, severity: Severity) -> bool {
        !self.quiet || self.effective_severity(severity) == Severity::Error
    }
}

// ============================================================================
// Terminal
// ============================================================================

/// Writes rustc-style diagnostics
pub struct TerminalEmitter<W: Write> {
    writer: W,
    config: DiagnosticConfig,
    error_count: usize,
    warning_count: usize,
}

impl<W: Write> TerminalEmitter<W> {
    pub fn new(writer: W, config: DiagnosticConfig) -> Self {
        Self {
            writer,
            config,
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from_error_count(self.error_count)
    }

    fn write_diagnostic(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        let effective = self.config.effective_severity(diagnostic.severity);

        // Counted even when hidden so --quiet keeps the exit code
        match effective {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            _ => {}
        }
        if !self.config.should_show(diagnostic.severity) {
            return Ok(());
        }

        writeln!(
            self.writer,
            "{}[{}]: {}",
            effective.as_str(),
            diagnostic.code.as_str(),
            diagnostic.message
        )?;

        if let Some(location) = &diagnostic.location {
            writeln!(self.writer, "  --> {}", location)?;
        }
        if let Some(goal) = &diagnostic.goal_code {
            writeln!(self.writer, "   = goal: {}", goal)?;
        }

        if !diagnostic.notes.is_empty() {
            writeln!(self.writer, "   |")?;
            for note in &diagnostic.notes {
                writeln!(self.writer, "   = {}", note)?;
            }
        }

        for hint in &diagnostic.hints {
            writeln!(self.writer, "   = hint: {}", hint)?;
        }

        writeln!(self.writer)?;
        Ok(())
    }
}

impl<W: Write> DiagnosticEmitter for TerminalEmitter<W> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        // stderr may be closed
        let _ = self.write_diagnostic(&diagnostic);
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Collects diagnostics for a JSON document
pub struct JsonEmitter {
    diagnostics: Vec<JsonDiagnostic>,
    config: DiagnosticConfig,
    error_count: usize,
}

/// JSON representation of a diagnostic
#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub code: String,
    pub severity: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub notes: Vec<String>,
    pub hints: Vec<String>,
}

impl JsonEmitter {
    pub fn new(config: DiagnosticConfig) -> Self {
        Self {
            diagnostics: Vec::new(),
            config,
            error_count: 0,
        }
    }

    pub fn diagnostics(&self) -> &[JsonDiagnostic] {
        &self.diagnostics
    }

    /// Effective errors, including ones hidden by quiet mode
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from_error_count(self.error_count)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.diagnostics).unwrap_or(serde_json::Value::Null)
    }
}

impl DiagnosticEmitter for JsonEmitter {
    fn emit(&mut self, diagnostic: Diagnostic) {
        let effective = self.config.effective_severity(diagnostic.severity);
        if effective == Severity::Error {
            self.error_count += 1;
        }
        if !self.config.should_show(diagnostic.severity) {
            return;
        }

        self.diagnostics.push(JsonDiagnostic {
            code: diagnostic.code.as_str().to_string(),
            severity: effective.as_str().to_string(),
            message: diagnostic.message,
            sheet: diagnostic.location.as_ref().map(|l| l.sheet.clone()),
            cell: diagnostic
                .location
                .as_ref()
                .filter(|l| l.row.is_some())
                .map(|l| l.to_string()),
            goal: diagnostic.goal_code,
            notes: diagnostic.notes,
            hints: diagnostic.hints,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devplan_core::{DiagnosticCode, SourceLocation};

    fn duplicate_code() -> Diagnostic {
        Diagnostic::new(
            DiagnosticCode::W103DuplicateGoalCode,
            "goal code 'MP-001' appears more than once",
        )
        .with_location(SourceLocation::cell("Plan Indicativo", 9, 0))
        .with_goal("MP-001")
        .with_note("first seen on row 4")
        .with_hint("give each product indicator its own code")
    }

    fn unreadable() -> Diagnostic {
        Diagnostic::error(DiagnosticCode::E101SheetUnreadable, "sheet could not be read")
    }

    #[test]
    fn terminal_emitter_basic_output() {
        let mut output = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut output, DiagnosticConfig::default());

        emitter.emit(duplicate_code());
        assert_eq!(emitter.warning_count(), 1);
        drop(emitter);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("warning[W103]: goal code 'MP-001'"));
        assert!(text.contains("--> Plan Indicativo!A9"));
        assert!(text.contains("= goal: MP-001"));
        assert!(text.contains("= first seen on row 4"));
        assert!(text.contains("hint: give each product indicator"));
    }

    #[test]
    fn terminal_emitter_strict_mode() {
        let mut output = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut output, DiagnosticConfig::strict());

        emitter.emit(duplicate_code());

        assert_eq!(emitter.error_count(), 1);
        assert_eq!(emitter.warning_count(), 0);
        drop(emitter);
        assert!(String::from_utf8(output).unwrap().contains("error[W103]"));
    }

    #[test]
    fn terminal_emitter_quiet_mode() {
        let mut output = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut output, DiagnosticConfig::quiet());

        emitter.emit(duplicate_code());
        emitter.emit(unreadable());
        drop(emitter);

        let text = String::from_utf8(output).unwrap();
        assert!(!text.contains("W103"));
        assert!(text.contains("error[E101]"));
    }

    #[test]
    fn quiet_does_not_change_exit_code() {
        let mut output = Vec::new();
        let config = DiagnosticConfig {
            strict: true,
            quiet: true,
        };
        let mut emitter = TerminalEmitter::new(&mut output, config);

        emitter.emit(duplicate_code());

        assert_eq!(emitter.exit_code(), ExitCode::Failure);
    }

    #[test]
    fn json_emitter_fields() {
        let mut emitter = JsonEmitter::new(DiagnosticConfig::default());
        emitter.emit(duplicate_code());

        let json = emitter.to_json_value();
        assert_eq!(json[0]["code"], "W103");
        assert_eq!(json[0]["severity"], "warning");
        assert_eq!(json[0]["sheet"], "Plan Indicativo");
        assert_eq!(json[0]["cell"], "Plan Indicativo!A9");
        assert_eq!(json[0]["goal"], "MP-001");
        assert_eq!(emitter.exit_code(), ExitCode::Success);
    }

    #[test]
    fn json_emitter_strict_and_quiet() {
        let mut emitter = JsonEmitter::new(DiagnosticConfig {
            strict: true,
            quiet: true,
        });
        emitter.emit(duplicate_code());
        emitter.emit(Diagnostic::new(
            DiagnosticCode::I001SheetSummary,
            "read 12 product goals",
        ));

        // escalated warning is shown, info is hidden
        assert_eq!(emitter.diagnostics().len(), 1);
        assert_eq!(emitter.diagnostics()[0].severity, "error");
        assert_eq!(emitter.exit_code(), ExitCode::Failure);
    }

    #[test]
    fn hint_becomes_warning_in_strict() {
        let config = DiagnosticConfig::strict();
        assert_eq!(config.effective_severity(Severity::Hint), Severity::Warning);
        assert_eq!(config.effective_severity(Severity::Info), Severity::Info);
    }

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::from_error_count(0), ExitCode::Success);
        assert_eq!(ExitCode::from_error_count(3), ExitCode::Failure);
        assert!(ExitCode::Success.is_success());
        assert_eq!(ExitCode::Failure.code(), 1);
    }
}

//! Diagnostics channel for data-quality findings
//!
//! Ingestion and synchronization never fail on bad content. Instead they emit
//! `Diagnostic`s through a `DiagnosticEmitter`, so callers can surface problems
//! without interrupting computation.
//!
//! Code ranges:
//! - `E1xx`: ingestion errors (a sheet could not be read)
//! - `W1xx`: ingestion warnings (missing sheet, ambiguous number, duplicates)
//! - `W2xx`: synchronization warnings (unknown codes, over-reserved quota, failed batches)
//! - `I0xx`: informational summaries

use serde::{Deserialize, Serialize};

/// Diagnostic severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Hint,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Hint => "hint",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable diagnostic codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// A sheet exists but could not be read
    E101SheetUnreadable,
    /// No sheet matched a logical sheet's name or aliases
    W101SheetMissing,
    /// A numeric cell held text that only partially parsed
    W102AmbiguousNumber,
    /// Two goals share the same product-indicator code
    W103DuplicateGoalCode,
    /// A goal row has no product-indicator code
    W104BlankGoalCode,
    /// A server record references a goal that is not in the plan
    W201UnknownGoalCode,
    /// Activities reserve more than a year's programmed target
    W202QuotaOverReserved,
    /// A bulk retrieval batch failed and was replaced with an empty result
    W203BatchFailed,
    /// Records read from a sheet
    I001SheetSummary,
    /// A cached snapshot was discarded
    I002CacheDiscarded,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::E101SheetUnreadable => "E101",
            DiagnosticCode::W101SheetMissing => "W101",
            DiagnosticCode::W102AmbiguousNumber => "W102",
            DiagnosticCode::W103DuplicateGoalCode => "W103",
            DiagnosticCode::W104BlankGoalCode => "W104",
            DiagnosticCode::W201UnknownGoalCode => "W201",
            DiagnosticCode::W202QuotaOverReserved => "W202",
            DiagnosticCode::W203BatchFailed => "W203",
            DiagnosticCode::I001SheetSummary => "I001",
            DiagnosticCode::I002CacheDiscarded => "I002",
        }
    }

    /// Severity a diagnostic with this code gets unless overridden
    pub fn default_severity(&self) -> Severity {
        match self.as_str().as_bytes().first() {
            Some(b'E') => Severity::Error,
            Some(b'W') => Severity::Warning,
            Some(b'H') => Severity::Hint,
            _ => Severity::Info,
        }
    }
}

/// Where in the workbook a finding originates
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub sheet: String,
    /// 1-based spreadsheet row
    pub row: Option<usize>,
    /// 0-based column index
    pub column: Option<usize>,
}

impl SourceLocation {
    pub fn sheet(sheet: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            row: None,
            column: None,
        }
    }

    pub fn cell(sheet: impl Into<String>, row: usize, column: usize) -> Self {
        Self {
            sheet: sheet.into(),
            row: Some(row),
            column: Some(column),
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.row, self.column) {
            (Some(row), Some(col)) => write!(f, "{}!{}{}", self.sheet, column_letter(col), row),
            (Some(row), None) => write!(f, "{}!{}", self.sheet, row),
            _ => write!(f, "{}", self.sheet),
        }
    }
}

/// Spreadsheet column letters for a 0-based index (0 → A, 26 → AA)
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// A single data-quality finding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Goal the finding concerns, when there is one
    pub goal_code: Option<String>,
    pub notes: Vec<String>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic with the code's default severity
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            location: None,
            goal_code: None,
            notes: Vec::new(),
            hints: Vec::new(),
        }
    }

    /// Create a diagnostic forced to error severity
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::new(code, message)
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_goal(mut self, code: impl Into<String>) -> Self {
        self.goal_code = Some(code.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

/// Sink for diagnostics
pub trait DiagnosticEmitter {
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Emitter that keeps every diagnostic in memory
#[derive(Clone, Debug, Default)]
pub struct CollectingEmitter {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics with a given code
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl DiagnosticEmitter for CollectingEmitter {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_severity_follows_code_prefix() {
        assert_eq!(
            DiagnosticCode::E101SheetUnreadable.default_severity(),
            Severity::Error
        );
        assert_eq!(
            DiagnosticCode::W203BatchFailed.default_severity(),
            Severity::Warning
        );
        assert_eq!(
            DiagnosticCode::I001SheetSummary.default_severity(),
            Severity::Info
        );
    }

    #[test]
    fn error_constructor_overrides_severity() {
        let d = Diagnostic::error(DiagnosticCode::W101SheetMissing, "missing");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.code.as_str(), "W101");
    }

    #[test]
    fn location_display() {
        assert_eq!(
            SourceLocation::cell("Plan Indicativo", 7, 2).to_string(),
            "Plan Indicativo!C7"
        );
        assert_eq!(SourceLocation::cell("S", 1, 27).to_string(), "S!AB1");
        assert_eq!(SourceLocation::sheet("Lineas").to_string(), "Lineas");
    }

    #[test]
    fn collecting_emitter_counts() {
        let mut emitter = CollectingEmitter::new();
        emitter.emit(Diagnostic::new(DiagnosticCode::W102AmbiguousNumber, "a"));
        emitter.emit(Diagnostic::new(DiagnosticCode::W102AmbiguousNumber, "b"));
        emitter.emit(
            Diagnostic::new(DiagnosticCode::W103DuplicateGoalCode, "dup")
                .with_goal("G1")
                .with_hint("rename one of the rows"),
        );

        assert_eq!(emitter.count(DiagnosticCode::W102AmbiguousNumber), 2);
        assert!(!emitter.has_errors());
        let all = emitter.into_inner();
        assert_eq!(all[2].goal_code.as_deref(), Some("G1"));
        assert_eq!(all[2].hints.len(), 1);
    }
}

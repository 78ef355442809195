//! # devplan-parser
//!
//! Ingestion of development-plan workbooks.
//!
//! A plan workbook carries five logical sheets (strategic lines, result
//! indicators, product goals, SGR initiatives, SGR product goals). Each is
//! located by name or alias, read positionally after two header rows, and
//! mapped into the canonical model. Content problems never fail the parse:
//! a missing or unreadable sheet yields an empty collection plus a diagnostic.
//!
//! ## Example
//!
//! ```rust
//! use calamine::Data;
//! use devplan_core::PlanHorizon;
//! use devplan_parser::{parse_workbook, MemoryWorkbook};
//!
//! let header = vec![Data::String("header".into())];
//! let mut workbook = MemoryWorkbook::new().sheet(
//!     "Lineas Estrategicas",
//!     vec![
//!         header.clone(),
//!         header,
//!         vec![
//!             Data::String("05001".into()),
//!             Data::String("Plan 2024-2027".into()),
//!             Data::Float(1.0),
//!             Data::String("Seguridad".into()),
//!         ],
//!     ],
//! );
//!
//! let parsed = parse_workbook(&mut workbook, PlanHorizon::default());
//! assert_eq!(parsed.model.lines.len(), 1);
//! assert!(parsed.model.goals.is_empty());
//! ```

pub mod cells;
pub mod sheets;

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use devplan_core::{
    CollectingEmitter, Diagnostic, DiagnosticCode, DiagnosticEmitter, PlanHorizon, PlanModel,
    SourceLocation,
};
use thiserror::Error;

pub use sheets::{resolve_sheets, SheetKind, HEADER_ROWS};

/// Workbook-level failure (the file itself could not be opened)
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Cannot open workbook: {0}")]
    Open(String),

    #[error("Cannot read sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },
}

// ============================================================================
// Workbook Sources
// ============================================================================

/// A workbook exposing sheets as positional cell grids
pub trait WorkbookSource {
    fn sheet_names(&self) -> Vec<String>;

    /// Rows of a sheet, with indices absolute from cell A1
    fn sheet_rows(&mut self, name: &str) -> Result<Vec<Vec<Data>>, ParseError>;
}

impl<RS: Read + Seek> WorkbookSource for Sheets<RS> {
    fn sheet_names(&self) -> Vec<String> {
        Reader::sheet_names(self)
    }

    fn sheet_rows(&mut self, name: &str) -> Result<Vec<Vec<Data>>, ParseError> {
        let range = self.worksheet_range(name).map_err(|e| ParseError::Sheet {
            sheet: name.to_string(),
            message: e.to_string(),
        })?;

        // calamine ranges start at the first used cell; pad back to A1
        let (first_row, first_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<Data>> = vec![Vec::new(); first_row as usize];
        for row in range.rows() {
            let mut cells = vec![Data::Empty; first_col as usize];
            cells.extend_from_slice(row);
            rows.push(cells);
        }
        Ok(rows)
    }
}

/// In-memory workbook, for programmatic ingestion and tests
#[derive(Clone, Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, Vec<Vec<Data>>)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet (builder pattern)
    pub fn sheet(mut self, name: impl Into<String>, rows: Vec<Vec<Data>>) -> Self {
        self.sheets.push((name.into(), rows));
        self
    }
}

impl WorkbookSource for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn sheet_rows(&mut self, name: &str) -> Result<Vec<Vec<Data>>, ParseError> {
        self.sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| ParseError::Sheet {
                sheet: name.to_string(),
                message: "no such sheet".to_string(),
            })
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Result of ingesting a workbook
#[derive(Clone, Debug, Default)]
pub struct ParsedWorkbook {
    pub model: PlanModel,
    /// Data-quality findings, in the order they were found
    pub diagnostics: Vec<Diagnostic>,
    /// Workbook sheet chosen for each logical sheet
    pub sheets: BTreeMap<SheetKind, String>,
}

impl ParsedWorkbook {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == devplan_core::Severity::Error)
    }
}

/// Parse a workbook file (xlsx, xls, xlsb, ods)
pub fn parse_workbook_path(
    path: &Path,
    horizon: PlanHorizon,
) -> Result<ParsedWorkbook, ParseError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ParseError::Open(e.to_string()))?;
    Ok(parse_workbook(&mut workbook, horizon))
}

/// Parse a workbook held in memory
pub fn parse_workbook_bytes(
    bytes: &[u8],
    horizon: PlanHorizon,
) -> Result<ParsedWorkbook, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Open(e.to_string()))?;
    Ok(parse_workbook(&mut workbook, horizon))
}

/// Parse every logical sheet of a workbook into a plan model
pub fn parse_workbook<W: WorkbookSource>(source: &mut W, horizon: PlanHorizon) -> ParsedWorkbook {
    let mut emitter = CollectingEmitter::new();
    let resolved = resolve_sheets(&source.sheet_names());
    let mut model = PlanModel::new(horizon);

    let mut load = |kind: SheetKind,
                    emitter: &mut CollectingEmitter|
     -> Option<(String, Vec<Vec<Data>>)> {
        let Some(name) = resolved.get(&kind) else {
            tracing::debug!(sheet = %kind, "no matching sheet");
            emitter.emit(
                Diagnostic::new(
                    DiagnosticCode::W101SheetMissing,
                    format!("no sheet found for '{}'", kind),
                )
                .with_hint(format!("accepted names contain: {}", kind.aliases().join(", "))),
            );
            return None;
        };
        match source.sheet_rows(name) {
            Ok(rows) => {
                tracing::debug!(sheet = %kind, name = %name, rows = rows.len(), "reading sheet");
                Some((name.clone(), rows))
            }
            Err(e) => {
                tracing::warn!(sheet = %kind, error = %e, "sheet unreadable");
                emitter.emit(
                    Diagnostic::new(DiagnosticCode::E101SheetUnreadable, e.to_string())
                        .with_location(SourceLocation::sheet(name.clone())),
                );
                None
            }
        }
    };

    if let Some((name, rows)) = load(SheetKind::StrategicLines, &mut emitter) {
        model.lines = sheets::read_records(&name, &rows, &mut emitter);
        summarize(&mut emitter, &name, model.lines.len());
    }
    if let Some((name, rows)) = load(SheetKind::ResultIndicators, &mut emitter) {
        model.indicators = sheets::read_records(&name, &rows, &mut emitter);
        summarize(&mut emitter, &name, model.indicators.len());
    }
    if let Some((name, rows)) = load(SheetKind::ProductGoals, &mut emitter) {
        model.goals = sheets::read_records(&name, &rows, &mut emitter);
        sheets::check_goal_codes(&name, &model.goals, &mut emitter);
        summarize(&mut emitter, &name, model.goals.len());
    }
    if let Some((name, rows)) = load(SheetKind::SgrInitiatives, &mut emitter) {
        model.sgr_initiatives = sheets::read_records(&name, &rows, &mut emitter);
        summarize(&mut emitter, &name, model.sgr_initiatives.len());
    }
    if let Some((name, rows)) = load(SheetKind::SgrProductGoals, &mut emitter) {
        model.sgr_goals = sheets::read_records(&name, &rows, &mut emitter);
        summarize(&mut emitter, &name, model.sgr_goals.len());
    }

    ParsedWorkbook {
        model,
        diagnostics: emitter.into_inner(),
        sheets: resolved,
    }
}

fn summarize(emitter: &mut CollectingEmitter, sheet: &str, count: usize) {
    emitter.emit(
        Diagnostic::new(
            DiagnosticCode::I001SheetSummary,
            format!("read {} record(s)", count),
        )
        .with_location(SourceLocation::sheet(sheet)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use devplan_core::Severity;
    use std::path::PathBuf;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn with_headers(data: Vec<Vec<Data>>) -> Vec<Vec<Data>> {
        let mut rows = vec![vec![s("Encabezado")], vec![s("Columnas")]];
        rows.extend(data);
        rows
    }

    /// Source whose named sheet always fails to load
    struct BrokenSheet(MemoryWorkbook, &'static str);

    impl WorkbookSource for BrokenSheet {
        fn sheet_names(&self) -> Vec<String> {
            self.0.sheet_names()
        }

        fn sheet_rows(&mut self, name: &str) -> Result<Vec<Vec<Data>>, ParseError> {
            if name == self.1 {
                Err(ParseError::Sheet {
                    sheet: name.into(),
                    message: "corrupt xml".into(),
                })
            } else {
                self.0.sheet_rows(name)
            }
        }
    }

    #[test]
    fn empty_workbook_yields_empty_model_and_warnings() {
        let parsed = parse_workbook(&mut MemoryWorkbook::new(), PlanHorizon::default());

        assert!(parsed.model.goals.is_empty());
        assert!(parsed.model.lines.is_empty());
        let missing = parsed
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::W101SheetMissing)
            .count();
        assert_eq!(missing, 5);
        assert!(!parsed.has_errors());
    }

    #[test]
    fn unreadable_sheet_only_empties_that_collection() {
        let workbook = MemoryWorkbook::new()
            .sheet(
                "Lineas Estrategicas",
                with_headers(vec![vec![s("05001"), s("Plan"), s("1"), s("Línea 1")]]),
            )
            .sheet("Plan Indicativo", with_headers(vec![vec![s("Línea 1")]]));
        let mut source = BrokenSheet(workbook, "Plan Indicativo");

        let parsed = parse_workbook(&mut source, PlanHorizon::default());

        assert_eq!(parsed.model.lines.len(), 1);
        assert!(parsed.model.goals.is_empty());
        assert!(parsed.has_errors());
        let error = parsed
            .diagnostics
            .iter()
            .find(|d| d.severity == Severity::Error)
            .unwrap();
        assert_eq!(error.code, DiagnosticCode::E101SheetUnreadable);
        assert!(error.message.contains("corrupt xml"));
    }

    #[test]
    fn horizon_is_carried_into_model() {
        let parsed = parse_workbook(&mut MemoryWorkbook::new(), PlanHorizon::new(2028));
        assert_eq!(parsed.model.horizon.start_year, 2028);
    }

    #[test]
    fn resolved_sheet_names_are_reported() {
        let mut workbook = MemoryWorkbook::new().sheet("INICIATIVAS SGR 2024", Vec::new());
        let parsed = parse_workbook(&mut workbook, PlanHorizon::default());

        assert_eq!(
            parsed.sheets.get(&SheetKind::SgrInitiatives).map(String::as_str),
            Some("INICIATIVAS SGR 2024")
        );
        assert!(parsed.model.sgr_initiatives.is_empty());
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let path = PathBuf::from("/nonexistent/plan.xlsx");
        let result = parse_workbook_path(&path, PlanHorizon::default());
        assert!(matches!(result, Err(ParseError::Open(_))));
    }

    #[test]
    fn garbage_bytes_are_an_open_error() {
        let result = parse_workbook_bytes(b"not a workbook", PlanHorizon::default());
        assert!(result.is_err());
    }
}

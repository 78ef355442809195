//! Logical sheets: name resolution and positional column maps

use std::collections::BTreeMap;

use calamine::Data;
use devplan_core::{
    Diagnostic, DiagnosticCode, DiagnosticEmitter, PeriodValues, PlanYear, ProductGoal,
    ResultIndicator, SgrInitiative, SgrProductGoal, SourceLocation, StrategicLine, YearValues,
};
use rust_decimal::Decimal;

use crate::cells::{cell_flag, cell_money, cell_number, cell_text, is_blank};

/// Rows at the top of every sheet that hold headers
pub const HEADER_ROWS: usize = 2;

// ============================================================================
// Sheet Kinds
// ============================================================================

/// The five logical sheets of a plan workbook
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SheetKind {
    StrategicLines,
    ResultIndicators,
    ProductGoals,
    SgrInitiatives,
    SgrProductGoals,
}

impl SheetKind {
    /// Alias matching order; more specific kinds claim sheets first
    pub const RESOLUTION_ORDER: [SheetKind; 5] = [
        SheetKind::SgrProductGoals,
        SheetKind::SgrInitiatives,
        SheetKind::ProductGoals,
        SheetKind::ResultIndicators,
        SheetKind::StrategicLines,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            SheetKind::StrategicLines => "Lineas Estrategicas",
            SheetKind::ResultIndicators => "Indicadores de Resultado",
            SheetKind::ProductGoals => "Plan Indicativo",
            SheetKind::SgrInitiatives => "Iniciativas SGR",
            SheetKind::SgrProductGoals => "Plan Indicativo SGR",
        }
    }

    /// Lowercase, accent-free substrings accepted as sheet names
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            SheetKind::StrategicLines => &["lineas estrategicas", "lineas"],
            SheetKind::ResultIndicators => &["indicadores de resultado", "resultado"],
            SheetKind::ProductGoals => &[
                "plan indicativo",
                "metas de producto",
                "metas producto",
                "producto",
            ],
            SheetKind::SgrInitiatives => &["iniciativas sgr", "iniciativas"],
            SheetKind::SgrProductGoals => &[
                "plan indicativo sgr",
                "metas sgr",
                "productos sgr",
                "producto sgr",
            ],
        }
    }
}

impl std::fmt::Display for SheetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

/// Lowercase and strip Spanish accents for name matching
fn fold(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' => 'a',
            'é' | 'è' => 'e',
            'í' | 'ì' => 'i',
            'ó' | 'ò' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

/// Assign workbook sheets to logical sheets.
///
/// Exact canonical names win first; then aliases are tried as substrings in
/// `RESOLUTION_ORDER`. A sheet is claimed by at most one kind.
pub fn resolve_sheets(names: &[String]) -> BTreeMap<SheetKind, String> {
    let folded: Vec<String> = names.iter().map(|n| fold(n)).collect();
    let mut claimed = vec![false; names.len()];
    let mut resolved = BTreeMap::new();

    for kind in SheetKind::RESOLUTION_ORDER {
        let canonical = fold(kind.canonical_name());
        if let Some(i) = folded.iter().position(|n| *n == canonical) {
            claimed[i] = true;
            resolved.insert(kind, names[i].clone());
        }
    }

    for kind in SheetKind::RESOLUTION_ORDER {
        if resolved.contains_key(&kind) {
            continue;
        }
        let hit = kind.aliases().iter().find_map(|alias| {
            folded
                .iter()
                .enumerate()
                .find(|(i, n)| !claimed[*i] && n.contains(alias))
                .map(|(i, _)| i)
        });
        if let Some(i) = hit {
            claimed[i] = true;
            resolved.insert(kind, names[i].clone());
        }
    }

    resolved
}

// ============================================================================
// Row Access
// ============================================================================

/// Positional view of one data row
pub(crate) struct RowReader<'a> {
    sheet: &'a str,
    /// 1-based spreadsheet row
    row: usize,
    cells: &'a [Data],
    emitter: &'a mut dyn DiagnosticEmitter,
}

impl<'a> RowReader<'a> {
    fn cell(&self, col: usize) -> &Data {
        self.cells.get(col).unwrap_or(&Data::Empty)
    }

    pub fn text(&self, col: usize) -> String {
        cell_text(self.cell(col))
    }

    pub fn opt_text(&self, col: usize) -> Option<String> {
        Some(self.text(col)).filter(|t| !t.is_empty())
    }

    pub fn flag(&self, col: usize) -> bool {
        cell_flag(self.cell(col))
    }

    pub fn number(&mut self, col: usize) -> f64 {
        let coerced = cell_number(self.cell(col));
        if coerced.ambiguous {
            self.ambiguous(col);
        }
        coerced.value
    }

    pub fn money(&mut self, col: usize) -> Decimal {
        let coerced = cell_money(self.cell(col));
        if coerced.ambiguous {
            self.ambiguous(col);
        }
        coerced.value
    }

    fn ambiguous(&mut self, col: usize) {
        let raw = cell_text(self.cell(col));
        self.emitter.emit(
            Diagnostic::new(
                DiagnosticCode::W102AmbiguousNumber,
                format!("'{}' only partially parsed as a number", raw),
            )
            .with_location(SourceLocation::cell(self.sheet, self.row, col))
            .with_hint("use plain digits with '.' as the decimal separator"),
        );
    }
}

/// Map the data rows of a sheet into records.
///
/// Skips the header rows and rows whose first cell is blank, and drops records
/// whose every field is blank or zero.
pub(crate) fn read_records<T: Record>(
    sheet: &str,
    rows: &[Vec<Data>],
    emitter: &mut dyn DiagnosticEmitter,
) -> Vec<T> {
    let mut records = Vec::new();
    for (offset, cells) in rows.iter().enumerate().skip(HEADER_ROWS) {
        if is_blank(cells.first()) {
            continue;
        }
        let mut row = RowReader {
            sheet,
            row: offset + 1,
            cells,
            emitter: &mut *emitter,
        };
        let record = T::read(&mut row);
        if !record.is_blank() {
            records.push(record);
        }
    }
    records
}

/// A record read from one positional row
pub(crate) trait Record: Sized {
    fn read(row: &mut RowReader<'_>) -> Self;

    /// Every field blank or zero
    fn is_blank(&self) -> bool;
}

fn year_numbers(row: &mut RowReader<'_>, first_col: usize) -> YearValues<f64> {
    YearValues::from_fn(|year| row.number(first_col + year.index()))
}

fn year_money(row: &mut RowReader<'_>, first_col: usize) -> YearValues<Decimal> {
    YearValues::from_fn(|year| row.money(first_col + year.index()))
}

fn period_numbers(row: &mut RowReader<'_>, first_col: usize) -> PeriodValues<f64> {
    PeriodValues([
        row.number(first_col),
        row.number(first_col + 1),
        row.number(first_col + 2),
    ])
}

fn period_money(row: &mut RowReader<'_>, first_col: usize) -> PeriodValues<Decimal> {
    PeriodValues([
        row.money(first_col),
        row.money(first_col + 1),
        row.money(first_col + 2),
    ])
}

fn all_empty(fields: &[&str]) -> bool {
    fields.iter().all(|f| f.is_empty())
}

// ============================================================================
// Column Maps
// ============================================================================

impl Record for StrategicLine {
    fn read(row: &mut RowReader<'_>) -> Self {
        Self {
            territorial_code: row.text(0),
            plan_name: row.text(1),
            number: row.number(2).max(0.0) as u32,
            name: row.text(3),
        }
    }

    fn is_blank(&self) -> bool {
        all_empty(&[&self.territorial_code, &self.plan_name, &self.name]) && self.number == 0
    }
}

impl Record for ResultIndicator {
    fn read(row: &mut RowReader<'_>) -> Self {
        Self {
            line: row.text(0),
            indicator: row.text(1),
            aligned: row.flag(2),
            four_year_target: row.number(3),
            transformation: row.text(4),
        }
    }

    fn is_blank(&self) -> bool {
        all_empty(&[&self.line, &self.indicator, &self.transformation])
            && !self.aligned
            && self.four_year_target == 0.0
    }
}

impl Record for ProductGoal {
    fn read(row: &mut RowReader<'_>) -> Self {
        Self {
            line: row.text(0),
            sector_code: row.text(1),
            sector: row.text(2),
            program_code: row.text(3),
            program: row.text(4),
            product_code: row.text(5),
            product: row.text(6),
            code: row.text(7),
            indicator_name: row.text(8),
            unit: row.text(9),
            four_year_target: row.number(10),
            ods_code: row.text(11),
            ods_name: row.text(12),
            programmed: year_numbers(row, 13),
            budget: year_money(row, 17),
            bpin: row.opt_text(21),
            ..Default::default()
        }
    }

    fn is_blank(&self) -> bool {
        all_empty(&[
            &self.line,
            &self.sector_code,
            &self.sector,
            &self.program_code,
            &self.program,
            &self.product_code,
            &self.product,
            &self.code,
            &self.indicator_name,
            &self.unit,
            &self.ods_code,
            &self.ods_name,
        ]) && self.four_year_target == 0.0
            && self.programmed.is_all_zero()
            && self.budget.is_all_zero()
            && self.bpin.is_none()
    }
}

impl Record for SgrInitiative {
    fn read(row: &mut RowReader<'_>) -> Self {
        Self {
            line: row.text(0),
            name: row.text(1),
            sector_code: row.text(2),
            sector: row.text(3),
            resources: period_money(row, 4),
            cofinanced: row.flag(7),
            bpin: row.opt_text(8),
        }
    }

    fn is_blank(&self) -> bool {
        all_empty(&[&self.line, &self.name, &self.sector_code, &self.sector])
            && self.resources.total().is_zero()
            && !self.cofinanced
            && self.bpin.is_none()
    }
}

impl Record for SgrProductGoal {
    fn read(row: &mut RowReader<'_>) -> Self {
        Self {
            line: row.text(0),
            sector_code: row.text(1),
            sector: row.text(2),
            program_code: row.text(3),
            program: row.text(4),
            product_code: row.text(5),
            product: row.text(6),
            code: row.text(7),
            indicator_name: row.text(8),
            unit: row.text(9),
            target: row.number(10),
            programmed: period_numbers(row, 11),
            resources: period_money(row, 14),
            cofinanced: row.flag(17),
            bpin: row.opt_text(18),
        }
    }

    fn is_blank(&self) -> bool {
        all_empty(&[
            &self.line,
            &self.sector_code,
            &self.sector,
            &self.program_code,
            &self.program,
            &self.product_code,
            &self.product,
            &self.code,
            &self.indicator_name,
            &self.unit,
        ]) && self.target == 0.0
            && self.programmed.total() == 0.0
            && self.resources.total().is_zero()
            && !self.cofinanced
            && self.bpin.is_none()
    }
}

/// Flag duplicate and blank product-indicator codes
pub(crate) fn check_goal_codes(
    sheet: &str,
    goals: &[ProductGoal],
    emitter: &mut dyn DiagnosticEmitter,
) {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, goal) in goals.iter().enumerate() {
        if goal.code.is_empty() {
            emitter.emit(
                Diagnostic::new(
                    DiagnosticCode::W104BlankGoalCode,
                    format!(
                        "goal '{}' has no product-indicator code and cannot receive activities",
                        goal.indicator_name
                    ),
                )
                .with_location(SourceLocation::sheet(sheet)),
            );
            continue;
        }
        if let Some(&first) = seen.get(goal.code.as_str()) {
            emitter.emit(
                Diagnostic::new(
                    DiagnosticCode::W103DuplicateGoalCode,
                    format!("product-indicator code '{}' appears more than once", goal.code),
                )
                .with_location(SourceLocation::sheet(sheet))
                .with_goal(goal.code.clone())
                .with_note(format!("first seen as goal #{}", first + 1))
                .with_hint("activities and assignments will attach to the first occurrence"),
            );
        } else {
            seen.insert(goal.code.as_str(), i);
        }
    }
}

//! Workbook ingestion through real .xlsx files
//!
//! Fixtures are written with rust_xlsxwriter and read back through calamine,
//! so these tests cover cell typing and used-range offsets as well as mapping.

use devplan_core::{DiagnosticCode, PlanHorizon, PlanYear, SgrPeriod};
use devplan_parser::{parse_workbook_bytes, parse_workbook_path, SheetKind};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use rust_xlsxwriter::{Workbook, XlsxError};

// =============================================================================
// Fixture helpers
// =============================================================================

enum Cell<'a> {
    Text(&'a str),
    Num(f64),
    Blank,
}

use Cell::{Blank, Num, Text};

/// Write a sheet with two header rows followed by `rows`
fn add_sheet(workbook: &mut Workbook, name: &str, rows: &[Vec<Cell<'_>>]) -> Result<(), XlsxError> {
    add_sheet_at(workbook, name, rows, true)
}

fn add_sheet_at(
    workbook: &mut Workbook,
    name: &str,
    rows: &[Vec<Cell<'_>>],
    with_headers: bool,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;
    if with_headers {
        sheet.write_string(0, 0, "PLAN DE DESARROLLO 2024-2027")?;
        sheet.write_string(1, 0, "Columna")?;
    }
    for (r, row) in rows.iter().enumerate() {
        let r = (r + 2) as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Text(text) => {
                    sheet.write_string(r, c, *text)?;
                }
                Num(value) => {
                    sheet.write_number(r, c, *value)?;
                }
                Blank => {}
            }
        }
    }
    Ok(())
}

fn goal_row<'a>(code: &'a str, sector: &'a str, budget_y2: f64) -> Vec<Cell<'a>> {
    vec![
        Text("Educación para todos"),
        Text("22"),
        Text(sector),
        Text("2201"),
        Text("Calidad educativa"),
        Text("2201001"),
        Text("Aulas dotadas"),
        Text(code),
        Text("Aulas dotadas con mobiliario"),
        Text("Número"),
        Num(200.0),
        Text("4"),
        Text("Educación de calidad"),
        Num(50.0),
        Num(50.0),
        Num(50.0),
        Num(50.0),
        Num(0.0),
        Num(budget_y2),
        Num(0.0),
        Num(0.0),
        Text("2024050010001"),
    ]
}

fn full_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    add_sheet(
        &mut workbook,
        "Líneas Estratégicas",
        &[
            vec![Text("05001"), Text("Medellín Te Quiere"), Num(1.0), Text("Educación para todos")],
            vec![Text("05001"), Text("Medellín Te Quiere"), Num(2.0), Text("Seguridad")],
        ],
    )
    .unwrap();
    add_sheet(
        &mut workbook,
        "Indicadores de Resultado",
        &[
            vec![Text("Educación para todos"), Text("Cobertura neta"), Text("SI"), Num(95.0), Text("Seguridad humana")],
            vec![Text("Seguridad"), Text("Tasa de homicidios"), Text("no"), Text("12,5"), Text("Paz total")],
        ],
    )
    .unwrap();
    add_sheet(
        &mut workbook,
        "Plan Indicativo",
        &[
            goal_row("MP-001", "Educación", 1_500_000.0),
            goal_row("MP-002", "Educación", 0.0),
        ],
    )
    .unwrap();
    add_sheet(
        &mut workbook,
        "Iniciativas SGR",
        &[vec![
            Text("Seguridad"),
            Text("Vía terciaria"),
            Text("24"),
            Text("Transporte"),
            Num(1000.0),
            Text("$ 2,000"),
            Num(0.0),
            Text("x"),
            Blank,
        ]],
    )
    .unwrap();
    add_sheet(
        &mut workbook,
        "Plan Indicativo SGR",
        &[vec![
            Text("Seguridad"),
            Text("24"),
            Text("Transporte"),
            Text("2402"),
            Text("Infraestructura vial"),
            Text("2402114"),
            Text("Vía mejorada"),
            Text("SGR-01"),
            Text("Kilómetros mejorados"),
            Text("km"),
            Num(10.0),
            Num(4.0),
            Num(6.0),
            Num(0.0),
            Num(400.0),
            Num(600.0),
            Num(0.0),
            Text("no"),
            Text("2024000100200"),
        ]],
    )
    .unwrap();
    workbook.save_to_buffer().unwrap()
}

// =============================================================================
// Full workbook
// =============================================================================

#[test]
fn reads_all_five_sheets() {
    let parsed = parse_workbook_bytes(&full_workbook(), PlanHorizon::default()).unwrap();
    let model = &parsed.model;

    assert_eq!(model.lines.len(), 2);
    assert_eq!(model.indicators.len(), 2);
    assert_eq!(model.goals.len(), 2);
    assert_eq!(model.sgr_initiatives.len(), 1);
    assert_eq!(model.sgr_goals.len(), 1);
    assert!(!parsed.has_errors());
    assert_eq!(
        parsed.sheets.get(&SheetKind::SgrProductGoals).map(String::as_str),
        Some("Plan Indicativo SGR")
    );
    assert_eq!(
        parsed.sheets.get(&SheetKind::ProductGoals).map(String::as_str),
        Some("Plan Indicativo")
    );
}

#[test]
fn strategic_lines_keep_text_codes() {
    let parsed = parse_workbook_bytes(&full_workbook(), PlanHorizon::default()).unwrap();
    let line = &parsed.model.lines[1];

    assert_eq!(line.territorial_code, "05001");
    assert_eq!(line.number, 2);
    assert_eq!(line.name, "Seguridad");
}

#[test]
fn product_goal_years_are_mapped_in_order() {
    let parsed = parse_workbook_bytes(&full_workbook(), PlanHorizon::default()).unwrap();
    let goal = parsed.model.goal("MP-001").unwrap();
    let year2 = PlanYear::new(2).unwrap();

    assert_eq!(goal.sector, "Educación");
    assert_eq!(goal.ods_code, "4");
    assert_eq!(goal.four_year_target, 200.0);
    assert_eq!(goal.programmed.total(), 200.0);
    assert_eq!(goal.budget[year2], dec!(1500000));
    assert_eq!(goal.total_budget(), dec!(1500000));
    assert_eq!(goal.bpin.as_deref(), Some("2024050010001"));
    assert!(goal.in_universe());

    let exempt = parsed.model.goal("MP-002").unwrap();
    assert!(!exempt.in_universe());
}

#[test]
fn indicator_flags_and_ambiguous_numbers() {
    let parsed = parse_workbook_bytes(&full_workbook(), PlanHorizon::default()).unwrap();
    let indicators = &parsed.model.indicators;

    assert!(indicators[0].aligned);
    assert!(!indicators[1].aligned);
    // "12,5" cleans to "125"
    assert_eq!(indicators[1].four_year_target, 125.0);
    assert_eq!(indicators[0].transformation, "Seguridad humana");
}

#[test]
fn sgr_buckets_and_money_text() {
    let parsed = parse_workbook_bytes(&full_workbook(), PlanHorizon::default()).unwrap();
    let initiative = &parsed.model.sgr_initiatives[0];

    assert_eq!(*initiative.resources.get(SgrPeriod::First), dec!(1000));
    assert_eq!(*initiative.resources.get(SgrPeriod::Second), dec!(2000));
    assert_eq!(initiative.total_resources(), dec!(3000));
    assert!(initiative.cofinanced);
    assert_eq!(initiative.bpin, None);

    let goal = &parsed.model.sgr_goals[0];
    assert_eq!(goal.code, "SGR-01");
    assert_eq!(goal.programmed.total(), 10.0);
    assert_eq!(goal.resources.total(), dec!(1000));
    assert!(!goal.cofinanced);
}

#[test]
fn every_read_sheet_gets_a_summary() {
    let parsed = parse_workbook_bytes(&full_workbook(), PlanHorizon::default()).unwrap();
    let summaries = parsed
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::I001SheetSummary)
        .count();
    assert_eq!(summaries, 5);
}

// =============================================================================
// Degraded workbooks
// =============================================================================

#[test]
fn missing_sheets_yield_empty_collections() {
    let mut workbook = Workbook::new();
    add_sheet(
        &mut workbook,
        "METAS DE PRODUCTO 2024",
        &[goal_row("MP-010", "Salud", 10.0)],
    )
    .unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let parsed = parse_workbook_bytes(&bytes, PlanHorizon::default()).unwrap();

    assert_eq!(parsed.model.goals.len(), 1);
    assert!(parsed.model.lines.is_empty());
    assert!(parsed.model.sgr_goals.is_empty());
    let missing = parsed
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::W101SheetMissing)
        .count();
    assert_eq!(missing, 4);
}

#[test]
fn sheet_without_header_text_keeps_absolute_positions() {
    // No header cells: the used range starts at row 3, not row 1
    let mut workbook = Workbook::new();
    add_sheet_at(
        &mut workbook,
        "Lineas Estrategicas",
        &[vec![Text("05001"), Text("Plan"), Num(3.0), Text("Ambiente")]],
        false,
    )
    .unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let parsed = parse_workbook_bytes(&bytes, PlanHorizon::default()).unwrap();

    assert_eq!(parsed.model.lines.len(), 1);
    assert_eq!(parsed.model.lines[0].number, 3);
    assert_eq!(parsed.model.lines[0].name, "Ambiente");
}

#[test]
fn duplicate_goal_codes_are_reported_not_dropped() {
    let mut workbook = Workbook::new();
    add_sheet(
        &mut workbook,
        "Plan Indicativo",
        &[
            goal_row("MP-001", "Educación", 10.0),
            goal_row("MP-001", "Salud", 20.0),
        ],
    )
    .unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let parsed = parse_workbook_bytes(&bytes, PlanHorizon::default()).unwrap();

    assert_eq!(parsed.model.goals.len(), 2);
    assert!(parsed
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::W103DuplicateGoalCode
            && d.goal_code.as_deref() == Some("MP-001")));
}

#[test]
fn parse_from_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.xlsx");
    std::fs::write(&path, full_workbook()).unwrap();

    let parsed = parse_workbook_path(&path, PlanHorizon::new(2024)).unwrap();

    assert_eq!(parsed.model.goals.len(), 2);
    assert_eq!(parsed.model.horizon.end_year(), 2027);
}

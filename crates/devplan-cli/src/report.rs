//! Plain-text rendering of command results

use std::fmt::Write;

use devplan_core::snapshot::{AlertLevel, AnalysisSnapshot, GroupBreakdown};
use devplan_core::{ComplianceState, PlanHorizon, PlanYear, ProductGoal};
use devplan_parser::ParsedWorkbook;
use devplan_sync::SyncReport;

/// Groups shown per breakdown before truncating
const MAX_GROUP_ROWS: usize = 10;

pub fn workbook_summary(parsed: &ParsedWorkbook) -> String {
    let model = &parsed.model;
    let mut out = String::new();
    let _ = writeln!(out, "Sheets");
    for (kind, name) in &parsed.sheets {
        let _ = writeln!(out, "  {:<26} {}", kind.canonical_name(), name);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Records");
    let _ = writeln!(out, "  strategic lines      {}", model.lines.len());
    let _ = writeln!(out, "  result indicators    {}", model.indicators.len());
    let _ = writeln!(out, "  product goals        {}", model.goals.len());
    let _ = writeln!(out, "  SGR initiatives      {}", model.sgr_initiatives.len());
    let _ = writeln!(out, "  SGR product goals    {}", model.sgr_goals.len());
    out
}

pub fn analysis(snapshot: &AnalysisSnapshot, horizon: PlanHorizon) -> String {
    let overall = &snapshot.overall;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Plan {}-{} evaluated at {}",
        horizon.start_year,
        horizon.end_year(),
        snapshot.current_year
    );
    let _ = writeln!(
        out,
        "Goals: {} total, {} budgeted, {} without budget",
        overall.total_goals, overall.universe_goals, overall.excluded_goals
    );
    let _ = writeln!(
        out,
        "Compliance: {:.1}% ({})  average progress {:.1}%",
        overall.compliance_rate,
        overall.health(),
        overall.average_progress
    );
    let _ = writeln!(
        out,
        "  met {}  in progress {}  no activity {}  upcoming {}  undefined {}",
        overall.compliant_goals,
        overall.in_progress_goals,
        overall.pending_goals,
        overall.upcoming_goals,
        overall.undefined_goals
    );
    let _ = writeln!(
        out,
        "Budget: {} ({} budgeted goals)  assigned {}  unassigned {}  activities {}",
        overall.total_budget,
        overall.universe_budget,
        overall.assigned_goals,
        overall.unassigned_goals,
        overall.total_activities
    );

    let _ = writeln!(out, "\nBy year");
    for year in &snapshot.by_year {
        let _ = writeln!(
            out,
            "  {}  {:>4} budgeted  {:>4} met  {:>5.1}%  budget {}",
            year.calendar_year,
            year.budgeted_goals,
            year.compliant_goals,
            year.compliance_rate,
            year.budget
        );
    }

    groups(&mut out, "By sector", &snapshot.by_sector);
    groups(&mut out, "By strategic line", &snapshot.by_line);
    groups(&mut out, "By ODS", &snapshot.by_ods);

    let sgr = &snapshot.sgr;
    if sgr.initiative_count + sgr.product_goal_count > 0 {
        let _ = writeln!(out, "\nSGR");
        let _ = writeln!(
            out,
            "  {} initiatives, {} product goals, resources {}",
            sgr.initiative_count, sgr.product_goal_count, sgr.total_resources
        );
        let _ = writeln!(
            out,
            "  with BPIN {}  without BPIN {}  cofinanced {}",
            sgr.with_bpin, sgr.without_bpin, sgr.cofinanced
        );
    }

    let sources = &snapshot.budget_sources;
    let _ = writeln!(
        out,
        "\nBudget sources: ordinary {} ({:.1}%)  SGR {} ({:.1}%)",
        sources.ordinary_total, sources.ordinary_pct, sources.sgr_total, sources.sgr_pct
    );

    let indicators = &snapshot.indicators;
    if indicators.total > 0 {
        let _ = writeln!(
            out,
            "Result indicators: {} of {} aligned ({:.1}%)",
            indicators.aligned, indicators.total, indicators.aligned_pct
        );
    }

    if !snapshot.trends.is_empty() {
        let _ = writeln!(out, "\nTrends");
        for trend in &snapshot.trends {
            let _ = writeln!(out, "  - {}", trend);
        }
    }
    if !snapshot.recommendations.is_empty() {
        let _ = writeln!(out, "\nRecommendations");
        for rec in &snapshot.recommendations {
            let _ = writeln!(out, "  - [{}] {}", rec.rule.as_str(), rec.message);
        }
    }
    if !snapshot.alerts.is_empty() {
        let _ = writeln!(out, "\nAlerts");
        for alert in &snapshot.alerts {
            let level = match alert.level {
                AlertLevel::Critical => "critical",
                AlertLevel::Warning => "warning",
            };
            let _ = writeln!(out, "  - {} [{}] {}", level, alert.rule.as_str(), alert.message);
        }
    }
    if !snapshot.inconsistencies.is_empty() {
        let _ = writeln!(out, "\nInconsistencies");
        for item in &snapshot.inconsistencies {
            let _ = writeln!(
                out,
                "  - {}: {} ({})",
                item.kind.description(),
                item.count,
                preview(&item.goal_codes)
            );
        }
    }
    out
}

fn groups(out: &mut String, title: &str, rows: &[GroupBreakdown]) {
    if rows.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}", title);
    for row in rows.iter().take(MAX_GROUP_ROWS) {
        let _ = writeln!(
            out,
            "  {:<32} {:>4} goals  {:>5.1}%  progress {:>5.1}%",
            truncate(&row.name, 32),
            row.total_goals,
            row.compliance_rate,
            row.average_progress
        );
    }
    if rows.len() > MAX_GROUP_ROWS {
        let _ = writeln!(out, "  ... {} more", rows.len() - MAX_GROUP_ROWS);
    }
}

/// One line per goal, with the per-year states of the plan
pub fn goal_table(goals: &[&ProductGoal], horizon: PlanHorizon) -> String {
    let mut out = String::new();
    let years: Vec<String> = PlanYear::ALL
        .iter()
        .map(|y| horizon.calendar_year(*y).to_string())
        .collect();
    let _ = writeln!(
        out,
        "{:<14} {:<20} {:<12} {:<12} {:<12} {:<12} {:<12} {:>6}  unit",
        "code", "sector", years[0], years[1], years[2], years[3], "overall", "prog%"
    );
    for goal in goals {
        let states: Vec<&str> = goal.states.values().map(ComplianceState::as_str).collect();
        let _ = writeln!(
            out,
            "{:<14} {:<20} {:<12} {:<12} {:<12} {:<12} {:<12} {:>6.1}  {}",
            truncate(&goal.code, 14),
            truncate(&goal.sector, 20),
            states[0],
            states[1],
            states[2],
            states[3],
            goal.overall_state.as_str(),
            goal.overall_progress,
            goal.assigned_unit.as_deref().unwrap_or("-")
        );
    }
    let _ = writeln!(out, "\n{} goals", goals.len());
    out
}

pub fn sync_report(report: &SyncReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Assignments merged: {}", report.assignments);
    let _ = writeln!(out, "Activities merged:  {}", report.activities);
    if report.is_partial() {
        let _ = writeln!(
            out,
            "Failed batches:     {} (those goals have no activities until the next sync)",
            report.failed_batches
        );
    }
    let _ = writeln!(
        out,
        "Snapshot cached:    {}",
        if report.cached { "yes" } else { "no" }
    );
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn preview(codes: &[String]) -> String {
    const SHOWN: usize = 5;
    let mut text = codes.iter().take(SHOWN).cloned().collect::<Vec<_>>().join(", ");
    if codes.len() > SHOWN {
        let _ = write!(text, ", +{}", codes.len() - SHOWN);
    }
    text
}

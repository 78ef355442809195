//! Aggregation of per-goal results into an `AnalysisSnapshot`
//!
//! Goals must already carry derived states (see `ComplianceEngine::apply`).
//! Rate denominators only count goals in the compliance universe (nonzero
//! four-year budget); raw totals may include budget-exempt goals.

use std::collections::HashMap;

use devplan_core::snapshot::{
    AmountBySector, AnalysisSnapshot, BudgetSourceSummary, GroupBreakdown, IndicatorAlignment,
    LabelCount, LineAlignment, OverallIndicators, SgrSummary, SourceSplit, YearBreakdown,
};
use devplan_core::{ComplianceState, PlanModel, PlanYear, ProductGoal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::{inconsistency, narrative};

/// Display name for goals with an empty grouping field
pub const UNSPECIFIED: &str = "Unspecified";

/// Build the full snapshot for a model whose states are up to date
pub fn build_snapshot(model: &PlanModel, current_year: i32) -> AnalysisSnapshot {
    let mut snapshot = AnalysisSnapshot {
        current_year,
        overall: overall_indicators(model),
        by_year: year_breakdown(model),
        by_sector: sector_breakdown(model),
        by_line: line_breakdown(model),
        by_ods: ods_breakdown(model),
        sgr: sgr_summary(model),
        indicators: indicator_alignment(model),
        budget_sources: budget_sources(model),
        inconsistencies: inconsistency::detect(model),
        ..AnalysisSnapshot::default()
    };
    snapshot.trends = narrative::trends(&snapshot);
    snapshot.recommendations = narrative::recommendations(&snapshot);
    snapshot.alerts = narrative::alerts(&snapshot);

    tracing::debug!(
        goals = snapshot.overall.total_goals,
        universe = snapshot.overall.universe_goals,
        rate = snapshot.overall.compliance_rate,
        "snapshot built"
    );
    snapshot
}

/// `part / whole * 100`, zero when `whole` is zero
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn decimal_share(part: Decimal, total: Decimal) -> f64 {
    if total.is_zero() {
        0.0
    } else {
        (part / total * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(0.0)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Find the entry matching `is_match`, appending `make()` when there is none
fn entry_for<'a, T>(
    items: &'a mut Vec<T>,
    is_match: impl Fn(&T) -> bool,
    make: impl FnOnce() -> T,
) -> &'a mut T {
    let index = match items.iter().position(is_match) {
        Some(i) => i,
        None => {
            items.push(make());
            items.len() - 1
        }
    };
    &mut items[index]
}

// ============================================================================
// Overall and per-year
// ============================================================================

pub fn overall_indicators(model: &PlanModel) -> OverallIndicators {
    let universe: Vec<&ProductGoal> = model.universe().collect();
    let count = |state: ComplianceState| {
        universe
            .iter()
            .filter(|g| g.overall_state == state)
            .count()
    };
    let compliant_goals = count(ComplianceState::Cumplida);
    let assigned_goals = model
        .goals
        .iter()
        .filter(|g| g.assigned_unit.is_some())
        .count();

    OverallIndicators {
        total_goals: model.goals.len(),
        universe_goals: universe.len(),
        excluded_goals: model.goals.len() - universe.len(),
        compliant_goals,
        in_progress_goals: count(ComplianceState::EnProgreso),
        pending_goals: count(ComplianceState::Pendiente),
        upcoming_goals: count(ComplianceState::PorCumplir),
        undefined_goals: count(ComplianceState::SinDefinir),
        compliance_rate: percent(compliant_goals, universe.len()),
        average_progress: mean(universe.iter().map(|g| g.overall_progress)),
        total_budget: model.goals.iter().map(ProductGoal::total_budget).sum(),
        universe_budget: universe.iter().map(|g| g.total_budget()).sum(),
        assigned_goals,
        unassigned_goals: model.goals.len() - assigned_goals,
        total_activities: model.activity_count(),
    }
}

/// Per plan year: goals budgeted that year and how many met that year's target
pub fn year_breakdown(model: &PlanModel) -> Vec<YearBreakdown> {
    PlanYear::ALL
        .into_iter()
        .map(|year| {
            let budgeted: Vec<&ProductGoal> = model
                .goals
                .iter()
                .filter(|g| !g.budget[year].is_zero())
                .collect();
            let compliant_goals = budgeted
                .iter()
                .filter(|g| g.states[year] == ComplianceState::Cumplida)
                .count();
            YearBreakdown {
                plan_year: year,
                calendar_year: model.horizon.calendar_year(year),
                budgeted_goals: budgeted.len(),
                compliant_goals,
                compliance_rate: percent(compliant_goals, budgeted.len()),
                budget: model.goals.iter().map(|g| g.budget[year]).sum(),
            }
        })
        .collect()
}

// ============================================================================
// Grouped breakdowns
// ============================================================================

#[derive(Default)]
struct GroupAcc {
    key: String,
    name: String,
    total: usize,
    compliant: usize,
    progress: f64,
    budget: Decimal,
}

/// Group universe goals by a (key, name) pair, in first-appearance order
fn group_universe(
    model: &PlanModel,
    key_of: impl Fn(&ProductGoal) -> (String, String),
) -> Vec<GroupBreakdown> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<GroupAcc> = Vec::new();

    for goal in model.universe() {
        let (key, name) = key_of(goal);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(GroupAcc {
                key,
                name,
                ..GroupAcc::default()
            });
            groups.len() - 1
        });
        let acc = &mut groups[slot];
        acc.total += 1;
        if goal.overall_state == ComplianceState::Cumplida {
            acc.compliant += 1;
        }
        acc.progress += goal.overall_progress;
        acc.budget += goal.total_budget();
    }

    groups
        .into_iter()
        .map(|acc| GroupBreakdown {
            compliance_rate: percent(acc.compliant, acc.total),
            average_progress: if acc.total == 0 {
                0.0
            } else {
                acc.progress / acc.total as f64
            },
            key: acc.key,
            name: acc.name,
            total_goals: acc.total,
            compliant_goals: acc.compliant,
            budget: acc.budget,
        })
        .collect()
}

fn display_name(name: &str, fallback: &str) -> String {
    let name = name.trim();
    if !name.is_empty() {
        name.to_string()
    } else if !fallback.trim().is_empty() {
        fallback.trim().to_string()
    } else {
        UNSPECIFIED.to_string()
    }
}

/// Sectors, by compliance rate descending
pub fn sector_breakdown(model: &PlanModel) -> Vec<GroupBreakdown> {
    let mut groups = group_universe(model, |g| {
        let key = if g.sector_code.trim().is_empty() {
            g.sector.trim()
        } else {
            g.sector_code.trim()
        };
        (key.to_string(), display_name(&g.sector, &g.sector_code))
    });
    groups.sort_by(|a, b| {
        b.compliance_rate
            .total_cmp(&a.compliance_rate)
            .then_with(|| a.key.cmp(&b.key))
    });
    groups
}

/// Strategic lines, in plan order
pub fn line_breakdown(model: &PlanModel) -> Vec<GroupBreakdown> {
    group_universe(model, |g| {
        (g.line.trim().to_string(), display_name(&g.line, ""))
    })
}

/// ODS codes, by goal count descending
pub fn ods_breakdown(model: &PlanModel) -> Vec<GroupBreakdown> {
    let mut groups = group_universe(model, |g| {
        (
            g.ods_code.trim().to_string(),
            display_name(&g.ods_name, &g.ods_code),
        )
    });
    groups.sort_by(|a, b| {
        b.total_goals
            .cmp(&a.total_goals)
            .then_with(|| a.key.cmp(&b.key))
    });
    groups
}

// ============================================================================
// SGR, indicators, budget sources
// ============================================================================

pub fn sgr_summary(model: &PlanModel) -> SgrSummary {
    let initiatives = &model.sgr_initiatives;

    let mut by_sector: Vec<AmountBySector> = Vec::new();
    for initiative in initiatives {
        let sector = display_name(&initiative.sector, &initiative.sector_code);
        entry_for(&mut by_sector, |s| s.sector == sector, || AmountBySector {
            sector: sector.clone(),
            amount: Decimal::ZERO,
        })
        .amount += initiative.total_resources();
    }
    by_sector.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.sector.cmp(&b.sector)));

    let with_bpin = initiatives.iter().filter(|i| i.bpin.is_some()).count();

    SgrSummary {
        initiative_count: initiatives.len(),
        product_goal_count: model.sgr_goals.len(),
        total_resources: initiatives.iter().map(|i| i.total_resources()).sum(),
        by_sector,
        with_bpin,
        without_bpin: initiatives.len() - with_bpin,
        cofinanced: initiatives.iter().filter(|i| i.cofinanced).count(),
    }
}

pub fn indicator_alignment(model: &PlanModel) -> IndicatorAlignment {
    let indicators = &model.indicators;
    let aligned = indicators.iter().filter(|i| i.aligned).count();

    let mut by_line: Vec<LineAlignment> = Vec::new();
    for indicator in indicators {
        let line = display_name(&indicator.line, "");
        let entry = entry_for(&mut by_line, |l| l.line == line, || LineAlignment {
            line: line.clone(),
            ..LineAlignment::default()
        });
        entry.total += 1;
        if indicator.aligned {
            entry.aligned += 1;
        }
    }
    for line in &mut by_line {
        line.aligned_pct = percent(line.aligned, line.total);
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for indicator in indicators {
        let label = indicator.transformation.trim();
        if !label.is_empty() {
            *counts.entry(label).or_default() += 1;
        }
    }
    let mut transformations: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
        })
        .collect();
    transformations.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    IndicatorAlignment {
        total: indicators.len(),
        aligned,
        aligned_pct: percent(aligned, indicators.len()),
        by_line,
        transformations,
    }
}

/// Ordinary budget against royalty resources.
///
/// Per-year SGR figures split each two-year bucket evenly; the third bucket
/// lies beyond the plan and only counts toward the total.
pub fn budget_sources(model: &PlanModel) -> BudgetSourceSummary {
    let ordinary_total: Decimal = model.goals.iter().map(ProductGoal::total_budget).sum();
    let sgr_total: Decimal = model
        .sgr_initiatives
        .iter()
        .map(|i| i.total_resources())
        .sum();
    let grand_total = ordinary_total + sgr_total;

    let by_year = PlanYear::ALL
        .into_iter()
        .map(|year| SourceSplit {
            label: model.horizon.calendar_year(year).to_string(),
            ordinary: model.goals.iter().map(|g| g.budget[year]).sum(),
            sgr: model
                .sgr_initiatives
                .iter()
                .map(|i| i.resources.per_year_share(year))
                .sum(),
        })
        .collect();

    let mut by_sector: Vec<SourceSplit> = Vec::new();
    for goal in &model.goals {
        let label = display_name(&goal.sector, &goal.sector_code);
        source_split(&mut by_sector, label).ordinary += goal.total_budget();
    }
    for initiative in &model.sgr_initiatives {
        let label = display_name(&initiative.sector, &initiative.sector_code);
        source_split(&mut by_sector, label).sgr += initiative.total_resources();
    }

    BudgetSourceSummary {
        ordinary_total,
        sgr_total,
        ordinary_pct: decimal_share(ordinary_total, grand_total),
        sgr_pct: decimal_share(sgr_total, grand_total),
        by_year,
        by_sector,
    }
}

fn source_split(splits: &mut Vec<SourceSplit>, label: String) -> &mut SourceSplit {
    entry_for(splits, |s| s.label == label, || SourceSplit {
        label: label.clone(),
        ..SourceSplit::default()
    })
}

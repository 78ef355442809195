//! Integration tests for compliance derivation and aggregate invariants
//!
//! Scenarios follow a 2024-2027 plan evaluated from 2026 unless noted.

use devplan_core::snapshot::InconsistencyKind;
use devplan_core::{Activity, ComplianceState, PlanHorizon, PlanModel, PlanYear, ProductGoal};
use devplan_engine::{ComplianceEngine, GoalFilter, PlanEngine};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

fn y(n: u8) -> PlanYear {
    PlanYear::new(n).unwrap()
}

fn horizon() -> PlanHorizon {
    PlanHorizon::new(2024)
}

// =============================================================================
// Scenarios
// =============================================================================

/// Goal G: budget only in year 2, year-2 target 50, 30 executed
#[test]
fn single_budgeted_year_in_progress() {
    let goal = ProductGoal::new("G")
        .programmed(y(2), 50.0)
        .budget(y(2), dec!(100))
        .activity(Activity::new("G", "Obra", 2025).executed(30.0));

    let evaluation = ComplianceEngine::new(horizon(), 2026).evaluate(&goal);

    assert_eq!(evaluation.state(y(2)), ComplianceState::EnProgreso);
    assert!((evaluation.years[y(2)].progress - 60.0).abs() < 1e-9);
    for year in [y(1), y(3), y(4)] {
        assert_eq!(evaluation.state(year), ComplianceState::SinDefinir);
    }
    assert!((evaluation.overall_progress - 60.0).abs() < 1e-9);
    assert_eq!(evaluation.overall_state, ComplianceState::EnProgreso);
}

/// Goal H: no budget anywhere, activities ignored
#[test]
fn unbudgeted_goal_is_undefined_everywhere() {
    let goal = ProductGoal::new("H")
        .target(100.0)
        .programmed(y(1), 25.0)
        .programmed(y(2), 25.0)
        .activity(Activity::new("H", "a", 2024).executed(25.0))
        .activity(Activity::new("H", "b", 2025).executed(25.0));

    let evaluation = ComplianceEngine::new(horizon(), 2026).evaluate(&goal);

    for year in PlanYear::ALL {
        assert_eq!(evaluation.state(year), ComplianceState::SinDefinir);
        assert_eq!(evaluation.years[year].progress, 0.0);
    }
    assert_eq!(evaluation.overall_state, ComplianceState::SinDefinir);
    assert_eq!(evaluation.overall_progress, 0.0);
    assert_eq!(evaluation.cumulative_progress, 0.0);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn future_years_are_always_upcoming() {
    let mut goal = ProductGoal::new("F").budget(y(1), dec!(1));
    for year in PlanYear::ALL {
        goal = goal.programmed(year, 10.0);
    }
    for calendar in 2024..=2027 {
        goal = goal.activity(Activity::new("F", "a", calendar).executed(10.0));
    }

    for current in 2023..=2027 {
        let engine = ComplianceEngine::new(horizon(), current);
        for year in PlanYear::ALL {
            let state = engine.year_outcome(&goal, year).state;
            if horizon().calendar_year(year) > current {
                assert_eq!(state, ComplianceState::PorCumplir, "{year} from {current}");
            } else {
                assert_eq!(state, ComplianceState::Cumplida, "{year} from {current}");
            }
        }
    }
}

#[test]
fn state_follows_percentage_bands() {
    let engine = ComplianceEngine::new(horizon(), 2026);
    let cases = [
        (0.0, ComplianceState::Pendiente),
        (0.001, ComplianceState::EnProgreso),
        (39.99, ComplianceState::EnProgreso),
        (40.0, ComplianceState::Cumplida),
        (400.0, ComplianceState::Cumplida),
    ];
    for (executed, expected) in cases {
        let goal = ProductGoal::new("P")
            .programmed(y(1), 40.0)
            .budget(y(1), dec!(5))
            .activity(Activity::new("P", "a", 2024).executed(executed));
        assert_eq!(engine.year_outcome(&goal, y(1)).state, expected, "executed {executed}");
    }
}

#[test]
fn activities_of_other_years_do_not_count() {
    let goal = ProductGoal::new("O")
        .programmed(y(1), 10.0)
        .budget(y(1), dec!(5))
        .activity(Activity::new("O", "a", 2025).executed(10.0));
    let outcome = ComplianceEngine::new(horizon(), 2026).year_outcome(&goal, y(1));
    assert_eq!(outcome.state, ComplianceState::Pendiente);
    assert_eq!(outcome.activities, 0);
}

#[test]
fn quota_is_conserved_across_reservations() {
    let mut model = PlanModel::new(horizon());
    model
        .goals
        .push(ProductGoal::new("Q").programmed(y(3), 12.0).budget(y(3), dec!(1)));
    let mut engine = PlanEngine::new(model, 2026);

    // Reserve greedily until the bound stops us
    let mut reserved = 0.0;
    for (i, request) in [5.0, 5.0, 5.0, 2.0, 0.5].into_iter().enumerate() {
        let available = engine.available_quota("Q", 2026, None).unwrap();
        if request <= available {
            let id = format!("A{i}");
            engine.model_mut().goals[0]
                .activities
                .push(Activity::new("Q", "a", 2026).id(id).reserve(request));
            reserved += request;
        }
        assert!(reserved <= 12.0);
    }

    assert_eq!(reserved, 12.0);
    assert_eq!(engine.available_quota("Q", 2026, None), Some(0.0));
    assert_eq!(engine.available_quota("Q", 2026, Some("A0")), Some(5.0));
}

#[test]
fn unbudgeted_goals_never_enter_rates() {
    let mut model = PlanModel::new(horizon());
    model.goals.push(
        ProductGoal::new("IN")
            .sector("19", "Salud")
            .line("L1")
            .ods("3", "Salud y bienestar")
            .programmed(y(1), 10.0)
            .budget(y(1), dec!(50))
            .activity(Activity::new("IN", "a", 2024).executed(10.0)),
    );
    model.goals.push(
        ProductGoal::new("OUT")
            .sector("19", "Salud")
            .line("L1")
            .ods("3", "Salud y bienestar")
            .programmed(y(1), 10.0),
    );

    let engine = PlanEngine::new(model, 2026);
    let snapshot = engine.snapshot();

    let sector = snapshot.sector("Salud").unwrap();
    assert_eq!(sector.total_goals, 1);
    assert_eq!(sector.compliance_rate, 100.0);
    assert_eq!(snapshot.by_line[0].compliance_rate, 100.0);
    assert_eq!(snapshot.by_ods[0].total_goals, 1);

    // raw totals still see both goals
    assert_eq!(snapshot.overall.total_goals, 2);
    assert_eq!(snapshot.overall.excluded_goals, 1);
    assert_eq!(
        snapshot
            .inconsistency(InconsistencyKind::ProgrammedWithoutBudget)
            .map(|i| i.goal_codes.clone()),
        Some(vec!["OUT".to_string()])
    );
    assert!(snapshot.alerts.is_empty());
}

#[test]
fn low_past_year_raises_alert_and_recommendations() {
    let mut model = PlanModel::new(horizon());
    for (code, sector) in [("A", "Salud"), ("B", "Salud"), ("C", "Vías")] {
        model.goals.push(
            ProductGoal::new(code)
                .sector(sector, sector)
                .line("L1")
                .programmed(y(1), 10.0)
                .budget(y(1), dec!(10))
                .activity(Activity::new(code, "a", 2024).executed(1.0)),
        );
    }

    let engine = PlanEngine::new(model, 2026);
    let snapshot = engine.snapshot();
    let alerts: Vec<&str> = snapshot.alerts.iter().map(|a| a.rule.as_str()).collect();
    let recs: Vec<&str> = snapshot
        .recommendations
        .iter()
        .map(|r| r.rule.as_str())
        .collect();

    assert_eq!(
        alerts,
        vec![
            "ALERT_SECTOR_CRITICAL",
            "ALERT_SECTOR_CRITICAL",
            "ALERT_YEAR_CLOSED_LOW"
        ]
    );
    assert_eq!(
        recs,
        vec![
            "REC_OVERALL_LOW",
            "REC_SECTOR_LOW",
            "REC_SECTOR_LOW",
            "REC_LINE_LOW"
        ]
    );
}

#[test]
fn filter_by_year_state() {
    let mut model = PlanModel::new(horizon());
    model.goals.push(
        ProductGoal::new("DONE")
            .programmed(y(1), 1.0)
            .budget(y(1), dec!(1))
            .activity(Activity::new("DONE", "a", 2024).executed(1.0)),
    );
    model
        .goals
        .push(ProductGoal::new("IDLE").programmed(y(1), 1.0).budget(y(1), dec!(1)));

    let engine = PlanEngine::new(model, 2026);
    let done = engine.recompute(
        &GoalFilter::new()
            .year(y(1))
            .state(ComplianceState::Cumplida),
    );
    let idle = engine.recompute(&GoalFilter::new().state(ComplianceState::Pendiente));

    assert_eq!(done.len(), 1);
    assert_eq!(done[0].code, "DONE");
    assert_eq!(idle.len(), 1);
    assert_eq!(idle[0].code, "IDLE");
}

#[test]
fn snapshot_serializes_with_wire_codes() {
    let mut model = PlanModel::new(horizon());
    model.goals.push(
        ProductGoal::new("S")
            .sector("19", "Salud")
            .programmed(y(1), 1.0)
            .budget(y(1), dec!(1)),
    );
    let engine = PlanEngine::new(model, 2026);

    let json = serde_json::to_string(engine.snapshot()).unwrap();
    assert!(json.contains("\"ALERT_SECTOR_CRITICAL\""));
    assert!(json.contains("\"REC_OVERALL_LOW\""));

    let goal_json = serde_json::to_string(&engine.model().goals[0]).unwrap();
    assert!(goal_json.contains("\"PENDIENTE\""));
}

//! Merging remote records into the plan model
//!
//! Remote data never changes goal identity: assignments set the assigned unit,
//! activities replace a goal's activity list. Records for codes the workbook
//! does not know are reported, not inserted.

use std::collections::BTreeMap;

use devplan_core::{
    Activity, Assignment, Diagnostic, DiagnosticCode, DiagnosticEmitter, GoalCode, PlanModel,
    PlanYear, ProductGoal,
};
use devplan_engine::quota::QUOTA_TOLERANCE;

/// Apply assignments in order; a later record for the same goal wins.
///
/// Returns the number of records that matched a goal.
pub fn merge_assignments(
    model: &mut PlanModel,
    assignments: &[Assignment],
    emitter: &mut dyn DiagnosticEmitter,
) -> usize {
    let mut applied = 0;
    for assignment in assignments {
        match model.goal_mut(&assignment.goal_code) {
            Some(goal) => {
                goal.assigned_unit = assignment.effective_unit().map(str::to_string);
                applied += 1;
            }
            None => emitter.emit(unknown_code(&assignment.goal_code, "assignment")),
        }
    }
    tracing::debug!(applied, total = assignments.len(), "merged assignments");
    applied
}

/// Replace activity lists with the fetched ones.
///
/// Goals absent from `activities` keep what they had. Returns the number of
/// activities placed on goals.
pub fn merge_activities(
    model: &mut PlanModel,
    activities: &BTreeMap<GoalCode, Vec<Activity>>,
    emitter: &mut dyn DiagnosticEmitter,
) -> usize {
    let mut placed = 0;
    for (code, list) in activities {
        let Some(goal) = model.goal_mut(code) else {
            if !list.is_empty() {
                emitter.emit(unknown_code(code, "activity list"));
            }
            continue;
        };
        goal.activities = list.clone();
        placed += list.len();
    }

    let horizon = model.horizon;
    for goal in model.goals.iter().filter(|g| activities.contains_key(&g.code)) {
        for year in PlanYear::ALL {
            let calendar_year = horizon.calendar_year(year);
            check_reservations(goal, calendar_year, goal.programmed[year], emitter);
        }
    }
    placed
}

/// `W202` when a year's reservations add up to more than its target
fn check_reservations(
    goal: &ProductGoal,
    calendar_year: i32,
    target: f64,
    emitter: &mut dyn DiagnosticEmitter,
) {
    let reserved = goal.reserved_quota(calendar_year, None);
    if reserved > target + QUOTA_TOLERANCE {
        tracing::warn!(
            goal = %goal.code,
            year = calendar_year,
            reserved,
            target,
            "quota over-reserved"
        );
        emitter.emit(
            Diagnostic::new(
                DiagnosticCode::W202QuotaOverReserved,
                format!(
                    "activities reserve {} for {} but the programmed target is {}",
                    reserved, calendar_year, target
                ),
            )
            .with_goal(goal.code.clone())
            .with_hint("reduce the reserved quota of one of the activities"),
        );
    }
}

fn unknown_code(code: &str, what: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::W201UnknownGoalCode,
        format!("{} references unknown goal '{}'", what, code),
    )
    .with_goal(code)
    .with_note("the workbook has no product goal with this code")
}

//! Data-quality scan over every goal (universe or not)

use devplan_core::snapshot::{Inconsistency, InconsistencyKind};
use devplan_core::{PlanModel, ProductGoal};

fn has_programming(goal: &ProductGoal) -> bool {
    goal.programmed.values().any(|v| *v > 0.0)
}

fn applies(kind: InconsistencyKind, goal: &ProductGoal) -> bool {
    match kind {
        InconsistencyKind::MissingSector => {
            goal.sector.trim().is_empty() && goal.sector_code.trim().is_empty()
        }
        InconsistencyKind::MissingLine => goal.line.trim().is_empty(),
        InconsistencyKind::ZeroProgramming => !has_programming(goal),
        InconsistencyKind::ProgrammedWithoutBudget => {
            has_programming(goal) && goal.budget.is_all_zero()
        }
    }
}

/// One record per kind that affects at least one goal
pub fn detect(model: &PlanModel) -> Vec<Inconsistency> {
    InconsistencyKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let goal_codes: Vec<String> = model
                .goals
                .iter()
                .filter(|g| applies(kind, g))
                .map(|g| g.code.clone())
                .collect();
            if goal_codes.is_empty() {
                return None;
            }
            tracing::debug!(kind = kind.as_str(), count = goal_codes.len(), "inconsistency");
            Some(Inconsistency {
                kind,
                count: goal_codes.len(),
                goal_codes,
            })
        })
        .collect()
}

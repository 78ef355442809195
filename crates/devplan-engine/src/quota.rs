//! Annual quota reservation
//!
//! A goal's programmed target for a year is shared out among the activities
//! of that year. The engine only computes the bound; callers check drafts
//! against it before persisting.

use devplan_core::{ActivityDraft, PlanHorizon, PlanModel, ProductGoal, ValidationError};

/// Slack for floating-point error when comparing reservations with a target
pub const QUOTA_TOLERANCE: f64 = 1e-9;

/// Unreserved part of a goal's target for a calendar year, floored at zero.
///
/// `excluding` skips the activity being edited so its own reservation is
/// available to it again. Years outside the plan have no quota.
pub fn available_quota(
    goal: &ProductGoal,
    horizon: &PlanHorizon,
    calendar_year: i32,
    excluding: Option<&str>,
) -> f64 {
    let Some(year) = horizon.plan_year(calendar_year) else {
        return 0.0;
    };
    let target = goal.programmed[year];
    if !target.is_finite() {
        return 0.0;
    }
    (target - goal.reserved_quota(calendar_year, excluding)).max(0.0)
}

/// Check a requested reservation against the available bound.
///
/// Differences within [`QUOTA_TOLERANCE`] count as fitting.
pub fn check_reservation(requested: f64, available: f64) -> Result<(), ValidationError> {
    if !requested.is_finite() || requested <= 0.0 {
        return Err(ValidationError::QuotaNotPositive(requested));
    }
    if requested > available + QUOTA_TOLERANCE {
        return Err(ValidationError::QuotaExceeded {
            requested,
            available,
        });
    }
    Ok(())
}

/// Validate an activity draft against the model before it reaches a store.
///
/// `editing` is the id of the activity being edited, if any.
pub fn validate_draft(
    model: &PlanModel,
    draft: &ActivityDraft,
    editing: Option<&str>,
) -> Result<(), ValidationError> {
    draft.validate_fields(&model.horizon)?;
    let goal = model
        .goal(&draft.goal_code)
        .ok_or_else(|| ValidationError::UnknownGoal(draft.goal_code.clone()))?;
    let available = available_quota(goal, &model.horizon, draft.plan_year, editing);
    check_reservation(draft.reserved_quota, available)
}

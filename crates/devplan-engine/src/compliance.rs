//! Compliance state derivation
//!
//! Every branch is total over its numeric inputs: missing or zero targets
//! degrade to `SinDefinir`, nothing here fails or panics.

use chrono::Datelike;
use devplan_core::{
    ComplianceState, ExecutionSource, PlanHorizon, PlanModel, PlanYear, ProductGoal, YearValues,
};
use serde::{Deserialize, Serialize};

/// Progress percentages are capped here for display
pub const PROGRESS_CAP: f64 = 100.0;

/// State and progress of one goal in one plan year
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct YearOutcome {
    pub state: ComplianceState,
    /// Capped progress percentage
    pub progress: f64,
    /// Uncapped executed / target * 100
    pub raw_percentage: f64,
    pub programmed: f64,
    pub executed: f64,
    /// Number of activities scoped to the year
    pub activities: usize,
}

impl YearOutcome {
    fn undefined(programmed: f64) -> Self {
        Self {
            programmed,
            ..Self::default()
        }
    }
}

/// Full evaluation of one goal
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalEvaluation {
    pub years: YearValues<YearOutcome>,
    /// Mean of the non-zero capped per-year percentages
    pub overall_progress: f64,
    /// Total executed / four-year target * 100, capped
    pub cumulative_progress: f64,
    pub overall_state: ComplianceState,
}

impl GoalEvaluation {
    pub fn state(&self, year: PlanYear) -> ComplianceState {
        self.years[year].state
    }
}

/// Derives compliance states relative to a current calendar year
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComplianceEngine {
    horizon: PlanHorizon,
    current_year: i32,
    source: ExecutionSource,
}

impl ComplianceEngine {
    pub fn new(horizon: PlanHorizon, current_year: i32) -> Self {
        Self {
            horizon,
            current_year,
            source: ExecutionSource::default(),
        }
    }

    /// Engine anchored at the wall-clock year
    pub fn now(horizon: PlanHorizon) -> Self {
        Self::new(horizon, current_calendar_year())
    }

    /// Choose how an activity's executed value is read
    pub fn with_source(mut self, source: ExecutionSource) -> Self {
        self.source = source;
        self
    }

    pub fn horizon(&self) -> PlanHorizon {
        self.horizon
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn source(&self) -> ExecutionSource {
        self.source
    }

    /// State and progress for a single goal and plan year
    pub fn year_outcome(&self, goal: &ProductGoal, year: PlanYear) -> YearOutcome {
        let programmed = sanitize(goal.programmed[year]);

        if !goal.in_universe() || programmed <= 0.0 {
            return YearOutcome::undefined(programmed);
        }

        if self.horizon.is_future(year, self.current_year) {
            return YearOutcome {
                state: ComplianceState::PorCumplir,
                programmed,
                ..YearOutcome::default()
            };
        }

        let calendar_year = self.horizon.calendar_year(year);
        let mut activities = 0;
        let mut executed = 0.0;
        for activity in goal.activities_for(calendar_year) {
            activities += 1;
            executed += sanitize(activity.executed_total(self.source));
        }

        if activities == 0 {
            return YearOutcome {
                state: ComplianceState::Pendiente,
                programmed,
                ..YearOutcome::default()
            };
        }

        let raw_percentage = executed / programmed * 100.0;
        let state = if raw_percentage >= 100.0 {
            ComplianceState::Cumplida
        } else if raw_percentage > 0.0 {
            ComplianceState::EnProgreso
        } else {
            ComplianceState::Pendiente
        };

        YearOutcome {
            state,
            progress: raw_percentage.clamp(0.0, PROGRESS_CAP),
            raw_percentage,
            programmed,
            executed,
            activities,
        }
    }

    /// Evaluate every plan year of a goal plus its overall view
    pub fn evaluate(&self, goal: &ProductGoal) -> GoalEvaluation {
        let years = YearValues::from_fn(|year| self.year_outcome(goal, year));

        if !goal.in_universe() {
            return GoalEvaluation {
                years,
                ..GoalEvaluation::default()
            };
        }

        let nonzero: Vec<f64> = years
            .values()
            .map(|o| o.progress)
            .filter(|p| *p > 0.0)
            .collect();
        let overall_progress = if nonzero.is_empty() {
            0.0
        } else {
            nonzero.iter().sum::<f64>() / nonzero.len() as f64
        };

        let target = sanitize(goal.four_year_target);
        let cumulative_progress = if target > 0.0 {
            (sanitize(goal.executed_total(self.source)) / target * 100.0).clamp(0.0, PROGRESS_CAP)
        } else {
            0.0
        };

        GoalEvaluation {
            overall_state: overall_state(years.values().map(|o| o.state)),
            years,
            overall_progress,
            cumulative_progress,
        }
    }

    /// Write derived states and progress into every goal of the model
    pub fn apply(&self, model: &mut PlanModel) {
        for goal in &mut model.goals {
            let evaluation = self.evaluate(goal);
            goal.states = YearValues::from_fn(|year| evaluation.years[year].state);
            goal.progress = YearValues::from_fn(|year| evaluation.years[year].progress);
            goal.overall_state = evaluation.overall_state;
            goal.overall_progress = evaluation.overall_progress;
        }
        tracing::debug!(
            goals = model.goals.len(),
            current_year = self.current_year,
            "compliance recomputed"
        );
    }
}

/// Combine per-year states into the overall goal state
pub fn overall_state(states: impl IntoIterator<Item = ComplianceState>) -> ComplianceState {
    let defined: Vec<ComplianceState> = states
        .into_iter()
        .filter(|s| *s != ComplianceState::SinDefinir)
        .collect();

    if defined.is_empty() {
        ComplianceState::SinDefinir
    } else if defined.iter().all(|s| *s == ComplianceState::Cumplida) {
        ComplianceState::Cumplida
    } else if defined.iter().all(|s| *s == ComplianceState::PorCumplir) {
        ComplianceState::PorCumplir
    } else if defined
        .iter()
        .any(|s| matches!(s, ComplianceState::Cumplida | ComplianceState::EnProgreso))
    {
        ComplianceState::EnProgreso
    } else {
        ComplianceState::Pendiente
    }
}

/// Calendar year of the local wall clock
pub fn current_calendar_year() -> i32 {
    chrono::Local::now().year()
}

/// Non-finite and negative inputs count as zero
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devplan_core::{Activity, ExecutionEntry};
    use rust_decimal::Decimal;

    fn y(n: u8) -> PlanYear {
        PlanYear::new(n).unwrap()
    }

    fn budgeted_goal() -> ProductGoal {
        ProductGoal::new("G")
            .target(200.0)
            .programmed(y(1), 50.0)
            .programmed(y(2), 50.0)
            .programmed(y(3), 50.0)
            .programmed(y(4), 50.0)
            .budget(y(1), Decimal::from(100))
    }

    fn engine(current_year: i32) -> ComplianceEngine {
        ComplianceEngine::new(PlanHorizon::new(2024), current_year)
    }

    #[test]
    fn no_activity_is_pending() {
        let outcome = engine(2025).year_outcome(&budgeted_goal(), y(1));
        assert_eq!(outcome.state, ComplianceState::Pendiente);
        assert_eq!(outcome.progress, 0.0);
    }

    #[test]
    fn current_year_is_not_future() {
        let goal = budgeted_goal().activity(Activity::new("G", "a", 2025).executed(10.0));
        let outcome = engine(2025).year_outcome(&goal, y(2));
        assert_eq!(outcome.state, ComplianceState::EnProgreso);
        assert_eq!(outcome.progress, 20.0);
    }

    #[test]
    fn future_year_ignores_activities() {
        let goal = budgeted_goal().activity(Activity::new("G", "a", 2027).executed(500.0));
        let outcome = engine(2025).year_outcome(&goal, y(4));
        assert_eq!(outcome.state, ComplianceState::PorCumplir);
        assert_eq!(outcome.executed, 0.0);
    }

    #[test]
    fn overshoot_is_capped_for_display_only() {
        let goal = budgeted_goal().activity(Activity::new("G", "a", 2024).executed(75.0));
        let outcome = engine(2026).year_outcome(&goal, y(1));
        assert_eq!(outcome.state, ComplianceState::Cumplida);
        assert_eq!(outcome.progress, 100.0);
        assert_eq!(outcome.raw_percentage, 150.0);
    }

    #[test]
    fn zero_execution_with_activities_is_pending() {
        let goal = budgeted_goal().activity(Activity::new("G", "a", 2024));
        let outcome = engine(2026).year_outcome(&goal, y(1));
        assert_eq!(outcome.state, ComplianceState::Pendiente);
        assert_eq!(outcome.activities, 1);
    }

    #[test]
    fn non_finite_inputs_degrade_to_undefined() {
        let goal = budgeted_goal().programmed(y(1), f64::NAN);
        let outcome = engine(2026).year_outcome(&goal, y(1));
        assert_eq!(outcome.state, ComplianceState::SinDefinir);
    }

    #[test]
    fn execution_source_policy() {
        let activity = Activity::new("G", "a", 2024)
            .id("A1")
            .executed(10.0)
            .with_execution(ExecutionEntry::new("A1", 30.0))
            .with_execution(ExecutionEntry::new("A1", 20.0));
        let goal = budgeted_goal().activity(activity);

        let entries = engine(2026).year_outcome(&goal, y(1));
        assert_eq!(entries.state, ComplianceState::Cumplida);

        let stored = engine(2026)
            .with_source(ExecutionSource::Stored)
            .year_outcome(&goal, y(1));
        assert_eq!(stored.state, ComplianceState::EnProgreso);
        assert_eq!(stored.progress, 20.0);
    }

    #[test]
    fn overall_state_combinations() {
        use ComplianceState::*;
        assert_eq!(overall_state([SinDefinir; 4]), SinDefinir);
        assert_eq!(overall_state([Cumplida, SinDefinir, Cumplida, SinDefinir]), Cumplida);
        assert_eq!(overall_state([PorCumplir; 4]), PorCumplir);
        assert_eq!(overall_state([Cumplida, PorCumplir, PorCumplir, PorCumplir]), EnProgreso);
        assert_eq!(overall_state([Pendiente, EnProgreso, PorCumplir, SinDefinir]), EnProgreso);
        assert_eq!(overall_state([Pendiente, Pendiente, PorCumplir, PorCumplir]), Pendiente);
    }

    #[test]
    fn cumulative_progress_uses_four_year_target() {
        let goal = budgeted_goal()
            .activity(Activity::new("G", "a", 2024).executed(50.0))
            .activity(Activity::new("G", "b", 2025).executed(25.0));
        let evaluation = engine(2026).evaluate(&goal);

        // years 1 and 2: 100% and 50%, year 3 pending, year 4 future
        assert_eq!(evaluation.overall_progress, 75.0);
        assert_eq!(evaluation.cumulative_progress, 37.5);
        assert_eq!(evaluation.overall_state, ComplianceState::EnProgreso);
    }

    #[test]
    fn apply_writes_derived_fields() {
        let mut model = PlanModel::new(PlanHorizon::new(2024));
        model
            .goals
            .push(budgeted_goal().activity(Activity::new("G", "a", 2024).executed(50.0)));

        engine(2024).apply(&mut model);

        let goal = &model.goals[0];
        assert_eq!(goal.states[y(1)], ComplianceState::Cumplida);
        assert_eq!(goal.states[y(2)], ComplianceState::PorCumplir);
        assert_eq!(goal.progress[y(1)], 100.0);
        assert_eq!(goal.overall_state, ComplianceState::EnProgreso);
        assert_eq!(goal.overall_progress, 100.0);
    }
}

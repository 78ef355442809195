//! # devplan-engine
//!
//! Compliance state derivation, quota reservation and plan analytics.
//!
//! This crate provides:
//! - Per goal, per plan-year compliance states and progress ([`compliance`])
//! - Annual quota reservation bounds and draft validation ([`quota`])
//! - Aggregate analytics: overall, per year, sector, line, ODS, SGR and budget source ([`aggregate`])
//! - Rule-based trends, recommendations and alerts ([`narrative`])
//! - Data inconsistency detection ([`inconsistency`])
//! - Goal filtering ([`filter`])
//!
//! `PlanEngine` ties these together over an owned `PlanModel`.
//!
//! ## Example
//!
//! ```rust
//! use devplan_core::{Activity, ComplianceState, PlanHorizon, PlanModel, PlanYear, ProductGoal};
//! use devplan_engine::PlanEngine;
//! use rust_decimal::Decimal;
//!
//! let year2 = PlanYear::new(2).unwrap();
//! let mut model = PlanModel::new(PlanHorizon::new(2024));
//! model.goals.push(
//!     ProductGoal::new("G")
//!         .programmed(year2, 50.0)
//!         .budget(year2, Decimal::from(100))
//!         .activity(Activity::new("G", "Obra", 2025).executed(30.0)),
//! );
//!
//! let engine = PlanEngine::new(model, 2026);
//! assert_eq!(engine.state_for("G", year2), Some(ComplianceState::EnProgreso));
//! assert_eq!(engine.available_quota("G", 2025, None), Some(50.0));
//! ```

pub mod aggregate;
pub mod compliance;
pub mod filter;
pub mod inconsistency;
pub mod narrative;
pub mod quota;

use devplan_core::snapshot::AnalysisSnapshot;
use devplan_core::{
    ActivityDraft, ComplianceState, ExecutionSource, PlanModel, PlanYear, ProductGoal,
    ValidationError,
};

pub use compliance::{ComplianceEngine, GoalEvaluation, YearOutcome};
pub use filter::{GoalFilter, UnitFilter};

/// Owns a plan model, keeps its derived states current, and answers queries
#[derive(Clone, Debug)]
pub struct PlanEngine {
    model: PlanModel,
    compliance: ComplianceEngine,
    snapshot: AnalysisSnapshot,
}

impl PlanEngine {
    /// Take ownership of a model and derive everything against `current_year`
    pub fn new(model: PlanModel, current_year: i32) -> Self {
        let compliance = ComplianceEngine::new(model.horizon, current_year);
        Self::with_engine(model, compliance)
    }

    /// Derive against the wall-clock year
    pub fn now(model: PlanModel) -> Self {
        Self::new(model, compliance::current_calendar_year())
    }

    pub fn with_engine(model: PlanModel, compliance: ComplianceEngine) -> Self {
        let mut engine = Self {
            model,
            compliance,
            snapshot: AnalysisSnapshot::default(),
        };
        engine.refresh();
        engine
    }

    /// Switch the executed-value policy and re-derive
    pub fn with_source(mut self, source: ExecutionSource) -> Self {
        self.compliance = self.compliance.with_source(source);
        self.refresh();
        self
    }

    pub fn model(&self) -> &PlanModel {
        &self.model
    }

    /// Mutable access; call [`PlanEngine::refresh`] after material changes
    pub fn model_mut(&mut self) -> &mut PlanModel {
        &mut self.model
    }

    pub fn into_model(self) -> PlanModel {
        self.model
    }

    pub fn snapshot(&self) -> &AnalysisSnapshot {
        &self.snapshot
    }

    pub fn compliance(&self) -> &ComplianceEngine {
        &self.compliance
    }

    pub fn current_year(&self) -> i32 {
        self.compliance.current_year()
    }

    /// Re-derive against another current year
    pub fn set_current_year(&mut self, current_year: i32) {
        self.compliance = ComplianceEngine::new(self.model.horizon, current_year)
            .with_source(self.compliance.source());
        self.refresh();
    }

    /// Replace the model wholesale and re-derive
    pub fn replace_model(&mut self, model: PlanModel) {
        self.compliance = ComplianceEngine::new(model.horizon, self.current_year())
            .with_source(self.compliance.source());
        self.model = model;
        self.refresh();
    }

    /// Recompute goal states and the snapshot from the current model
    pub fn refresh(&mut self) -> &AnalysisSnapshot {
        self.compliance.apply(&mut self.model);
        self.snapshot = aggregate::build_snapshot(&self.model, self.compliance.current_year());
        &self.snapshot
    }

    /// Goals matching a filter, in plan order
    pub fn recompute(&self, filter: &GoalFilter) -> Vec<&ProductGoal> {
        filter.apply(&self.model.goals)
    }

    /// Compliance state of a goal in a plan year (None for unknown goals)
    pub fn state_for(&self, code: &str, year: PlanYear) -> Option<ComplianceState> {
        self.model
            .goal(code)
            .map(|goal| self.compliance.year_outcome(goal, year).state)
    }

    pub fn evaluate(&self, code: &str) -> Option<GoalEvaluation> {
        self.model.goal(code).map(|goal| self.compliance.evaluate(goal))
    }

    /// Unreserved quota of a goal for a calendar year (None for unknown goals)
    pub fn available_quota(
        &self,
        code: &str,
        calendar_year: i32,
        excluding: Option<&str>,
    ) -> Option<f64> {
        self.model.goal(code).map(|goal| {
            quota::available_quota(goal, &self.model.horizon, calendar_year, excluding)
        })
    }

    /// Validate a new or edited activity before it is persisted
    pub fn validate_draft(
        &self,
        draft: &ActivityDraft,
        editing: Option<&str>,
    ) -> Result<(), ValidationError> {
        quota::validate_draft(&self.model, draft, editing)
    }
}

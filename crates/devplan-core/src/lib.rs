//! # devplan-core
//!
//! Core domain model for the development-plan goal tracking engine.
//!
//! This crate provides:
//! - Plan-year types: `PlanHorizon`, `PlanYear`, `YearValues`, `SgrPeriod`, `PeriodValues`
//! - Domain types: `PlanModel`, `ProductGoal`, `Activity`, `ExecutionEntry`, `Assignment`
//! - The compliance state set (`ComplianceState`)
//! - Validation errors and the diagnostics channel
//! - Analysis snapshot types (see [`snapshot`])
//!
//! ## Example
//!
//! ```rust
//! use devplan_core::{Activity, PlanModel, PlanYear, ProductGoal};
//! use rust_decimal::Decimal;
//!
//! let mut model = PlanModel::default();
//! model.goals.push(
//!     ProductGoal::new("MP-001")
//!         .sector("22", "Educación")
//!         .programmed(PlanYear::new(2).unwrap(), 50.0)
//!         .budget(PlanYear::new(2).unwrap(), Decimal::from(100))
//!         .activity(Activity::new("MP-001", "Dotación aulas", 2025).reserve(20.0)),
//! );
//!
//! let goal = model.goal("MP-001").unwrap();
//! assert!(goal.in_universe());
//! assert_eq!(goal.reserved_quota(2025, None), 20.0);
//! ```

pub mod diagnostics;
pub mod snapshot;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use thiserror::Error;

pub use diagnostics::{
    CollectingEmitter, Diagnostic, DiagnosticCode, DiagnosticEmitter, Severity, SourceLocation,
};

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique product-indicator code of a goal (cross-reference key)
pub type GoalCode = String;

/// Server-assigned identifier of an activity
pub type ActivityId = String;

/// Maximum number of evidence images attached to one execution entry
pub const MAX_EVIDENCE_IMAGES: usize = 4;

// ============================================================================
// Plan Years
// ============================================================================

/// Ordinal year of the four-year plan (1..=4)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PlanYear(u8);

impl PlanYear {
    /// Number of years in a plan
    pub const COUNT: usize = 4;

    /// All plan years in order
    pub const ALL: [PlanYear; 4] = [PlanYear(1), PlanYear(2), PlanYear(3), PlanYear(4)];

    /// Create a plan year from its ordinal (1..=4)
    pub fn new(ordinal: u8) -> Option<Self> {
        (1..=4).contains(&ordinal).then_some(Self(ordinal))
    }

    pub const fn ordinal(self) -> u8 {
        self.0
    }

    /// Zero-based position in per-year arrays
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// The following plan year, if any
    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }
}

impl TryFrom<u8> for PlanYear {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("plan year must be 1..=4, got {}", value))
    }
}

impl From<PlanYear> for u8 {
    fn from(year: PlanYear) -> Self {
        year.0
    }
}

impl std::fmt::Display for PlanYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "year {}", self.0)
    }
}

/// Maps ordinal plan years to calendar years
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanHorizon {
    /// Calendar year of plan year 1
    pub start_year: i32,
}

impl Default for PlanHorizon {
    fn default() -> Self {
        Self { start_year: 2024 }
    }
}

impl PlanHorizon {
    pub const fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    /// Calendar year of a plan year
    pub fn calendar_year(&self, year: PlanYear) -> i32 {
        self.start_year + year.index() as i32
    }

    /// Plan year of a calendar year, if it falls inside the plan
    pub fn plan_year(&self, calendar_year: i32) -> Option<PlanYear> {
        let offset = calendar_year - self.start_year;
        if (0..PlanYear::COUNT as i32).contains(&offset) {
            PlanYear::new(offset as u8 + 1)
        } else {
            None
        }
    }

    /// Last calendar year of the plan
    pub fn end_year(&self) -> i32 {
        self.start_year + PlanYear::COUNT as i32 - 1
    }

    /// Is the plan year strictly after `current_year`?
    pub fn is_future(&self, year: PlanYear, current_year: i32) -> bool {
        self.calendar_year(year) > current_year
    }

    /// Is the plan year strictly before `current_year`?
    pub fn is_past(&self, year: PlanYear, current_year: i32) -> bool {
        self.calendar_year(year) < current_year
    }
}

/// Four per-year values indexed by `PlanYear`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct YearValues<T>(pub [T; 4]);

impl<T> YearValues<T> {
    /// Build values by evaluating `f` for each plan year
    pub fn from_fn(mut f: impl FnMut(PlanYear) -> T) -> Self {
        Self(PlanYear::ALL.map(&mut f))
    }

    pub fn get(&self, year: PlanYear) -> &T {
        &self.0[year.index()]
    }

    pub fn set(&mut self, year: PlanYear, value: T) {
        self.0[year.index()] = value;
    }

    /// Iterate `(year, value)` pairs in plan order
    pub fn iter(&self) -> impl Iterator<Item = (PlanYear, &T)> {
        PlanYear::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl YearValues<f64> {
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

impl YearValues<Decimal> {
    pub fn total(&self) -> Decimal {
        self.0.iter().copied().sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|v| v.is_zero())
    }
}

impl<T> Index<PlanYear> for YearValues<T> {
    type Output = T;

    fn index(&self, year: PlanYear) -> &T {
        &self.0[year.index()]
    }
}

impl<T> IndexMut<PlanYear> for YearValues<T> {
    fn index_mut(&mut self, year: PlanYear) -> &mut T {
        &mut self.0[year.index()]
    }
}

/// Two-year royalty (SGR) funding bucket of the planning horizon
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SgrPeriod {
    /// Horizon years 1-2
    First,
    /// Horizon years 3-4
    Second,
    /// Horizon years 5-6 (beyond the four-year plan)
    Third,
}

impl SgrPeriod {
    pub const ALL: [SgrPeriod; 3] = [SgrPeriod::First, SgrPeriod::Second, SgrPeriod::Third];

    pub const fn index(self) -> usize {
        match self {
            SgrPeriod::First => 0,
            SgrPeriod::Second => 1,
            SgrPeriod::Third => 2,
        }
    }

    /// Ordinals of the two horizon years covered by this bucket
    pub const fn horizon_years(self) -> (u8, u8) {
        match self {
            SgrPeriod::First => (1, 2),
            SgrPeriod::Second => (3, 4),
            SgrPeriod::Third => (5, 6),
        }
    }

    /// Bucket containing a plan year
    pub fn containing(year: PlanYear) -> Self {
        match year.ordinal() {
            1 | 2 => SgrPeriod::First,
            _ => SgrPeriod::Second,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SgrPeriod::First => "years 1-2",
            SgrPeriod::Second => "years 3-4",
            SgrPeriod::Third => "years 5-6",
        }
    }
}

/// Three per-bucket values indexed by `SgrPeriod`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodValues<T>(pub [T; 3]);

impl<T> PeriodValues<T> {
    pub fn get(&self, period: SgrPeriod) -> &T {
        &self.0[period.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SgrPeriod, &T)> {
        SgrPeriod::ALL.into_iter().zip(self.0.iter())
    }
}

impl PeriodValues<Decimal> {
    pub fn total(&self) -> Decimal {
        self.0.iter().copied().sum()
    }

    /// Even split of the bucket containing `year` (an approximation, not an allocation)
    pub fn per_year_share(&self, year: PlanYear) -> Decimal {
        *self.get(SgrPeriod::containing(year)) / Decimal::TWO
    }
}

impl PeriodValues<f64> {
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

// ============================================================================
// Compliance State
// ============================================================================

/// Compliance state of a goal for one plan year or overall
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceState {
    /// Executed value reached the programmed target
    Cumplida,
    /// Some execution reported, target not reached
    EnProgreso,
    /// Plan year lies in the future
    PorCumplir,
    /// Year is open or closed but nothing has been executed
    Pendiente,
    /// No budget or no programmed target
    #[default]
    SinDefinir,
}

impl ComplianceState {
    pub const ALL: [ComplianceState; 5] = [
        ComplianceState::Cumplida,
        ComplianceState::EnProgreso,
        ComplianceState::PorCumplir,
        ComplianceState::Pendiente,
        ComplianceState::SinDefinir,
    ];

    /// Stable wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceState::Cumplida => "CUMPLIDA",
            ComplianceState::EnProgreso => "EN_PROGRESO",
            ComplianceState::PorCumplir => "POR_CUMPLIR",
            ComplianceState::Pendiente => "PENDIENTE",
            ComplianceState::SinDefinir => "SIN_DEFINIR",
        }
    }

    /// Human-readable description
    pub fn label(&self) -> &'static str {
        match self {
            ComplianceState::Cumplida => "Met",
            ComplianceState::EnProgreso => "In Progress",
            ComplianceState::PorCumplir => "Upcoming",
            ComplianceState::Pendiente => "No Activity",
            ComplianceState::SinDefinir => "Undefined",
        }
    }

    /// Parse a wire code (case-insensitive)
    pub fn parse(code: &str) -> Option<Self> {
        let upper = code.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|s| s.as_str() == upper)
    }
}

impl std::fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which figure counts as an activity's executed value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionSource {
    /// Sum of loaded execution entries, falling back to the stored value
    #[default]
    Entries,
    /// The activity's stored executed-value field only
    Stored,
}

// ============================================================================
// Plan Model
// ============================================================================

/// The canonical in-memory plan: ingested collections plus merged runtime data
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanModel {
    pub horizon: PlanHorizon,
    pub lines: Vec<StrategicLine>,
    pub indicators: Vec<ResultIndicator>,
    pub goals: Vec<ProductGoal>,
    pub sgr_initiatives: Vec<SgrInitiative>,
    pub sgr_goals: Vec<SgrProductGoal>,
}

impl PlanModel {
    pub fn new(horizon: PlanHorizon) -> Self {
        Self {
            horizon,
            ..Default::default()
        }
    }

    /// Get a goal by its product-indicator code
    pub fn goal(&self, code: &str) -> Option<&ProductGoal> {
        self.goals.iter().find(|g| g.code == code)
    }

    pub fn goal_mut(&mut self, code: &str) -> Option<&mut ProductGoal> {
        self.goals.iter_mut().find(|g| g.code == code)
    }

    /// Goals with a nonzero four-year budget
    pub fn universe(&self) -> impl Iterator<Item = &ProductGoal> {
        self.goals.iter().filter(|g| g.in_universe())
    }

    /// Codes of all goals, in plan order, skipping blanks
    pub fn goal_codes(&self) -> Vec<GoalCode> {
        self.goals
            .iter()
            .filter(|g| !g.code.is_empty())
            .map(|g| g.code.clone())
            .collect()
    }

    pub fn activity_count(&self) -> usize {
        self.goals.iter().map(|g| g.activities.len()).sum()
    }
}

/// A named pillar of the plan
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategicLine {
    pub territorial_code: String,
    pub plan_name: String,
    pub number: u32,
    pub name: String,
}

/// Outcome metric tied to a strategic line
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultIndicator {
    /// Strategic line name
    pub line: String,
    pub indicator: String,
    /// Aligned with the national development plan
    pub aligned: bool,
    pub four_year_target: f64,
    /// National-plan transformation label
    pub transformation: String,
}

/// A deliverable with a four-year target and per-year sub-targets and budget
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductGoal {
    /// Unique product-indicator code
    pub code: GoalCode,
    /// Strategic line name
    pub line: String,
    pub sector_code: String,
    pub sector: String,
    pub program_code: String,
    pub program: String,
    pub product_code: String,
    pub product: String,
    pub indicator_name: String,
    pub unit: String,
    /// Four-year cumulative target
    pub four_year_target: f64,
    pub ods_code: String,
    pub ods_name: String,
    /// Programmed target per plan year
    pub programmed: YearValues<f64>,
    /// Budgeted amount per plan year
    pub budget: YearValues<Decimal>,
    /// Project-budget identifier (BPIN)
    pub bpin: Option<String>,

    // ========================================================================
    // Derived / runtime fields
    // ========================================================================
    /// Compliance state per plan year
    pub states: YearValues<ComplianceState>,
    /// Capped progress percentage per plan year
    pub progress: YearValues<f64>,
    pub overall_state: ComplianceState,
    pub overall_progress: f64,
    /// Responsible organizational unit (None = unassigned)
    pub assigned_unit: Option<String>,
    pub activities: Vec<Activity>,
}

impl ProductGoal {
    /// Create a goal with the given product-indicator code
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.line = line.into();
        self
    }

    pub fn sector(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.sector_code = code.into();
        self.sector = name.into();
        self
    }

    pub fn ods(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.ods_code = code.into();
        self.ods_name = name.into();
        self
    }

    pub fn indicator(mut self, name: impl Into<String>) -> Self {
        self.indicator_name = name.into();
        self
    }

    pub fn target(mut self, four_year_target: f64) -> Self {
        self.four_year_target = four_year_target;
        self
    }

    pub fn programmed(mut self, year: PlanYear, target: f64) -> Self {
        self.programmed.set(year, target);
        self
    }

    pub fn budget(mut self, year: PlanYear, amount: Decimal) -> Self {
        self.budget.set(year, amount);
        self
    }

    pub fn assigned_to(mut self, unit: impl Into<String>) -> Self {
        self.assigned_unit = Some(unit.into());
        self
    }

    pub fn activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    /// Budget summed over the four plan years
    pub fn total_budget(&self) -> Decimal {
        self.budget.total()
    }

    /// Does this goal belong to the compliance universe (nonzero total budget)?
    pub fn in_universe(&self) -> bool {
        !self.total_budget().is_zero()
    }

    /// Activities scoped to a calendar year
    pub fn activities_for(&self, calendar_year: i32) -> impl Iterator<Item = &Activity> {
        self.activities
            .iter()
            .filter(move |a| a.plan_year == calendar_year)
    }

    /// Reserved quota of the activities of a calendar year, optionally skipping one activity
    pub fn reserved_quota(&self, calendar_year: i32, excluding: Option<&str>) -> f64 {
        self.activities_for(calendar_year)
            .filter(|a| match (excluding, a.id.as_deref()) {
                (Some(skip), Some(id)) => skip != id,
                _ => true,
            })
            .map(|a| a.reserved_quota)
            .sum()
    }

    /// Executed value of all activities across the plan
    pub fn executed_total(&self, source: ExecutionSource) -> f64 {
        self.activities.iter().map(|a| a.executed_total(source)).sum()
    }
}

/// Royalty-funded initiative
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SgrInitiative {
    pub line: String,
    pub name: String,
    pub sector_code: String,
    pub sector: String,
    /// Royalty resources per two-year bucket
    pub resources: PeriodValues<Decimal>,
    pub cofinanced: bool,
    pub bpin: Option<String>,
}

impl SgrInitiative {
    pub fn total_resources(&self) -> Decimal {
        self.resources.total()
    }
}

/// Royalty-funded product goal
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SgrProductGoal {
    pub code: GoalCode,
    pub line: String,
    pub sector_code: String,
    pub sector: String,
    pub program_code: String,
    pub program: String,
    pub product_code: String,
    pub product: String,
    pub indicator_name: String,
    pub unit: String,
    pub target: f64,
    pub programmed: PeriodValues<f64>,
    pub resources: PeriodValues<Decimal>,
    pub cofinanced: bool,
    pub bpin: Option<String>,
}

// ============================================================================
// Activities and Executions
// ============================================================================

/// Lifecycle status of an activity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::Planned => write!(f, "Planned"),
            ActivityStatus::InProgress => write!(f, "In Progress"),
            ActivityStatus::Completed => write!(f, "Completed"),
            ActivityStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Planned work against one goal for exactly one plan year
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Server identifier (None until persisted)
    pub id: Option<ActivityId>,
    pub goal_code: GoalCode,
    pub name: String,
    pub description: String,
    pub responsible_unit: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub status: ActivityStatus,
    /// Calendar year this activity is scoped to
    pub plan_year: i32,
    /// Portion of the year's programmed target committed by this activity
    pub reserved_quota: f64,
    /// Executed value as stored with the activity
    pub executed_value: f64,
    #[serde(default)]
    pub executions: Vec<ExecutionEntry>,
}

impl Activity {
    pub fn new(goal_code: impl Into<String>, name: impl Into<String>, plan_year: i32) -> Self {
        Self {
            goal_code: goal_code.into(),
            name: name.into(),
            plan_year,
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn reserve(mut self, quota: f64) -> Self {
        self.reserved_quota = quota;
        self
    }

    pub fn executed(mut self, value: f64) -> Self {
        self.executed_value = value;
        self
    }

    pub fn responsible(mut self, unit: impl Into<String>) -> Self {
        self.responsible_unit = unit.into();
        self
    }

    pub fn with_execution(mut self, entry: ExecutionEntry) -> Self {
        self.executions.push(entry);
        self
    }

    /// Executed value under the given policy.
    ///
    /// `Entries` sums the loaded execution entries and falls back to the stored
    /// figure when none are loaded.
    pub fn executed_total(&self, source: ExecutionSource) -> f64 {
        match source {
            ExecutionSource::Entries if !self.executions.is_empty() => {
                self.executions.iter().map(|e| e.value).sum()
            }
            _ => self.executed_value,
        }
    }
}

/// Incremental, append-only report of work done against an activity
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub id: Option<String>,
    pub activity_id: ActivityId,
    /// Incremental executed quantity
    pub value: f64,
    pub description: Option<String>,
    pub reference_url: Option<String>,
    #[serde(default)]
    pub evidence: Vec<EvidenceImage>,
    pub reported_at: Option<DateTime<Utc>>,
}

impl ExecutionEntry {
    pub fn new(activity_id: impl Into<String>, value: f64) -> Self {
        Self {
            activity_id: activity_id.into(),
            value,
            ..Default::default()
        }
    }
}

/// Evidence image attached to an execution entry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceImage {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Encoded (base64) content
    pub content: String,
}

/// Execution report as submitted, before the store assigns identity
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewExecution {
    pub value: f64,
    pub description: Option<String>,
    pub reference_url: Option<String>,
    #[serde(default)]
    pub evidence: Vec<EvidenceImage>,
}

impl NewExecution {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn evidence(mut self, image: EvidenceImage) -> Self {
        self.evidence.push(image);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(ValidationError::InvalidExecutionValue(self.value));
        }
        if self.evidence.len() > MAX_EVIDENCE_IMAGES {
            return Err(ValidationError::TooManyEvidenceImages {
                count: self.evidence.len(),
                max: MAX_EVIDENCE_IMAGES,
            });
        }
        if let Some(bad) = self
            .evidence
            .iter()
            .find(|img| !img.mime_type.starts_with("image/"))
        {
            return Err(ValidationError::InvalidEvidenceType(bad.mime_type.clone()));
        }
        Ok(())
    }
}

/// Activity fields as entered for creation or edit
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub goal_code: GoalCode,
    pub name: String,
    pub description: String,
    pub responsible_unit: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub plan_year: i32,
    pub reserved_quota: f64,
}

impl ActivityDraft {
    /// Check the fields that do not depend on other activities.
    ///
    /// Quota bounds are checked separately against the goal's reservations.
    pub fn validate_fields(&self, horizon: &PlanHorizon) -> Result<(), ValidationError> {
        if self.goal_code.trim().is_empty() {
            return Err(ValidationError::MissingField("goal_code"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.responsible_unit.trim().is_empty() {
            return Err(ValidationError::MissingField("responsible_unit"));
        }
        if horizon.plan_year(self.plan_year).is_none() {
            return Err(ValidationError::YearOutsidePlan {
                year: self.plan_year,
                start: horizon.start_year,
                end: horizon.end_year(),
            });
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(ValidationError::InvalidDateRange { start, end });
            }
        }
        Ok(())
    }

    /// Turn the draft into an activity, keeping `id` when editing
    pub fn into_activity(self, id: Option<ActivityId>) -> Activity {
        Activity {
            id,
            goal_code: self.goal_code,
            name: self.name,
            description: self.description,
            responsible_unit: self.responsible_unit,
            start: self.start,
            end: self.end,
            status: ActivityStatus::Planned,
            plan_year: self.plan_year,
            reserved_quota: self.reserved_quota,
            executed_value: 0.0,
            executions: Vec::new(),
        }
    }
}

/// Goal to organizational-unit mapping held by the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub goal_code: GoalCode,
    /// Organizational unit (None = explicitly unassigned)
    pub unit: Option<String>,
}

impl Assignment {
    /// Marker the server uses for an explicit "no unit"
    pub const UNASSIGNED: &'static str = "unassigned";

    pub fn new(goal_code: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            goal_code: goal_code.into(),
            unit: Some(unit.into()),
        }
    }

    pub fn unassigned(goal_code: impl Into<String>) -> Self {
        Self {
            goal_code: goal_code.into(),
            unit: None,
        }
    }

    /// Unit name after normalizing blanks and the "unassigned" marker
    pub fn effective_unit(&self) -> Option<&str> {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty() && !u.eq_ignore_ascii_case(Self::UNASSIGNED))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Rejection of an activity or execution before it reaches a store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {0}")]
    MissingField(&'static str),

    #[error("Year {year} is outside the plan ({start}-{end})")]
    YearOutsidePlan { year: i32, start: i32, end: i32 },

    #[error("Goal not found: {0}")]
    UnknownGoal(GoalCode),

    #[error("End date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Reserved quota must be greater than zero, got {0}")]
    QuotaNotPositive(f64),

    #[error("Reserved quota {requested} exceeds available quota {available}")]
    QuotaExceeded { requested: f64, available: f64 },

    #[error("Executed value must be a non-negative number, got {0}")]
    InvalidExecutionValue(f64),

    #[error("Too many evidence images: {count} (max {max})")]
    TooManyEvidenceImages { count: usize, max: usize },

    #[error("Evidence must be an image, got '{0}'")]
    InvalidEvidenceType(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn y(n: u8) -> PlanYear {
        PlanYear::new(n).unwrap()
    }

    #[test]
    fn plan_year_bounds() {
        assert!(PlanYear::new(0).is_none());
        assert!(PlanYear::new(5).is_none());
        assert_eq!(y(3).index(), 2);
        assert_eq!(y(4).next(), None);
        assert_eq!(y(1).next(), Some(y(2)));
    }

    #[test]
    fn horizon_maps_calendar_years() {
        let horizon = PlanHorizon::new(2024);
        assert_eq!(horizon.calendar_year(y(1)), 2024);
        assert_eq!(horizon.calendar_year(y(4)), 2027);
        assert_eq!(horizon.plan_year(2026), Some(y(3)));
        assert_eq!(horizon.plan_year(2023), None);
        assert_eq!(horizon.plan_year(2028), None);
        assert_eq!(horizon.end_year(), 2027);
    }

    #[test]
    fn horizon_future_and_past() {
        let horizon = PlanHorizon::new(2024);
        assert!(horizon.is_future(y(3), 2025));
        assert!(!horizon.is_future(y(2), 2025));
        assert!(horizon.is_past(y(1), 2025));
        assert!(!horizon.is_past(y(2), 2025));
    }

    #[test]
    fn year_values_index_and_total() {
        let mut values = YearValues([1.0, 2.0, 0.0, 4.0]);
        assert_eq!(values[y(2)], 2.0);
        values[y(3)] = 3.0;
        assert_eq!(values.total(), 10.0);
        assert!(!values.is_all_zero());
        assert!(YearValues([0.0; 4]).is_all_zero());
    }

    #[test]
    fn year_values_from_fn() {
        let values = YearValues::from_fn(|year| year.ordinal() * 10);
        assert_eq!(values.0, [10, 20, 30, 40]);
    }

    #[test]
    fn sgr_period_split() {
        let resources = PeriodValues([dec!(100), dec!(60), dec!(40)]);
        assert_eq!(resources.total(), dec!(200));
        assert_eq!(resources.per_year_share(y(1)), dec!(50));
        assert_eq!(resources.per_year_share(y(2)), dec!(50));
        assert_eq!(resources.per_year_share(y(4)), dec!(30));
        assert_eq!(SgrPeriod::Third.horizon_years(), (5, 6));
    }

    #[test]
    fn goal_universe_membership() {
        let goal = ProductGoal::new("G").programmed(y(1), 10.0);
        assert!(!goal.in_universe());

        let goal = goal.budget(y(2), dec!(100));
        assert!(goal.in_universe());
        assert_eq!(goal.total_budget(), dec!(100));
    }

    #[test]
    fn reserved_quota_excludes_edited_activity() {
        let goal = ProductGoal::new("G")
            .activity(Activity::new("G", "a", 2025).id("a1").reserve(10.0))
            .activity(Activity::new("G", "b", 2025).id("a2").reserve(15.0))
            .activity(Activity::new("G", "c", 2026).id("a3").reserve(99.0));

        assert_eq!(goal.reserved_quota(2025, None), 25.0);
        assert_eq!(goal.reserved_quota(2025, Some("a2")), 10.0);
        assert_eq!(goal.reserved_quota(2026, Some("zz")), 99.0);
        assert_eq!(goal.reserved_quota(2027, None), 0.0);
    }

    #[test]
    fn executed_total_prefers_entries() {
        let stored_only = Activity::new("G", "a", 2025).executed(7.0);
        assert_eq!(stored_only.executed_total(ExecutionSource::Entries), 7.0);

        let with_entries = stored_only
            .clone()
            .with_execution(ExecutionEntry::new("a", 2.0))
            .with_execution(ExecutionEntry::new("a", 3.5));
        assert_eq!(with_entries.executed_total(ExecutionSource::Entries), 5.5);
        assert_eq!(with_entries.executed_total(ExecutionSource::Stored), 7.0);
    }

    #[test]
    fn compliance_state_codes_round_trip() {
        for state in ComplianceState::ALL {
            assert_eq!(ComplianceState::parse(state.as_str()), Some(state));
        }
        assert_eq!(
            ComplianceState::parse("en_progreso"),
            Some(ComplianceState::EnProgreso)
        );
        assert_eq!(ComplianceState::parse("done"), None);
    }

    #[test]
    fn compliance_state_serializes_as_code() {
        let json = serde_json::to_string(&ComplianceState::PorCumplir).unwrap();
        assert_eq!(json, "\"POR_CUMPLIR\"");
    }

    #[test]
    fn plan_year_rejects_out_of_range_json() {
        let ok: PlanYear = serde_json::from_str("2").unwrap();
        assert_eq!(ok, y(2));
        assert!(serde_json::from_str::<PlanYear>("7").is_err());
    }

    #[test]
    fn assignment_effective_unit() {
        assert_eq!(
            Assignment::new("G", " Secretaría de Salud ").effective_unit(),
            Some("Secretaría de Salud")
        );
        assert_eq!(Assignment::new("G", "UNASSIGNED").effective_unit(), None);
        assert_eq!(Assignment::new("G", "  ").effective_unit(), None);
        assert_eq!(Assignment::unassigned("G").effective_unit(), None);
    }

    #[test]
    fn draft_validation_required_fields() {
        let horizon = PlanHorizon::default();
        let mut draft = ActivityDraft {
            goal_code: "G".into(),
            name: "Obra".into(),
            responsible_unit: "Planeación".into(),
            plan_year: 2025,
            reserved_quota: 1.0,
            ..Default::default()
        };
        assert_eq!(draft.validate_fields(&horizon), Ok(()));

        draft.name = "  ".into();
        assert_eq!(
            draft.validate_fields(&horizon),
            Err(ValidationError::MissingField("name"))
        );
    }

    #[test]
    fn draft_validation_year_and_dates() {
        let horizon = PlanHorizon::default();
        let draft = ActivityDraft {
            goal_code: "G".into(),
            name: "Obra".into(),
            responsible_unit: "Planeación".into(),
            plan_year: 2030,
            ..Default::default()
        };
        assert!(matches!(
            draft.validate_fields(&horizon),
            Err(ValidationError::YearOutsidePlan { year: 2030, .. })
        ));

        let draft = ActivityDraft {
            plan_year: 2025,
            start: NaiveDate::from_ymd_opt(2025, 5, 1),
            end: NaiveDate::from_ymd_opt(2025, 4, 1),
            ..draft
        };
        assert!(matches!(
            draft.validate_fields(&horizon),
            Err(ValidationError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn execution_validation() {
        assert!(NewExecution::new(3.0).validate().is_ok());
        assert_eq!(
            NewExecution::new(-1.0).validate(),
            Err(ValidationError::InvalidExecutionValue(-1.0))
        );

        let image = EvidenceImage {
            name: "foto.jpg".into(),
            mime_type: "image/jpeg".into(),
            size_bytes: 1024,
            content: String::new(),
        };
        let mut report = NewExecution::new(1.0);
        for _ in 0..5 {
            report = report.evidence(image.clone());
        }
        assert_eq!(
            report.validate(),
            Err(ValidationError::TooManyEvidenceImages { count: 5, max: 4 })
        );

        let pdf = EvidenceImage {
            mime_type: "application/pdf".into(),
            ..image
        };
        assert_eq!(
            NewExecution::new(1.0).evidence(pdf).validate(),
            Err(ValidationError::InvalidEvidenceType("application/pdf".into()))
        );
    }

    #[test]
    fn model_lookup_and_codes() {
        let mut model = PlanModel::default();
        model.goals.push(ProductGoal::new("A"));
        model.goals.push(ProductGoal::new(""));
        model.goals.push(ProductGoal::new("B").budget(y(1), dec!(5)));

        assert!(model.goal("B").is_some());
        assert!(model.goal("C").is_none());
        assert_eq!(model.goal_codes(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(model.universe().count(), 1);
    }
}

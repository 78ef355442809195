//! Analysis Snapshot types
//!
//! An `AnalysisSnapshot` is the fully-derived aggregate view of a `PlanModel`:
//! overall indicators, per-year/sector/line/ODS breakdowns, royalty (SGR) and
//! budget-source summaries, plus rule-based trends, recommendations, alerts and
//! data inconsistencies. It is produced by the aggregation engine and carries no
//! lifecycle of its own.
//!
//! # Example
//!
//! ```rust
//! use devplan_core::snapshot::{HealthIndicator, OverallIndicators};
//!
//! let overall = OverallIndicators {
//!     universe_goals: 40,
//!     compliant_goals: 30,
//!     compliance_rate: 75.0,
//!     ..Default::default()
//! };
//!
//! assert_eq!(overall.health(), HealthIndicator::OnTrack);
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::PlanYear;

// ============================================================================
// Health Classification
// ============================================================================

/// Overall health classification of a compliance rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthIndicator {
    /// Compliance rate >= 70
    OnTrack,
    /// 40 <= compliance rate < 70
    AtRisk,
    /// Compliance rate < 40
    Behind,
}

impl HealthIndicator {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 70.0 {
            HealthIndicator::OnTrack
        } else if rate >= 40.0 {
            HealthIndicator::AtRisk
        } else {
            HealthIndicator::Behind
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthIndicator::OnTrack => "On Track",
            HealthIndicator::AtRisk => "At Risk",
            HealthIndicator::Behind => "Behind",
        }
    }
}

impl std::fmt::Display for HealthIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Aggregate analytics over the whole plan
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    /// Calendar year the states were derived against
    pub current_year: i32,
    pub overall: OverallIndicators,
    pub by_year: Vec<YearBreakdown>,
    pub by_sector: Vec<GroupBreakdown>,
    pub by_line: Vec<GroupBreakdown>,
    pub by_ods: Vec<GroupBreakdown>,
    pub sgr: SgrSummary,
    pub indicators: IndicatorAlignment,
    pub budget_sources: BudgetSourceSummary,
    pub trends: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub alerts: Vec<Alert>,
    pub inconsistencies: Vec<Inconsistency>,
}

impl AnalysisSnapshot {
    /// Look up a sector breakdown by sector name
    pub fn sector(&self, name: &str) -> Option<&GroupBreakdown> {
        self.by_sector.iter().find(|g| g.name == name)
    }

    pub fn year(&self, year: PlanYear) -> Option<&YearBreakdown> {
        self.by_year.iter().find(|y| y.plan_year == year)
    }

    pub fn inconsistency(&self, kind: InconsistencyKind) -> Option<&Inconsistency> {
        self.inconsistencies.iter().find(|i| i.kind == kind)
    }
}

/// Headline figures
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallIndicators {
    /// All goals, including budget-exempt ones
    pub total_goals: usize,
    /// Goals with nonzero four-year budget
    pub universe_goals: usize,
    /// Goals outside the compliance universe
    pub excluded_goals: usize,
    pub compliant_goals: usize,
    pub in_progress_goals: usize,
    pub pending_goals: usize,
    pub upcoming_goals: usize,
    pub undefined_goals: usize,
    /// compliant / universe * 100
    pub compliance_rate: f64,
    /// Mean overall progress over the universe
    pub average_progress: f64,
    /// Budget of every goal
    pub total_budget: Decimal,
    /// Budget of universe goals only
    pub universe_budget: Decimal,
    pub assigned_goals: usize,
    pub unassigned_goals: usize,
    pub total_activities: usize,
}

impl OverallIndicators {
    pub fn health(&self) -> HealthIndicator {
        HealthIndicator::from_rate(self.compliance_rate)
    }
}

/// Per plan-year figures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YearBreakdown {
    pub plan_year: PlanYear,
    pub calendar_year: i32,
    /// Goals with nonzero budget in this year
    pub budgeted_goals: usize,
    /// Budgeted goals whose state for this year is CUMPLIDA
    pub compliant_goals: usize,
    pub compliance_rate: f64,
    /// Budget of every goal for this year (not restricted to the universe)
    pub budget: Decimal,
}

/// Figures for one sector, strategic line, or ODS code
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupBreakdown {
    /// Grouping key (sector code, line name, ODS code)
    pub key: String,
    /// Display name
    pub name: String,
    pub total_goals: usize,
    /// Goals whose overall state is CUMPLIDA
    pub compliant_goals: usize,
    pub compliance_rate: f64,
    pub average_progress: f64,
    pub budget: Decimal,
}

/// Royalty-funded initiatives summary
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SgrSummary {
    pub initiative_count: usize,
    pub product_goal_count: usize,
    pub total_resources: Decimal,
    /// Resources per sector, descending by amount
    pub by_sector: Vec<AmountBySector>,
    pub with_bpin: usize,
    pub without_bpin: usize,
    pub cofinanced: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountBySector {
    pub sector: String,
    pub amount: Decimal,
}

/// National-plan alignment of result indicators
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorAlignment {
    pub total: usize,
    pub aligned: usize,
    pub aligned_pct: f64,
    pub by_line: Vec<LineAlignment>,
    /// Transformation label frequencies, descending by count
    pub transformations: Vec<LabelCount>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineAlignment {
    pub line: String,
    pub total: usize,
    pub aligned: usize,
    pub aligned_pct: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Ordinary budget versus royalty resources
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetSourceSummary {
    pub ordinary_total: Decimal,
    pub sgr_total: Decimal,
    pub ordinary_pct: f64,
    pub sgr_pct: f64,
    pub by_year: Vec<SourceSplit>,
    pub by_sector: Vec<SourceSplit>,
}

/// Ordinary/SGR split for one year or sector
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSplit {
    /// Calendar year or sector name
    pub label: String,
    pub ordinary: Decimal,
    pub sgr: Decimal,
}

// ============================================================================
// Narrative
// ============================================================================

/// Recommendation rule that fired
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationRule {
    /// Overall compliance below 50%
    RecOverallLow,
    /// A sector below 40%
    RecSectorLow,
    /// A strategic line below 30%
    RecLineLow,
    /// A sector at or above 70%
    RecSectorStrong,
}

impl RecommendationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationRule::RecOverallLow => "REC_OVERALL_LOW",
            RecommendationRule::RecSectorLow => "REC_SECTOR_LOW",
            RecommendationRule::RecLineLow => "REC_LINE_LOW",
            RecommendationRule::RecSectorStrong => "REC_SECTOR_STRONG",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub rule: RecommendationRule,
    /// Sector or line the rule fired for
    pub subject: Option<String>,
    pub message: String,
}

/// Alert rule that fired
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertRule {
    /// A sector below 25%
    AlertSectorCritical,
    /// A past plan year closed below 50%
    AlertYearClosedLow,
}

impl AlertRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertRule::AlertSectorCritical => "ALERT_SECTOR_CRITICAL",
            AlertRule::AlertYearClosedLow => "ALERT_YEAR_CLOSED_LOW",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Critical,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub rule: AlertRule,
    pub level: AlertLevel,
    pub subject: String,
    pub message: String,
}

// ============================================================================
// Inconsistencies
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconsistencyKind {
    MissingSector,
    MissingLine,
    /// Programmed target is zero in every year
    ZeroProgramming,
    /// Some year is programmed but no year has budget
    ProgrammedWithoutBudget,
}

impl InconsistencyKind {
    pub const ALL: [InconsistencyKind; 4] = [
        InconsistencyKind::MissingSector,
        InconsistencyKind::MissingLine,
        InconsistencyKind::ZeroProgramming,
        InconsistencyKind::ProgrammedWithoutBudget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InconsistencyKind::MissingSector => "MISSING_SECTOR",
            InconsistencyKind::MissingLine => "MISSING_LINE",
            InconsistencyKind::ZeroProgramming => "ZERO_PROGRAMMING",
            InconsistencyKind::ProgrammedWithoutBudget => "PROGRAMMED_WITHOUT_BUDGET",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            InconsistencyKind::MissingSector => "Goals without a sector",
            InconsistencyKind::MissingLine => "Goals without a strategic line",
            InconsistencyKind::ZeroProgramming => "Goals with no programmed target in any year",
            InconsistencyKind::ProgrammedWithoutBudget => "Goals programmed but never budgeted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub count: usize,
    pub goal_codes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_thresholds() {
        assert_eq!(HealthIndicator::from_rate(70.0), HealthIndicator::OnTrack);
        assert_eq!(HealthIndicator::from_rate(69.9), HealthIndicator::AtRisk);
        assert_eq!(HealthIndicator::from_rate(40.0), HealthIndicator::AtRisk);
        assert_eq!(HealthIndicator::from_rate(39.9), HealthIndicator::Behind);
    }

    #[test]
    fn rule_codes_are_stable() {
        assert_eq!(RecommendationRule::RecLineLow.as_str(), "REC_LINE_LOW");
        assert_eq!(
            AlertRule::AlertYearClosedLow.as_str(),
            "ALERT_YEAR_CLOSED_LOW"
        );
        assert_eq!(
            InconsistencyKind::ProgrammedWithoutBudget.as_str(),
            "PROGRAMMED_WITHOUT_BUDGET"
        );
    }

    #[test]
    fn rule_serializes_as_code() {
        let json = serde_json::to_string(&RecommendationRule::RecSectorStrong).unwrap();
        assert_eq!(json, "\"REC_SECTOR_STRONG\"");
        let json = serde_json::to_string(&AlertRule::AlertSectorCritical).unwrap();
        assert_eq!(json, "\"ALERT_SECTOR_CRITICAL\"");
    }
}

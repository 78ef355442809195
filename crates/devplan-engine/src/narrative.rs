//! Rule-based trends, recommendations and alerts
//!
//! Thresholds are fixed contracts:
//!
//! | Rule                     | Fires when                                         |
//! |--------------------------|----------------------------------------------------|
//! | `REC_OVERALL_LOW`        | overall compliance rate < 50                       |
//! | `REC_SECTOR_LOW`         | a sector's rate < 40                               |
//! | `REC_LINE_LOW`           | a strategic line's rate < 30                       |
//! | `REC_SECTOR_STRONG`      | a sector's rate >= 70                              |
//! | `ALERT_SECTOR_CRITICAL`  | a sector's rate < 25                               |
//! | `ALERT_YEAR_CLOSED_LOW`  | a past plan year with budgeted goals closed < 50   |

use devplan_core::snapshot::{
    Alert, AlertLevel, AlertRule, AnalysisSnapshot, Recommendation, RecommendationRule,
};

pub const OVERALL_LOW_THRESHOLD: f64 = 50.0;
pub const SECTOR_LOW_THRESHOLD: f64 = 40.0;
pub const LINE_LOW_THRESHOLD: f64 = 30.0;
pub const SECTOR_STRONG_THRESHOLD: f64 = 70.0;
pub const SECTOR_CRITICAL_THRESHOLD: f64 = 25.0;
pub const YEAR_CLOSED_LOW_THRESHOLD: f64 = 50.0;

/// Rate changes smaller than this many points read as "held steady"
pub const STEADY_MARGIN: f64 = 0.5;

/// Year-over-year statements, then best and worst sector
pub fn trends(snapshot: &AnalysisSnapshot) -> Vec<String> {
    let mut statements = Vec::new();

    for pair in snapshot.by_year.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.budgeted_goals == 0 || next.budgeted_goals == 0 {
            continue;
        }
        let delta = next.compliance_rate - prev.compliance_rate;
        let statement = if delta.abs() < STEADY_MARGIN {
            format!(
                "Compliance held steady between {} and {} at {:.1}%",
                prev.calendar_year, next.calendar_year, next.compliance_rate
            )
        } else if delta > 0.0 {
            format!(
                "Compliance improved from {:.1}% in {} to {:.1}% in {}",
                prev.compliance_rate, prev.calendar_year, next.compliance_rate, next.calendar_year
            )
        } else {
            format!(
                "Compliance declined from {:.1}% in {} to {:.1}% in {}",
                prev.compliance_rate, prev.calendar_year, next.compliance_rate, next.calendar_year
            )
        };
        statements.push(statement);
    }

    // by_sector is ordered by rate, best first
    if let Some(best) = snapshot.by_sector.first() {
        statements.push(format!(
            "Best-performing sector: {} ({:.1}%)",
            best.name, best.compliance_rate
        ));
    }
    if snapshot.by_sector.len() >= 2 {
        if let Some(worst) = snapshot.by_sector.last() {
            statements.push(format!(
                "Lowest-performing sector: {} ({:.1}%)",
                worst.name, worst.compliance_rate
            ));
        }
    }

    statements
}

pub fn recommendations(snapshot: &AnalysisSnapshot) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if snapshot.overall.universe_goals > 0
        && snapshot.overall.compliance_rate < OVERALL_LOW_THRESHOLD
    {
        recs.push(Recommendation {
            rule: RecommendationRule::RecOverallLow,
            subject: None,
            message: format!(
                "Overall compliance is {:.1}%; prioritize goals with pending activities",
                snapshot.overall.compliance_rate
            ),
        });
    }

    for sector in &snapshot.by_sector {
        if sector.compliance_rate < SECTOR_LOW_THRESHOLD {
            recs.push(Recommendation {
                rule: RecommendationRule::RecSectorLow,
                subject: Some(sector.name.clone()),
                message: format!(
                    "Sector {} is at {:.1}%; review its activity plan and resource allocation",
                    sector.name, sector.compliance_rate
                ),
            });
        }
    }

    for line in &snapshot.by_line {
        if line.compliance_rate < LINE_LOW_THRESHOLD {
            recs.push(Recommendation {
                rule: RecommendationRule::RecLineLow,
                subject: Some(line.name.clone()),
                message: format!(
                    "Strategic line {} is at {:.1}%; reinforce follow-up of its goals",
                    line.name, line.compliance_rate
                ),
            });
        }
    }

    for sector in &snapshot.by_sector {
        if sector.compliance_rate >= SECTOR_STRONG_THRESHOLD {
            recs.push(Recommendation {
                rule: RecommendationRule::RecSectorStrong,
                subject: Some(sector.name.clone()),
                message: format!(
                    "Sector {} is at {:.1}%; document its practices for other sectors",
                    sector.name, sector.compliance_rate
                ),
            });
        }
    }

    recs
}

pub fn alerts(snapshot: &AnalysisSnapshot) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for sector in &snapshot.by_sector {
        if sector.compliance_rate < SECTOR_CRITICAL_THRESHOLD {
            alerts.push(Alert {
                rule: AlertRule::AlertSectorCritical,
                level: AlertLevel::Critical,
                subject: sector.name.clone(),
                message: format!(
                    "Sector {} has critical compliance: {:.1}%",
                    sector.name, sector.compliance_rate
                ),
            });
        }
    }

    for year in &snapshot.by_year {
        if year.calendar_year < snapshot.current_year
            && year.budgeted_goals > 0
            && year.compliance_rate < YEAR_CLOSED_LOW_THRESHOLD
        {
            alerts.push(Alert {
                rule: AlertRule::AlertYearClosedLow,
                level: AlertLevel::Warning,
                subject: year.calendar_year.to_string(),
                message: format!(
                    "{} closed with {:.1}% compliance ({} of {} budgeted goals met)",
                    year.calendar_year,
                    year.compliance_rate,
                    year.compliant_goals,
                    year.budgeted_goals
                ),
            });
        }
    }

    alerts
}

//! Goal list filtering for presentation consumers

use devplan_core::{ComplianceState, PlanYear, ProductGoal};
use serde::{Deserialize, Serialize};

/// Assigned-unit criterion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitFilter {
    /// Goals without an assigned unit
    Unassigned,
    /// Goals assigned to this unit (case-insensitive)
    Unit(String),
}

/// Conjunction of optional criteria; an empty filter keeps every goal
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalFilter {
    /// Sector name or code
    pub sector: Option<String>,
    /// Strategic line name
    pub line: Option<String>,
    pub ods: Option<String>,
    pub unit: Option<UnitFilter>,
    /// Year state when `year` is set, overall state otherwise
    pub state: Option<ComplianceState>,
    /// Goals with a non-zero programmed target in this year
    pub year: Option<PlanYear>,
    /// Case-insensitive text over code, product and indicator name
    pub search: Option<String>,
}

impl GoalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.line = Some(line.into());
        self
    }

    pub fn ods(mut self, ods: impl Into<String>) -> Self {
        self.ods = Some(ods.into());
        self
    }

    pub fn unit(mut self, unit: UnitFilter) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn state(mut self, state: ComplianceState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn year(mut self, year: PlanYear) -> Self {
        self.year = Some(year);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, goal: &ProductGoal) -> bool {
        if let Some(sector) = &self.sector {
            if !same(&goal.sector, sector) && !same(&goal.sector_code, sector) {
                return false;
            }
        }
        if let Some(line) = &self.line {
            if !same(&goal.line, line) {
                return false;
            }
        }
        if let Some(ods) = &self.ods {
            if !same(&goal.ods_code, ods) {
                return false;
            }
        }
        if let Some(unit) = &self.unit {
            let ok = match (unit, goal.assigned_unit.as_deref()) {
                (UnitFilter::Unassigned, assigned) => assigned.is_none(),
                (UnitFilter::Unit(wanted), Some(assigned)) => same(assigned, wanted),
                (UnitFilter::Unit(_), None) => false,
            };
            if !ok {
                return false;
            }
        }
        if let Some(year) = self.year {
            if goal.programmed[year] <= 0.0 {
                return false;
            }
        }
        if let Some(state) = self.state {
            let actual = match self.year {
                Some(year) => goal.states[year],
                None => goal.overall_state,
            };
            if actual != state {
                return false;
            }
        }
        if let Some(text) = &self.search {
            let needle = text.trim().to_lowercase();
            if !needle.is_empty()
                && ![&goal.code, &goal.product, &goal.indicator_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }

    /// Goals that satisfy every criterion, in plan order
    pub fn apply<'a>(&self, goals: &'a [ProductGoal]) -> Vec<&'a ProductGoal> {
        goals.iter().filter(|g| self.matches(g)).collect()
    }
}

fn same(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

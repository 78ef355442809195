//! Remote store interfaces
//!
//! Assignments, activities and executions live in independently updated
//! server-side stores. The traits here are the seams the synchronizer talks
//! through, so any backend (HTTP, in-memory) can be injected.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use devplan_core::{Activity, ActivityId, Assignment, ExecutionEntry, GoalCode, NewExecution};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Maximum goal codes per bulk activity request
pub const MAX_BULK_CODES: usize = 100;

/// Goal to organizational-unit mappings
#[async_trait::async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Every assignment of the plan instance
    async fn list_assignments(&self) -> Result<Vec<Assignment>>;

    async fn put_assignment(&self, assignment: &Assignment) -> Result<()>;
}

/// Activities planned against goals
#[async_trait::async_trait]
pub trait ActivityStore: Send + Sync {
    async fn activities_for_goal(&self, code: &str) -> Result<Vec<Activity>>;

    /// Activities for up to [`MAX_BULK_CODES`] goals in one request
    async fn activities_bulk(
        &self,
        codes: &[GoalCode],
    ) -> Result<HashMap<GoalCode, Vec<Activity>>>;

    /// Persist a new activity; the returned copy carries its id
    async fn create_activity(&self, activity: &Activity) -> Result<Activity>;

    async fn update_activity(&self, activity: &Activity) -> Result<Activity>;

    async fn delete_activity(&self, id: &str) -> Result<()>;
}

/// Execution entries reported against activities
#[async_trait::async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn record_execution(
        &self,
        activity_id: &str,
        execution: &NewExecution,
    ) -> Result<ExecutionEntry>;

    async fn executions(&self, activity_id: &str) -> Result<ExecutionLog>;
}

/// Execution entries of one activity with their running total
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub entries: Vec<ExecutionEntry>,
    pub total: f64,
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    assignments: Vec<Assignment>,
    activities: Vec<Activity>,
    executions: Vec<ExecutionEntry>,
    next_id: u64,
}

impl MemoryState {
    fn issue_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// Store held entirely in memory, for offline use and tests
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    state: Mutex<MemoryState>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an assignment (builder pattern)
    pub fn with_assignment(self, assignment: Assignment) -> Self {
        self.lock().assignments.push(assignment);
        self
    }

    /// Seed an activity; activities without an id get one
    pub fn with_activity(self, mut activity: Activity) -> Self {
        {
            let mut state = self.lock();
            if activity.id.is_none() {
                activity.id = Some(state.issue_id("act"));
            }
            state.activities.push(activity);
        }
        self
    }

    pub fn activity_count(&self) -> usize {
        self.lock().activities.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl AssignmentStore for MemoryPlanStore {
    async fn list_assignments(&self) -> Result<Vec<Assignment>> {
        Ok(self.lock().assignments.clone())
    }

    async fn put_assignment(&self, assignment: &Assignment) -> Result<()> {
        let mut state = self.lock();
        state
            .assignments
            .retain(|a| a.goal_code != assignment.goal_code);
        state.assignments.push(assignment.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl ActivityStore for MemoryPlanStore {
    async fn activities_for_goal(&self, code: &str) -> Result<Vec<Activity>> {
        Ok(self
            .lock()
            .activities
            .iter()
            .filter(|a| a.goal_code == code)
            .cloned()
            .collect())
    }

    async fn activities_bulk(
        &self,
        codes: &[GoalCode],
    ) -> Result<HashMap<GoalCode, Vec<Activity>>> {
        let state = self.lock();
        Ok(codes
            .iter()
            .map(|code| {
                let list = state
                    .activities
                    .iter()
                    .filter(|a| &a.goal_code == code)
                    .cloned()
                    .collect();
                (code.clone(), list)
            })
            .collect())
    }

    async fn create_activity(&self, activity: &Activity) -> Result<Activity> {
        let mut state = self.lock();
        let mut created = activity.clone();
        created.id = Some(state.issue_id("act"));
        state.activities.push(created.clone());
        Ok(created)
    }

    async fn update_activity(&self, activity: &Activity) -> Result<Activity> {
        let mut state = self.lock();
        let id = activity.id.clone().unwrap_or_default();
        let slot = state
            .activities
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(id.as_str()))
            .ok_or_else(|| StoreError::NotFound(format!("activity {}", id)))?;
        *slot = activity.clone();
        Ok(activity.clone())
    }

    async fn delete_activity(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let before = state.activities.len();
        state.activities.retain(|a| a.id.as_deref() != Some(id));
        if state.activities.len() == before {
            return Err(StoreError::NotFound(format!("activity {}", id)));
        }
        state.executions.retain(|e| e.activity_id != id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ExecutionStore for MemoryPlanStore {
    async fn record_execution(
        &self,
        activity_id: &str,
        execution: &NewExecution,
    ) -> Result<ExecutionEntry> {
        let mut state = self.lock();
        let Some(activity) = state
            .activities
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(activity_id))
        else {
            return Err(StoreError::NotFound(format!("activity {}", activity_id)));
        };
        // stored running total moves with every entry
        activity.executed_value += execution.value;
        let entry = ExecutionEntry {
            id: Some(state.issue_id("exec")),
            activity_id: ActivityId::from(activity_id),
            value: execution.value,
            description: execution.description.clone(),
            reference_url: execution.reference_url.clone(),
            evidence: execution.evidence.clone(),
            reported_at: Some(chrono::Utc::now()),
        };
        state.executions.push(entry.clone());
        Ok(entry)
    }

    /// The total is the activity's stored running total, which also counts
    /// work reported before any entry was recorded.
    async fn executions(&self, activity_id: &str) -> Result<ExecutionLog> {
        let state = self.lock();
        let entries: Vec<ExecutionEntry> = state
            .executions
            .iter()
            .filter(|e| e.activity_id == activity_id)
            .cloned()
            .collect();
        let total = state
            .activities
            .iter()
            .find(|a| a.id.as_deref() == Some(activity_id))
            .map(|a| a.executed_value)
            .unwrap_or_else(|| entries.iter().map(|e| e.value).sum());
        Ok(ExecutionLog { entries, total })
    }
}

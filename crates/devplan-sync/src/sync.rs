//! Synchronization orchestration
//!
//! `Synchronizer` pulls assignments and activities from the remote stores,
//! merges them into a `PlanEngine`'s model, re-derives states and keeps the
//! local snapshot current. Writes go through the same type so they are
//! validated before any store is contacted.

use chrono::{DateTime, Utc};
use devplan_core::{
    Activity, ActivityDraft, Assignment, CollectingEmitter, Diagnostic, ExecutionEntry,
    NewExecution, PlanModel, ValidationError,
};
use devplan_engine::PlanEngine;

use crate::bulk::fetch_activities_bulk;
use crate::cache::{CacheLoad, SnapshotCache};
use crate::error::{Result, StoreError};
use crate::merge::{merge_activities, merge_assignments};
use crate::store::{ActivityStore, AssignmentStore, ExecutionLog, ExecutionStore, MAX_BULK_CODES};

/// Slack when comparing summed entries with a running total
const TOTAL_TOLERANCE: f64 = 1e-9;

/// What a sync pass did
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Assignment records that matched a goal
    pub assignments: usize,
    /// Activities placed on goals
    pub activities: usize,
    pub failed_batches: usize,
    pub diagnostics: Vec<Diagnostic>,
    /// Whether the snapshot was written
    pub cached: bool,
}

impl SyncReport {
    pub fn is_partial(&self) -> bool {
        self.failed_batches > 0
    }
}

/// Result of restoring from the local snapshot
#[derive(Debug)]
pub struct Restore {
    /// Engine rebuilt from a fresh snapshot
    pub engine: Option<PlanEngine>,
    /// Why the snapshot was not used, when it existed but was discarded
    pub diagnostic: Option<Diagnostic>,
}

/// Remote stores plus optional local snapshot
pub struct Synchronizer<S> {
    store: S,
    cache: Option<SnapshotCache>,
    batch_size: usize,
}

impl<S> Synchronizer<S>
where
    S: AssignmentStore + ActivityStore + ExecutionStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: None,
            batch_size: MAX_BULK_CODES,
        }
    }

    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Goal codes per bulk request (clamped to 1..=100)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> Option<&SnapshotCache> {
        self.cache.as_ref()
    }

    // ========================================================================
    // Pull
    // ========================================================================

    /// Fetch assignments and activities, merge, re-derive and cache.
    ///
    /// A failing assignment fetch aborts the pass before the model is touched.
    /// Failing activity batches only degrade the result.
    pub async fn sync(&self, engine: &mut PlanEngine) -> Result<SyncReport> {
        let assignments = self.store.list_assignments().await?;
        let codes = engine.model().goal_codes();
        let fetch = fetch_activities_bulk(&self.store, &codes, self.batch_size).await;

        let mut emitter = CollectingEmitter::new();
        let model = engine.model_mut();
        let assigned = merge_assignments(model, &assignments, &mut emitter);
        let placed = merge_activities(model, &fetch.activities, &mut emitter);
        engine.refresh();

        let mut diagnostics = emitter.into_inner();
        diagnostics.extend(fetch.diagnostics());

        let report = SyncReport {
            assignments: assigned,
            activities: placed,
            failed_batches: fetch.failed.len(),
            diagnostics,
            cached: self.save(engine.model()),
        };
        tracing::info!(
            assignments = report.assignments,
            activities = report.activities,
            failed_batches = report.failed_batches,
            "sync complete"
        );
        Ok(report)
    }

    /// Rebuild an engine from the snapshot, re-deriving against `current_year`
    pub fn restore(&self, now: DateTime<Utc>, current_year: i32) -> Restore {
        let Some(cache) = &self.cache else {
            return Restore {
                engine: None,
                diagnostic: None,
            };
        };
        let load = cache.load(now);
        let diagnostic = load.diagnostic();
        let engine = match load {
            CacheLoad::Fresh(snapshot) => Some(PlanEngine::new(snapshot.model, current_year)),
            _ => None,
        };
        Restore { engine, diagnostic }
    }

    fn save(&self, model: &PlanModel) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match cache.save(model, Utc::now()) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    path = %cache.path().display(),
                    error = %err,
                    "snapshot not cached"
                );
                false
            }
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Set or clear the unit of a goal
    pub async fn assign(&self, engine: &mut PlanEngine, assignment: Assignment) -> Result<()> {
        if engine.model().goal(&assignment.goal_code).is_none() {
            return Err(ValidationError::UnknownGoal(assignment.goal_code).into());
        }
        self.store.put_assignment(&assignment).await?;

        let mut emitter = CollectingEmitter::new();
        merge_assignments(engine.model_mut(), &[assignment], &mut emitter);
        engine.refresh();
        Ok(())
    }

    /// Validate, persist and attach a new activity
    pub async fn create_activity(
        &self,
        engine: &mut PlanEngine,
        draft: ActivityDraft,
    ) -> Result<Activity> {
        engine.validate_draft(&draft, None)?;
        let created = self
            .store
            .create_activity(&draft.into_activity(None))
            .await?;

        attach(engine.model_mut(), created.clone())?;
        engine.refresh();
        Ok(created)
    }

    /// Validate and persist an edit, keeping the activity's execution record
    pub async fn update_activity(
        &self,
        engine: &mut PlanEngine,
        id: &str,
        draft: ActivityDraft,
    ) -> Result<Activity> {
        engine.validate_draft(&draft, Some(id))?;
        let existing = find_activity(engine.model(), id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("activity {}", id)))?;

        let mut edited = draft.into_activity(Some(id.to_string()));
        edited.status = existing.status;
        edited.executed_value = existing.executed_value;
        edited.executions = existing.executions;

        let updated = self.store.update_activity(&edited).await?;
        detach(engine.model_mut(), id);
        attach(engine.model_mut(), updated.clone())?;
        engine.refresh();
        Ok(updated)
    }

    pub async fn delete_activity(&self, engine: &mut PlanEngine, id: &str) -> Result<()> {
        self.store.delete_activity(id).await?;
        detach(engine.model_mut(), id);
        engine.refresh();
        Ok(())
    }

    /// Validate and report executed work against an activity
    pub async fn record_execution(
        &self,
        engine: &mut PlanEngine,
        activity_id: &str,
        execution: NewExecution,
    ) -> Result<ExecutionEntry> {
        execution.validate()?;
        if find_activity(engine.model(), activity_id).is_none() {
            return Err(StoreError::NotFound(format!("activity {}", activity_id)));
        }
        let entry = self.store.record_execution(activity_id, &execution).await?;

        let log = match self.store.executions(activity_id).await {
            Ok(log) => Some(log),
            Err(err) => {
                tracing::warn!(activity = activity_id, error = %err, "execution log reload failed");
                None
            }
        };
        if let Some(activity) = find_activity_mut(engine.model_mut(), activity_id) {
            let log = log.unwrap_or_else(|| {
                let itemized: f64 = activity.executions.iter().map(|e| e.value).sum();
                let mut entries = std::mem::take(&mut activity.executions);
                entries.push(entry.clone());
                ExecutionLog {
                    entries,
                    total: activity.executed_value.max(itemized) + entry.value,
                }
            });
            apply_log(activity, log);
        }
        engine.refresh();
        Ok(entry)
    }
}

/// Set an activity's running total from its log.
///
/// Entries are kept only while they account for the whole total, so work
/// reported before the first entry is never dropped from the executed value.
fn apply_log(activity: &mut Activity, log: ExecutionLog) {
    let itemized: f64 = log.entries.iter().map(|e| e.value).sum();
    activity.executed_value = log.total.max(itemized);
    activity.executions = if itemized + TOTAL_TOLERANCE >= activity.executed_value {
        log.entries
    } else {
        Vec::new()
    };
}

fn find_activity<'a>(model: &'a PlanModel, id: &str) -> Option<&'a Activity> {
    model
        .goals
        .iter()
        .flat_map(|g| g.activities.iter())
        .find(|a| a.id.as_deref() == Some(id))
}

fn find_activity_mut<'a>(model: &'a mut PlanModel, id: &str) -> Option<&'a mut Activity> {
    model
        .goals
        .iter_mut()
        .flat_map(|g| g.activities.iter_mut())
        .find(|a| a.id.as_deref() == Some(id))
}

fn attach(model: &mut PlanModel, activity: Activity) -> Result<()> {
    let goal = model
        .goal_mut(&activity.goal_code)
        .ok_or_else(|| ValidationError::UnknownGoal(activity.goal_code.clone()))?;
    goal.activities.push(activity);
    Ok(())
}

fn detach(model: &mut PlanModel, id: &str) {
    for goal in &mut model.goals {
        goal.activities.retain(|a| a.id.as_deref() != Some(id));
    }
}

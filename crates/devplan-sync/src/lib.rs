//! # devplan-sync
//!
//! Synchronization of remotely held plan data and a versioned local snapshot.
//!
//! This crate provides:
//! - Store interfaces for assignments, activities and executions ([`store`])
//! - Batched, partial-failure tolerant bulk activity retrieval ([`bulk`])
//! - Merging remote records into the plan model ([`merge`])
//! - A versioned, expiring snapshot cache ([`cache`])
//! - A REST adapter implementing every store ([`client`])
//! - [`Synchronizer`], which ties stores, cache and engine together
//!
//! ## Example
//!
//! ```rust
//! use devplan_core::{Activity, Assignment, PlanHorizon, PlanModel, PlanYear, ProductGoal};
//! use devplan_engine::PlanEngine;
//! use devplan_sync::{MemoryPlanStore, Synchronizer};
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> Result<(), devplan_sync::StoreError> {
//! let year1 = PlanYear::new(1).unwrap();
//! let mut model = PlanModel::new(PlanHorizon::new(2024));
//! model.goals.push(
//!     ProductGoal::new("MP-001")
//!         .programmed(year1, 10.0)
//!         .budget(year1, Decimal::ONE),
//! );
//! let mut engine = PlanEngine::new(model, 2025);
//!
//! let store = MemoryPlanStore::new()
//!     .with_assignment(Assignment::new("MP-001", "Secretaría de Salud"))
//!     .with_activity(Activity::new("MP-001", "Jornada", 2024).executed(10.0));
//! let report = Synchronizer::new(store).sync(&mut engine).await?;
//!
//! assert_eq!(report.activities, 1);
//! assert_eq!(engine.snapshot().overall.compliant_goals, 1);
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod cache;
pub mod client;
pub mod error;
pub mod merge;
pub mod store;
pub mod sync;

pub use bulk::{chunk_codes, fetch_activities_bulk, BulkFetch, FailedBatch};
pub use cache::{CacheLoad, CachedSnapshot, SnapshotCache, CACHE_VERSION, DEFAULT_MAX_AGE_DAYS};
pub use client::{ClientConfig, HttpPlanStore};
pub use error::{CacheError, StoreError};
pub use store::{
    ActivityStore, AssignmentStore, ExecutionLog, ExecutionStore, MemoryPlanStore, MAX_BULK_CODES,
};
pub use sync::{Restore, SyncReport, Synchronizer};

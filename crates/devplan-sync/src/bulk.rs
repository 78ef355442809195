//! Batched bulk activity retrieval
//!
//! Goal codes are split into chunks of at most [`MAX_BULK_CODES`], every chunk
//! is requested concurrently, and the results are merged by goal code. A chunk
//! that fails contributes empty lists for its codes and is recorded in
//! [`BulkFetch::failed`]; it never aborts the retrieval.

use std::collections::{BTreeMap, HashMap, HashSet};

use devplan_core::{Activity, Diagnostic, DiagnosticCode, GoalCode};
use futures::future::join_all;

use crate::error::StoreError;
use crate::store::{ActivityStore, MAX_BULK_CODES};

/// A chunk whose request did not return data
#[derive(Debug)]
pub struct FailedBatch {
    /// Position of the chunk in request order
    pub index: usize,
    pub codes: Vec<GoalCode>,
    pub error: StoreError,
}

/// Merged result of a bulk retrieval
#[derive(Debug, Default)]
pub struct BulkFetch {
    /// Every requested code, empty when its batch failed or it has no activities
    pub activities: BTreeMap<GoalCode, Vec<Activity>>,
    pub failed: Vec<FailedBatch>,
}

impl BulkFetch {
    /// Start with an empty list for every requested code
    pub fn new(codes: &[GoalCode]) -> Self {
        Self {
            activities: codes.iter().map(|c| (c.clone(), Vec::new())).collect(),
            failed: Vec::new(),
        }
    }

    /// Fold one batch result in.
    ///
    /// Batches never share codes, so the order in which they are absorbed does
    /// not change the outcome. Codes the store returns but nobody asked for are
    /// dropped.
    pub fn absorb_batch(
        &mut self,
        index: usize,
        codes: Vec<GoalCode>,
        result: Result<HashMap<GoalCode, Vec<Activity>>, StoreError>,
    ) {
        match result {
            Ok(mut found) => {
                for code in &codes {
                    if let Some(list) = found.remove(code) {
                        self.activities.insert(code.clone(), list);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(
                    batch = index,
                    codes = codes.len(),
                    error = %error,
                    "bulk activity batch failed; continuing with empty results"
                );
                self.failed.push(FailedBatch {
                    index,
                    codes,
                    error,
                });
                self.failed.sort_by_key(|f| f.index);
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.values().map(Vec::len).sum()
    }

    /// One `W203` per failed batch
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.failed
            .iter()
            .map(|batch| {
                let first = batch.codes.first().map(String::as_str).unwrap_or("");
                let last = batch.codes.last().map(String::as_str).unwrap_or("");
                Diagnostic::new(
                    DiagnosticCode::W203BatchFailed,
                    format!(
                        "activity batch {} ({} goals) could not be retrieved",
                        batch.index + 1,
                        batch.codes.len()
                    ),
                )
                .with_note(format!("codes {}..{}", first, last))
                .with_note(batch.error.to_string())
                .with_hint("those goals are evaluated without activities until the next sync")
            })
            .collect()
    }
}

/// De-duplicate codes (keeping first occurrence order) and chunk them.
///
/// Chunks never exceed [`MAX_BULK_CODES`], whatever `batch_size` asks for.
pub fn chunk_codes(codes: &[GoalCode], batch_size: usize) -> Vec<Vec<GoalCode>> {
    let size = batch_size.clamp(1, MAX_BULK_CODES);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unique: Vec<GoalCode> = Vec::new();
    for code in codes {
        if seen.insert(code.as_str()) {
            unique.push(code.clone());
        }
    }
    unique.chunks(size).map(<[GoalCode]>::to_vec).collect()
}

/// Retrieve activities for many goals in concurrent batches
pub async fn fetch_activities_bulk<S>(
    store: &S,
    codes: &[GoalCode],
    batch_size: usize,
) -> BulkFetch
where
    S: ActivityStore + ?Sized,
{
    let batches = chunk_codes(codes, batch_size);
    let requested: Vec<GoalCode> = batches.iter().flatten().cloned().collect();
    tracing::debug!(
        goals = requested.len(),
        batches = batches.len(),
        "fetching activities in bulk"
    );

    let requests = batches.iter().map(|batch| store.activities_bulk(batch));
    let results = join_all(requests).await;

    let mut fetch = BulkFetch::new(&requested);
    for (index, (batch, result)) in batches.into_iter().zip(results).enumerate() {
        fetch.absorb_batch(index, batch, result);
    }
    fetch
}

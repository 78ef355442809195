//! Versioned local snapshot of the plan model
//!
//! The cache is a single JSON file holding `{ version, saved_at, model }`.
//! A snapshot is either used whole or discarded whole: a version mismatch,
//! an age beyond the expiration window, or an unreadable body deletes the
//! file and reports why.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use devplan_core::{Diagnostic, DiagnosticCode, PlanModel};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Version tag written into new snapshots
pub const CACHE_VERSION: &str = "devplan-cache-v1";

/// Snapshots older than this are discarded
pub const DEFAULT_MAX_AGE_DAYS: i64 = 30;

/// File contents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub model: PlanModel,
}

/// Leading fields only, read before committing to the full body
#[derive(Deserialize)]
struct SnapshotHeader {
    version: String,
    saved_at: DateTime<Utc>,
}

/// Outcome of reading the cache
#[derive(Clone, Debug, PartialEq)]
pub enum CacheLoad {
    Fresh(CachedSnapshot),
    Missing,
    Expired { saved_at: DateTime<Utc> },
    VersionMismatch { found: String },
    Corrupt(String),
}

impl CacheLoad {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CacheLoad::Fresh(_))
    }

    pub fn into_snapshot(self) -> Option<CachedSnapshot> {
        match self {
            CacheLoad::Fresh(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// `I002` explaining why a snapshot was discarded
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        let message = match self {
            CacheLoad::Fresh(_) | CacheLoad::Missing => return None,
            CacheLoad::Expired { saved_at } => {
                format!("cached snapshot from {} has expired", saved_at.format("%Y-%m-%d"))
            }
            CacheLoad::VersionMismatch { found } => {
                format!("cached snapshot has version '{}', expected '{}'", found, CACHE_VERSION)
            }
            CacheLoad::Corrupt(reason) => format!("cached snapshot is unreadable: {}", reason),
        };
        Some(
            Diagnostic::new(DiagnosticCode::I002CacheDiscarded, message)
                .with_hint("a fresh sync will rebuild it"),
        )
    }
}

/// Handle over the snapshot file
#[derive(Clone, Debug)]
pub struct SnapshotCache {
    path: PathBuf,
    version: String,
    max_age: Duration,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            version: CACHE_VERSION.to_string(),
            max_age: Duration::days(DEFAULT_MAX_AGE_DAYS),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the model, replacing any previous snapshot
    pub fn save(&self, model: &PlanModel, now: DateTime<Utc>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let snapshot = CachedSnapshot {
            version: self.version.clone(),
            saved_at: now,
            model: model.clone(),
        };
        let json = serde_json::to_string(&snapshot)?;
        fs::write(&self.path, json)?;
        tracing::debug!(
            path = %self.path.display(),
            goals = model.goals.len(),
            "snapshot cached"
        );
        Ok(())
    }

    /// Read the snapshot, discarding it unless it is fresh
    pub fn load(&self, now: DateTime<Utc>) -> CacheLoad {
        let outcome = self.read(now);
        if !matches!(outcome, CacheLoad::Fresh(_) | CacheLoad::Missing) {
            tracing::info!(path = %self.path.display(), ?outcome, "discarding cached snapshot");
            self.clear();
        }
        outcome
    }

    /// Delete the snapshot file if present
    pub fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "could not remove cache");
            }
        }
    }

    fn read(&self, now: DateTime<Utc>) -> CacheLoad {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return CacheLoad::Missing,
            Err(err) => return CacheLoad::Corrupt(err.to_string()),
        };

        let header: SnapshotHeader = match serde_json::from_str(&content) {
            Ok(header) => header,
            Err(err) => return CacheLoad::Corrupt(err.to_string()),
        };
        if header.version != self.version {
            return CacheLoad::VersionMismatch {
                found: header.version,
            };
        }
        if now - header.saved_at > self.max_age {
            return CacheLoad::Expired {
                saved_at: header.saved_at,
            };
        }

        match serde_json::from_str::<CachedSnapshot>(&content) {
            Ok(snapshot) => CacheLoad::Fresh(snapshot),
            Err(err) => CacheLoad::Corrupt(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use devplan_core::{PlanHorizon, ProductGoal};
    use pretty_assertions::assert_eq;

    fn model() -> PlanModel {
        let mut model = PlanModel::new(PlanHorizon::new(2024));
        model.goals.push(ProductGoal::new("MP-001").sector("19", "Salud"));
        model
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("snapshot.json"));
        assert_eq!(cache.load(at(1)), CacheLoad::Missing);
        assert!(cache.load(at(1)).diagnostic().is_none());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("nested/deeper/snapshot.json"));
        cache.save(&model(), at(1)).unwrap();
        assert!(cache.path().exists());
    }

    #[test]
    fn mismatch_reports_found_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        SnapshotCache::new(&path)
            .with_version("old")
            .save(&model(), at(1))
            .unwrap();

        let load = SnapshotCache::new(&path).load(at(2));
        assert_eq!(
            load,
            CacheLoad::VersionMismatch {
                found: "old".to_string()
            }
        );
        let diagnostic = load.diagnostic().unwrap();
        assert_eq!(diagnostic.code, DiagnosticCode::I002CacheDiscarded);
        assert!(!path.exists());
    }
}

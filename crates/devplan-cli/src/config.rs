//! `devplan.toml` configuration
//!
//! ```toml
//! [plan]
//! start_year = 2024
//! current_year = 2026      # defaults to the wall-clock year
//!
//! [server]
//! base_url = "https://planes.example.org/api"
//! plan_id = "pdt-2024"
//! api_token = "..."
//! timeout_secs = 30
//! batch_size = 100
//!
//! [cache]
//! path = ".devplan/snapshot.json"
//! max_age_days = 30
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devplan_core::PlanHorizon;
use devplan_sync::{ClientConfig, SnapshotCache, DEFAULT_MAX_AGE_DAYS, MAX_BULK_CODES};
use serde::Deserialize;

/// File looked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "devplan.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub plan: PlanSection,
    pub server: ServerSection,
    pub cache: CacheSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlanSection {
    pub start_year: i32,
    pub current_year: Option<i32>,
}

impl Default for PlanSection {
    fn default() -> Self {
        Self {
            start_year: 2024,
            current_year: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub base_url: Option<String>,
    pub plan_id: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub batch_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: None,
            plan_id: client.plan_id,
            api_token: None,
            timeout_secs: client.timeout_secs,
            batch_size: MAX_BULK_CODES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub path: PathBuf,
    pub max_age_days: i64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".devplan/snapshot.json"),
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

impl Config {
    /// Load `path`, or the default file if it exists, or defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => {
                tracing::debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn horizon(&self) -> PlanHorizon {
        PlanHorizon::new(self.plan.start_year)
    }

    /// Client settings; fails when no server is configured
    pub fn client(&self) -> Result<ClientConfig> {
        let base_url = self
            .server
            .base_url
            .clone()
            .context("no server configured: set [server] base_url or pass --server")?;
        Ok(ClientConfig {
            base_url,
            plan_id: self.server.plan_id.clone(),
            api_token: self.server.api_token.clone(),
            timeout_secs: self.server.timeout_secs,
        })
    }

    /// Snapshot handle; fails when `max_age_days` is negative or too large
    pub fn snapshot_cache(&self) -> Result<SnapshotCache> {
        let days = self.cache.max_age_days;
        let max_age = chrono::Duration::try_days(days)
            .filter(|age| *age >= chrono::Duration::zero())
            .with_context(|| format!("[cache] max_age_days = {} is out of range", days))?;
        Ok(SnapshotCache::new(&self.cache.path).with_max_age(max_age))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_means_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.horizon().start_year, 2024);
        assert_eq!(config.server.batch_size, 100);
        assert_eq!(config.cache.max_age_days, 30);
    }

    #[test]
    fn partial_sections() {
        let config: Config = toml::from_str(
            r#"
[plan]
start_year = 2020
current_year = 2022

[server]
base_url = "http://localhost:9000"
batch_size = 25
"#,
        )
        .unwrap();

        assert_eq!(config.plan.current_year, Some(2022));
        assert_eq!(config.horizon().end_year(), 2023);
        assert_eq!(config.server.batch_size, 25);
        assert_eq!(config.server.plan_id, "default");

        let client = config.client().unwrap();
        assert_eq!(client.base_url, "http://localhost:9000");
        assert_eq!(client.timeout_secs, 30);
    }

    #[test]
    fn client_requires_server() {
        assert!(Config::default().client().is_err());
    }

    #[test]
    fn named_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("devplan.toml");
        std::fs::write(&path, "[cache]\npath = \"snap.json\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.snapshot_cache().unwrap().path(), Path::new("snap.json"));
    }

    #[test]
    fn cache_age_out_of_range_is_an_error() {
        let mut config = Config::default();
        config.cache.max_age_days = i64::MAX;
        let err = config.snapshot_cache().unwrap_err();
        assert!(err.to_string().contains("max_age_days"));

        config.cache.max_age_days = -1;
        assert!(config.snapshot_cache().is_err());
    }
}

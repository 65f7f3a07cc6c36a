//! Store configuration, loaded from RON.
//!
//! ```ron
//! (
//!     workspace: "personal",
//!     db_path: Some("/tmp/folio.db"),
//!     request_queue: (batch_size: 50),
//!     commit: (interval_ms: 250),
//! )
//! ```
//!
//! Every field has a default, so an empty `()` is a valid config and a
//! missing file means "all defaults".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default persistence partition.
pub const DEFAULT_WORKSPACE: &str = "default";

/// Error type for config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Batching policy for outbound record fetches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestQueueConfig {
    pub request_delay_ms: u64,
    pub batch_size: usize,
    pub request_timeout_ms: u64,
    pub max_workers: usize,
}

impl Default for RequestQueueConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 10,
            batch_size: 100,
            request_timeout_ms: 10_000,
            max_workers: 4,
        }
    }
}

/// Drain policy for queued transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    pub interval_ms: u64,
    pub max_per_tick: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_per_tick: 20,
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub workspace: String,
    /// `None` means [`default_db_path`].
    pub db_path: Option<PathBuf>,
    pub request_queue: RequestQueueConfig,
    pub commit: CommitConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            workspace: DEFAULT_WORKSPACE.to_string(),
            db_path: None,
            request_queue: RequestQueueConfig::default(),
            commit: CommitConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_ron(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The configured database path, or the platform default.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }
}

/// Get the default database path.
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("folio")
        .join("records.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(StoreConfig::from_ron("()").unwrap(), StoreConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = StoreConfig::from_ron(
            r#"(
                workspace: "personal",
                db_path: Some("/tmp/folio.db"),
                request_queue: (batch_size: 50),
                commit: (interval_ms: 250),
            )"#,
        )
        .unwrap();

        assert_eq!(config.workspace, "personal");
        assert_eq!(config.resolved_db_path(), PathBuf::from("/tmp/folio.db"));
        assert_eq!(config.request_queue.batch_size, 50);
        assert_eq!(config.request_queue.max_workers, 4);
        assert_eq!(config.commit.interval_ms, 250);
        assert_eq!(config.commit.max_per_tick, 20);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::load(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ron");
        std::fs::write(&path, "(workspace: 5)").unwrap();
        assert!(matches!(StoreConfig::load(&path), Err(ConfigError::Ron(_))));
    }

    #[test]
    fn test_default_db_path_under_folio() {
        assert!(default_db_path().ends_with("folio/records.db"));
    }
}

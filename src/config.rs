//! Application configuration (ambient stack): loaded from an optional TOML
//! file, then `.env`/process environment overrides via `dotenvy`, matching
//! the teacher's "file defaults, env overrides" convention.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_index_dir() -> PathBuf {
    PathBuf::from("lucene-indexes")
}

fn default_cadence_minutes() -> u64 {
    15
}

fn default_max_worker_parallelism() -> usize {
    num_cpus::get()
}

/// Top-level settings for the discovery/ingestion/search/scheduler
/// components (spec §5, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory under which each watcher's Tantivy index lives at
    /// `index_dir/{watcherName}` (spec §6).
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Minutes between discovery runs when running under `serve` (spec §4.7).
    #[serde(default = "default_cadence_minutes")]
    pub discovery_cadence_minutes: u64,

    /// Minutes between ingestion runs when running under `serve` (spec §4.7).
    #[serde(default = "default_cadence_minutes")]
    pub ingestion_cadence_minutes: u64,

    /// Upper bound on concurrent per-record ingestion tasks within a single
    /// watcher group (spec §5). Defaults to the host's logical CPU count.
    #[serde(default = "default_max_worker_parallelism")]
    pub max_worker_parallelism: usize,

    /// Whether newly created per-watcher indexes use the best-compression
    /// docstore codec instead of Tantivy's default (spec §4.5 "Compression
    /// mode", §6 `useDeflateCompression`).
    #[serde(default)]
    pub use_deflate_compression: bool,

    /// Whether to reuse SSH sessions across records for the same
    /// [`crate::model::SshConfig`] via [`crate::ssh::session_cache::SessionCache`].
    #[serde(default = "default_true")]
    pub ssh_session_cache: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            discovery_cadence_minutes: default_cadence_minutes(),
            ingestion_cadence_minutes: default_cadence_minutes(),
            max_worker_parallelism: default_max_worker_parallelism(),
            use_deflate_compression: false,
            ssh_session_cache: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

impl AppConfig {
    /// Loads configuration the way the teacher's daemon did: start from
    /// defaults, layer in `path` if it exists, then let `.env`/process
    /// environment variables (loaded via `dotenvy`) take final precedence
    /// for the handful of settings exposed as env vars.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut cfg = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var("LOGWATCHD_INDEX_DIR") {
            cfg.index_dir = PathBuf::from(dir);
        }
        if let Ok(n) = std::env::var("LOGWATCHD_MAX_WORKER_PARALLELISM") {
            if let Ok(n) = n.parse() {
                cfg.max_worker_parallelism = n;
            }
        }

        Ok(cfg)
    }
}

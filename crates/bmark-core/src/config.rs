use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
///
/// Loaded from the config file; the CLI then overrides single fields
/// (`--db` or `BMARK_DB`, `--workers`). Priority: CLI > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    /// when there is no file
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&contents)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// `<config_dir>/bmark/config.toml`
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?;

        Ok(config_dir.join("bmark").join("config.toml"))
    }

    /// The database file to use: the configured one, or the well-known
    /// `<data_dir>/bookmarks/bookmark.db`
    pub fn db_path(&self) -> crate::Result<PathBuf> {
        if let Some(path) = &self.store.db_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find data directory".into()))?;

        Ok(data_dir.join("bookmarks").join("bookmark.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file; defaults to the platform data directory
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// How long a locked database is retried before giving up
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout() -> u64 {
    5000
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Number of concurrent import workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Work queue capacity; unset means room for the whole document
    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

fn default_workers() -> usize {
    5
}

impl ImportConfig {
    /// Worker count, never below one
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: None,
        }
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::types::{CommitPolicy, StorageLocation, MEMORY_LOCATION};

/// Top-level configuration for Slate.
///
/// Every section falls back to its defaults, so a partial (or empty) TOML
/// file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlateConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SlateConfig {
    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!(
            path = %path.display(),
            location = %config.storage.default_location,
            "Read slate config"
        );
        Ok(config)
    }
}

/// Storage location and connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database used when a caller does not name a location.
    /// Either a file path or `:memory:`.
    pub default_location: String,
    /// What a dropped scope does with uncommitted writes.
    pub commit_policy: CommitPolicy,
    /// SQLite journal mode applied on open (file databases only).
    pub journal_mode: String,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Create missing parent directories of a file location on open.
    pub create_parent_dirs: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_location: MEMORY_LOCATION.to_string(),
            commit_policy: CommitPolicy::OnSuccess,
            journal_mode: "wal".to_string(),
            busy_timeout_ms: 5000,
            create_parent_dirs: true,
        }
    }
}

impl StorageConfig {
    pub fn location(&self) -> StorageLocation {
        StorageLocation::from(self.default_location.as_str())
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

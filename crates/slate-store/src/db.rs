//! SQLite connection set-up.
//!
//! Opens a connection for a [`StorageLocation`] and applies the configured
//! PRAGMAs. File databases get the configured journal mode; in-memory
//! databases keep SQLite's `memory` journal.

use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use slate_core::config::StorageConfig;
use slate_core::error::{Result, SlateError};
use slate_core::types::{CommitPolicy, StorageLocation};

/// Connection settings shared by every session of a manager.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub journal_mode: String,
    pub busy_timeout: Duration,
    pub create_parent_dirs: bool,
    pub commit_policy: CommitPolicy,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for ConnectOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            journal_mode: config.journal_mode.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            create_parent_dirs: config.create_parent_dirs,
            commit_policy: config.commit_policy,
        }
    }
}

/// Map a rusqlite failure to a storage error with the failing operation as
/// context.
pub(crate) fn storage_err(context: &'static str) -> impl Fn(rusqlite::Error) -> SlateError {
    move |e| SlateError::Storage(format!("{}: {}", context, e))
}

/// Open (or create) the database at `location`.
pub fn open(location: &StorageLocation, options: &ConnectOptions) -> Result<Connection> {
    let conn = match location {
        StorageLocation::Memory => {
            Connection::open_in_memory().map_err(storage_err("Failed to open in-memory db"))?
        }
        StorageLocation::File(path) => {
            if options.create_parent_dirs {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(path).map_err(storage_err("Failed to open database"))?
        }
    };

    conn.busy_timeout(options.busy_timeout)
        .map_err(storage_err("Failed to set busy timeout"))?;

    if !location.is_memory() {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", &options.journal_mode, |row| {
                row.get(0)
            })
            .map_err(storage_err("Failed to set journal mode"))?;
        info!(%location, journal_mode = %mode, "Database opened");
    } else {
        info!(%location, "Database opened");
    }

    Ok(conn)
}

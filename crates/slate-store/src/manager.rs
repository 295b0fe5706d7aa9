//! Process-wide registry of sessions, one per storage location.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use slate_core::config::{SlateConfig, StorageConfig};
use slate_core::error::{Result, SlateError};
use slate_core::types::StorageLocation;

use crate::db::ConnectOptions;
use crate::record::Record;
use crate::registry::TypeRegistry;
use crate::schema::create_table_statement;
use crate::session::{Session, SessionHandle, NO_PARAMS};

/// Hands out at most one session per storage location.
///
/// The location map is only touched under a synchronous lock, never across an
/// await point, so concurrent first requests for a location cannot register
/// two sessions.
pub struct ConnectionManager {
    default_location: StorageLocation,
    registry: Arc<TypeRegistry>,
    options: ConnectOptions,
    sessions: Mutex<HashMap<StorageLocation, SessionHandle>>,
}

impl ConnectionManager {
    pub fn new(default_location: impl Into<StorageLocation>, registry: Arc<TypeRegistry>) -> Self {
        Self::with_options(default_location, registry, ConnectOptions::default())
    }

    pub fn with_options(
        default_location: impl Into<StorageLocation>,
        registry: Arc<TypeRegistry>,
        options: ConnectOptions,
    ) -> Self {
        Self {
            default_location: default_location.into(),
            registry,
            options,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &StorageConfig, registry: Arc<TypeRegistry>) -> Self {
        Self::with_options(config.location(), registry, ConnectOptions::from(config))
    }

    /// Build a manager from the `[storage]` section of a TOML config file.
    pub fn from_config_file(path: &Path, registry: Arc<TypeRegistry>) -> Result<Self> {
        let config = SlateConfig::load(path)?;
        Ok(Self::from_config(&config.storage, registry))
    }

    pub fn default_location(&self) -> &StorageLocation {
        &self.default_location
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Return the session for `location` (or the default location), creating
    /// an unopened one on first request.
    pub fn session(&self, location: Option<&StorageLocation>) -> Result<SessionHandle> {
        let location = location.unwrap_or(&self.default_location);
        let mut sessions = self.lock_sessions()?;

        if let Some(handle) = sessions.get(location) {
            return Ok(handle.clone());
        }

        let handle = SessionHandle::new(Session::new(
            location.clone(),
            Arc::clone(&self.registry),
            self.options.clone(),
        ));
        sessions.insert(location.clone(), handle.clone());
        debug!(%location, "Registered session");
        Ok(handle)
    }

    /// Create the table for `R` at `location` (or the default location) and
    /// commit it.
    ///
    /// The statement is compiled before the database is touched. Installing a
    /// type whose table already exists fails with
    /// [`SlateError::DuplicateTableDefinition`].
    pub async fn load_schema<R: Record>(&self, location: Option<&StorageLocation>) -> Result<()> {
        let sql = create_table_statement::<R>(&self.registry)?;
        let table = R::table_name();

        let handle = self.session(location)?;
        let scope = handle.scope().await?;
        if scope.table_exists(&table).await? {
            return Err(SlateError::DuplicateTableDefinition { table });
        }

        scope.execute(&sql, NO_PARAMS).await?;
        scope.finish().await?;
        info!(location = %handle.location(), %table, "Schema installed");
        Ok(())
    }

    /// Close every session and forget it.
    ///
    /// The manager stays usable: the next request for a location registers a
    /// fresh, unopened session (for `:memory:` that is a new, empty database).
    /// Every session is closed even if some fail; the first failure is
    /// returned.
    ///
    /// A session still held by a [`crate::Scope`] is not waited for. It stays
    /// registered and open, and the call reports
    /// [`SlateError::SessionBusy`]; finish or drop the scope, then close
    /// again.
    pub async fn close_all(&self) -> Result<()> {
        let handles: Vec<SessionHandle> = {
            let mut sessions = self.lock_sessions()?;
            sessions.drain().map(|(_, handle)| handle).collect()
        };

        let mut first_error = None;
        let mut busy = Vec::new();
        for handle in handles {
            match handle.close().await {
                Ok(()) => {}
                Err(e @ SlateError::SessionBusy { .. }) => {
                    warn!(location = %handle.location(), "Session in use, left open");
                    first_error.get_or_insert(e);
                    busy.push(handle);
                }
                Err(e) => {
                    warn!(location = %handle.location(), error = %e, "Failed to close session");
                    first_error.get_or_insert(e);
                }
            }
        }

        if !busy.is_empty() {
            let mut sessions = self.lock_sessions()?;
            for handle in busy {
                sessions.entry(handle.location().clone()).or_insert(handle);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Locations that currently have a registered session.
    pub fn locations(&self) -> Result<Vec<StorageLocation>> {
        Ok(self.lock_sessions()?.keys().cloned().collect())
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<StorageLocation, SessionHandle>>> {
        self.sessions
            .lock()
            .map_err(|e| SlateError::Storage(format!("Session registry lock poisoned: {}", e)))
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("default_location", &self.default_location)
            .finish()
    }
}

//! Sessions: one SQLite connection per storage location.
//!
//! A [`Session`] opens its connection lazily the first time a [`Scope`] is
//! taken on it and keeps that connection until [`Session::close`]. Writes
//! start an implicit transaction and stay pending until committed, either
//! explicitly or by leaving the scope.
//!
//! SQLite calls run inline on the calling task. Every operation is still an
//! `async fn` so callers treat it as a suspension point, and record streams
//! hold a live statement, which makes them (and the futures borrowing a
//! session) `!Send`: a session is driven from one task at a time.

use std::borrow::Cow;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt, TryStreamExt};
use rusqlite::{Connection, Row, Statement};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use slate_core::error::{Result, SlateError};
use slate_core::types::{CommitPolicy, StorageLocation};

use crate::db::{self, storage_err, ConnectOptions};
use crate::record::{Record, StoredRow};
use crate::registry::{SqlValue, TypeRegistry};
use crate::statement::{insert_statement, select_statement};

/// Lazy stream of raw rows from [`Session::query`].
pub type RowStream<'s> = Pin<Box<dyn Stream<Item = Result<StoredRow>> + 's>>;

/// Lazy stream of records from [`Session::select`].
pub type RecordStream<'s, R> = Pin<Box<dyn Stream<Item = Result<R>> + 's>>;

/// Empty parameter list for statements without placeholders.
pub const NO_PARAMS: &[(&str, SqlValue)] = &[];

/// Lifecycle of a session's connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

enum Link {
    Unopened,
    Open(Connection),
    Closed,
}

/// Owns the single connection to one storage location.
pub struct Session {
    location: StorageLocation,
    registry: Arc<TypeRegistry>,
    options: ConnectOptions,
    link: Link,
}

impl Session {
    /// A new, unopened session. Nothing touches the database until
    /// [`Session::open`].
    pub fn new(
        location: StorageLocation,
        registry: Arc<TypeRegistry>,
        options: ConnectOptions,
    ) -> Self {
        Self {
            location,
            registry,
            options,
            link: Link::Unopened,
        }
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn commit_policy(&self) -> CommitPolicy {
        self.options.commit_policy
    }

    pub fn state(&self) -> SessionState {
        match self.link {
            Link::Unopened => SessionState::Unopened,
            Link::Open(_) => SessionState::Open,
            Link::Closed => SessionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.link, Link::Open(_))
    }

    /// Open the connection if it is not open yet. A closed session stays
    /// closed.
    pub async fn open(&mut self) -> Result<()> {
        match self.link {
            Link::Open(_) => Ok(()),
            Link::Closed => Err(self.closed_error()),
            Link::Unopened => {
                let conn = db::open(&self.location, &self.options)?;
                self.link = Link::Open(conn);
                Ok(())
            }
        }
    }

    /// Run one statement that returns no rows. Returns the number of rows
    /// changed.
    pub async fn execute<K: AsRef<str>>(
        &self,
        sql: &str,
        params: &[(K, SqlValue)],
    ) -> Result<usize> {
        let mut stmt = self.prepare(sql, params)?;
        debug!(location = %self.location, sql, "Executing statement");
        stmt.raw_execute()
            .map_err(storage_err("Failed to execute statement"))
    }

    /// Run one statement and return a forward-only cursor over its rows.
    ///
    /// The statement is prepared (and parameters bound) eagerly, so invalid
    /// SQL fails here; rows are fetched as the stream is polled.
    pub async fn query<K: AsRef<str>>(
        &self,
        sql: &str,
        params: &[(K, SqlValue)],
    ) -> Result<RowStream<'_>> {
        let stmt = self.prepare(sql, params)?;
        debug!(location = %self.location, sql, "Running query");
        Ok(row_stream(stmt))
    }

    /// Commit pending writes. Does nothing when no transaction is active.
    pub async fn commit(&self) -> Result<()> {
        self.commit_pending().map(|_| ())
    }

    /// Discard pending writes. Does nothing when no transaction is active.
    pub async fn rollback(&self) -> Result<()> {
        self.rollback_pending().map(|_| ())
    }

    /// Insert one record. Not committed.
    pub async fn add<R: Record>(&self, record: &R) -> Result<()> {
        let insert = insert_statement(record, &self.registry)?;
        self.execute(&insert.sql, insert.params.as_slice()).await?;
        Ok(())
    }

    /// Insert records in order, stopping at the first failure. Rows inserted
    /// before the failure stay pending. Returns the number inserted.
    pub async fn add_all<'a, R, I>(&self, records: I) -> Result<usize>
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut inserted = 0;
        for record in records {
            self.add(record).await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Lazily stream every row of `R`'s table as records.
    ///
    /// The stream borrows the session, so the connection cannot be closed
    /// while it is alive. It is single pass; select again to restart.
    pub async fn select<'s, R: Record + 's>(&'s self) -> Result<RecordStream<'s, R>> {
        let sql = select_statement::<R>();
        let rows = self.query(&sql, NO_PARAMS).await?;
        Ok(Box::pin(
            rows.map(|row| row.and_then(|row| R::from_row(&row))),
        ))
    }

    /// Read every row of `R`'s table into memory.
    pub async fn select_all<R: Record>(&self) -> Result<Vec<R>> {
        self.select::<R>().await?.try_collect().await
    }

    /// Whether a table named `table` exists in this database.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self
            .connection()?
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(storage_err("Failed to inspect schema"))?;
        Ok(count > 0)
    }

    /// Release the connection. Uncommitted writes are lost and every later
    /// operation fails with [`SlateError::SessionClosed`].
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Open(conn) => {
                conn.close()
                    .map_err(|(_, e)| storage_err("Failed to close database")(e))?;
                info!(location = %self.location, "Session closed");
            }
            Link::Unopened => {
                debug!(location = %self.location, "Closed session that was never opened");
            }
            Link::Closed => {}
        }
        Ok(())
    }

    fn connection(&self) -> Result<&Connection> {
        match &self.link {
            Link::Open(conn) => Ok(conn),
            Link::Unopened => Err(SlateError::SessionNotOpen {
                location: self.location.to_string(),
            }),
            Link::Closed => Err(self.closed_error()),
        }
    }

    fn closed_error(&self) -> SlateError {
        SlateError::SessionClosed {
            location: self.location.to_string(),
        }
    }

    /// Prepare `sql`, bind named parameters, and begin a transaction if the
    /// statement writes and none is active.
    fn prepare<K: AsRef<str>>(&self, sql: &str, params: &[(K, SqlValue)]) -> Result<Statement<'_>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(storage_err("Failed to prepare statement"))?;

        for (name, value) in params {
            let name = name.as_ref();
            let key = if name.starts_with(':') {
                Cow::Borrowed(name)
            } else {
                Cow::Owned(format!(":{}", name))
            };
            let idx = stmt
                .parameter_index(&key)
                .map_err(storage_err("Failed to resolve parameter"))?
                .ok_or_else(|| {
                    SlateError::Storage(format!("Statement has no parameter named {}", key))
                })?;
            stmt.raw_bind_parameter(idx, value)
                .map_err(storage_err("Failed to bind parameter"))?;
        }

        if !stmt.readonly() && conn.is_autocommit() {
            conn.execute_batch("BEGIN")
                .map_err(storage_err("Failed to begin transaction"))?;
        }

        Ok(stmt)
    }

    fn commit_pending(&self) -> Result<bool> {
        let conn = self.connection()?;
        if conn.is_autocommit() {
            return Ok(false);
        }
        conn.execute_batch("COMMIT")
            .map_err(storage_err("Failed to commit"))?;
        debug!(location = %self.location, "Committed");
        Ok(true)
    }

    fn rollback_pending(&self) -> Result<bool> {
        let conn = self.connection()?;
        if conn.is_autocommit() {
            return Ok(false);
        }
        conn.execute_batch("ROLLBACK")
            .map_err(storage_err("Failed to roll back"))?;
        debug!(location = %self.location, "Rolled back");
        Ok(true)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("location", &self.location)
            .field("state", &self.state())
            .finish()
    }
}

fn row_stream(mut stmt: Statement<'_>) -> RowStream<'_> {
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    Box::pin(async_stream::stream! {
        let mut rows = stmt.raw_query();
        loop {
            let item: Result<StoredRow> = match rows.next() {
                Ok(Some(row)) => read_row(row, &columns),
                Ok(None) => break,
                Err(e) => Err(storage_err("Failed to fetch row")(e)),
            };
            let failed = item.is_err();
            yield item;
            if failed {
                break;
            }
        }
    })
}

fn read_row(row: &Row<'_>, columns: &Arc<[String]>) -> Result<StoredRow> {
    let values = (0..columns.len())
        .map(|idx| row.get::<_, SqlValue>(idx))
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage_err("Failed to read row"))?;
    Ok(StoredRow::new(Arc::clone(columns), values))
}

/// Shared handle to a session, as handed out by the connection manager.
#[derive(Clone)]
pub struct SessionHandle {
    location: StorageLocation,
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            location: session.location().clone(),
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    /// Whether both handles refer to the same session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Enter a transaction scope, opening the connection on first use.
    ///
    /// The scope has exclusive use of the session until it is finished or
    /// dropped; a second `scope()` on the same session waits for it.
    pub async fn scope(&self) -> Result<Scope> {
        let mut session = Arc::clone(&self.inner).lock_owned().await;
        session.open().await?;
        Ok(Scope {
            session,
            finished: false,
        })
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state()
    }

    /// Close the session.
    ///
    /// Fails with [`SlateError::SessionBusy`] while a [`Scope`] holds the
    /// session, instead of waiting for it: a task closing a session it is
    /// still scoped on would otherwise never wake up.
    pub async fn close(&self) -> Result<()> {
        let mut session = self
            .inner
            .try_lock()
            .map_err(|_| SlateError::SessionBusy {
                location: self.location.to_string(),
            })?;
        session.close().await
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("location", &self.location)
            .finish()
    }
}

/// A transaction scope over an open session.
///
/// [`Scope::finish`] commits. Dropping the scope without finishing it (an
/// error propagated with `?`, an early return) applies the session's
/// [`CommitPolicy`]: pending writes are rolled back under
/// [`CommitPolicy::OnSuccess`] and committed under [`CommitPolicy::Always`].
#[derive(Debug)]
pub struct Scope {
    session: OwnedMutexGuard<Session>,
    finished: bool,
}

impl Scope {
    /// Leave the scope cleanly, committing pending writes.
    ///
    /// If the commit fails the scope counts as not finished: dropping it
    /// applies the [`CommitPolicy`] to the writes SQLite kept pending.
    pub async fn finish(mut self) -> Result<()> {
        if self.session.is_open() {
            self.session.commit().await?;
        }
        self.finished = true;
        Ok(())
    }
}

impl Deref for Scope {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for Scope {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.finished || !self.session.is_open() {
            return;
        }

        let policy = self.session.commit_policy();
        let outcome = match policy {
            CommitPolicy::Always => self.session.commit_pending(),
            CommitPolicy::OnSuccess => self.session.rollback_pending(),
        };

        match outcome {
            Ok(true) => debug!(
                location = %self.session.location(),
                ?policy,
                "Scope dropped with pending writes"
            ),
            Ok(false) => {}
            Err(e) => warn!(
                location = %self.session.location(),
                ?policy,
                error = %e,
                "Failed to settle pending writes on scope exit"
            ),
        }
    }
}

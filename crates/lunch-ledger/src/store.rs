//! SQLite-backed store shared by the ledger and the student directory
//!
//! One connection guarded by a mutex; every operation runs on tokio's blocking
//! pool and is bounded by the configured timeout. Cloning a [`SqliteStore`]
//! clones the handle, not the database.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, ToSql};

use crate::config::LedgerConfig;
use crate::errors::LedgerError;
use crate::types::{PermissionId, Quantity, StudentId};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Handle to the relational store backing the ledger
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create the database at `path` and apply the schema
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::StoreUnavailable`] if the file cannot be opened
    /// or initialised.
    pub fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::initialize_connection(&conn, timeout)?;
        tracing::debug!(path = %path.display(), ?timeout, "opened lunch ledger store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a private in-memory store
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory(timeout: Duration) -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn, timeout)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
            path: None,
        })
    }

    /// Open the store described by a validated configuration
    ///
    /// # Errors
    ///
    /// Same as [`SqliteStore::open`].
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        Self::open(&config.database_path, config.store_timeout())
    }

    fn initialize_connection(conn: &Connection, timeout: Duration) -> Result<(), LedgerError> {
        conn.busy_timeout(timeout)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Database file path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Bound applied to each store round trip
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one unit of work against the connection.
    ///
    /// The closure runs on the blocking pool while holding the connection
    /// lock, so it observes no interleaved writes. If it does not finish
    /// within the timeout the caller gets [`LedgerError::StoreUnavailable`];
    /// the statement itself is not cancelled and may still land.
    pub(crate) async fn run<T, F>(&self, op: &'static str, work: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, LedgerError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            work(&guard)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(LedgerError::store_unavailable(format!(
                "{op} did not complete: {join_err}"
            ))),
            Err(_) => {
                tracing::warn!(op, timeout = ?self.timeout, "store round trip timed out");
                Err(LedgerError::store_unavailable(format!(
                    "{op} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

impl ToSql for StudentId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.get()))
    }
}

impl FromSql for StudentId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self::new)
    }
}

impl ToSql for PermissionId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.get()))
    }
}

impl FromSql for PermissionId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self::new)
    }
}

impl ToSql for Quantity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(*self)))
    }
}

impl FromSql for Quantity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        Quantity::new(raw).map_err(|_| FromSqlError::OutOfRange(raw))
    }
}

//! SQLite connection opener and the pooled database handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::error::DbError;
use crate::pool::{AcquireError, Pool, Pooled};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqliteOpenMode {
    ReadOnly,
    ReadWrite,
}

pub struct SqliteConn {
    conn: Connection,
}

impl SqliteConn {
    pub fn open(
        path: &Path,
        mode: SqliteOpenMode,
        busy_timeout: Duration,
    ) -> Result<Self, rusqlite::Error> {
        let flags = match mode {
            SqliteOpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            SqliteOpenMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(busy_timeout)?;
        if matches!(mode, SqliteOpenMode::ReadOnly) {
            conn.pragma_update(None, "query_only", 1)?;
        }
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub type SqlitePool = Pool<SqliteConn, rusqlite::Error>;

/// A checked-out connection; returned to the pool when dropped.
pub type PooledConn = Pooled<SqliteConn, rusqlite::Error>;

/// Shared handle to one SQLite database file.
#[derive(Clone)]
pub struct Database {
    path: PathBuf,
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("in_flight", &self.pool.in_flight())
            .finish()
    }
}

impl Database {
    /// Open a read-write database, creating the file when it is missing.
    ///
    /// One connection is opened up front so that a bad path or a corrupt file
    /// fails here rather than on the first event.
    pub fn open(
        path: impl AsRef<Path>,
        pool_size: usize,
        busy_timeout: Duration,
    ) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        let factory_path = path.clone();
        let pool = Pool::new(pool_size, move || {
            SqliteConn::open(&factory_path, SqliteOpenMode::ReadWrite, busy_timeout)
        });
        // The probe connection stays in the pool as its first idle entry.
        let probe = pool.acquire(None).map_err(|err| match err {
            AcquireError::Open(source) => DbError::Open {
                path: path.clone(),
                source,
            },
            AcquireError::Timeout => DbError::Acquire("pool seed timed out".into()),
        })?;
        drop(probe);

        tracing::debug!(path = %path.display(), pool_size, "opened sqlite database");
        Ok(Self { path, pool })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check out a connection, waiting as long as it takes.
    pub fn connection(&self) -> Result<PooledConn, DbError> {
        self.pool.acquire(None).map_err(DbError::from)
    }

    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }
}

use std::io;
use std::path::PathBuf;

use crate::pool::AcquireError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("cannot open sqlite database at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("cannot acquire connection: {0}")]
    Acquire(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<AcquireError<rusqlite::Error>> for DbError {
    fn from(err: AcquireError<rusqlite::Error>) -> Self {
        DbError::Acquire(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("unsupported migration source '{0}' (expected file://<dir> or a directory path)")]
    UnsupportedSource(String),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate migration version {version}: {first:?} and {second:?}")]
    DuplicateVersion {
        version: u64,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("migration version in {path:?} does not fit a signed 64-bit integer")]
    VersionOutOfRange { path: PathBuf },
    #[error("schema_migrations holds invalid version {0}")]
    InvalidRecordedVersion(i64),
    #[error("database is dirty at version {0}; fix it by hand and clear the dirty flag")]
    Dirty(u64),
    #[error("migration {version} ({path:?}) failed: {source}")]
    Apply {
        version: u64,
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> MigrateError {
    MigrateError::Io {
        path: path.into(),
        source: err,
    }
}

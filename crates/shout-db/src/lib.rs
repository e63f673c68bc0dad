//! SQLite storage for shout nodes: a bounded connection pool, the shared
//! database handle, and a forward-only migration runner.

mod error;
pub mod migrate;
pub mod pool;
pub mod sqlite;

pub use error::{DbError, MigrateError};
pub use migrate::{MigrateOutcome, Migration, migrate};
pub use pool::{AcquireError, Pool, Pooled};
pub use sqlite::{DEFAULT_BUSY_TIMEOUT, Database, PooledConn, SqliteConn, SqliteOpenMode};

// Re-exported so dependants bind and read values with the same driver version.
pub use rusqlite;

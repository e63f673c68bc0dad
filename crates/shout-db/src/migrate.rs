//! Forward-only schema migrations read from a directory of SQL files.
//!
//! Files are named `<version>_<title>.up.sql` and applied in ascending version
//! order. Progress is tracked in a single-row `schema_migrations` table holding
//! the last applied version and a dirty flag. A migration marks the row dirty
//! before it runs and clears it after it commits, so a failure leaves the
//! database flagged and later runs refuse to continue.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{MigrateError, io_error};
use crate::sqlite::Database;

const MIGRATIONS_TABLE: &str = "schema_migrations";
const UP_SUFFIX: &str = ".up.sql";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u64,
    pub title: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateOutcome {
    /// Nothing newer than the recorded version was found.
    NoChange { version: Option<u64> },
    Applied {
        from: Option<u64>,
        to: u64,
        count: usize,
    },
}

/// Resolve a migration source (`file://<dir>` or a bare path) to a directory.
pub fn source_dir(source: &str) -> Result<PathBuf, MigrateError> {
    if let Some(rest) = source.strip_prefix("file://") {
        if rest.is_empty() {
            return Err(MigrateError::UnsupportedSource(source.to_string()));
        }
        return Ok(PathBuf::from(rest));
    }
    if source.contains("://") || source.is_empty() {
        return Err(MigrateError::UnsupportedSource(source.to_string()));
    }
    Ok(PathBuf::from(source))
}

/// List the up-migrations in `dir`, sorted by version.
pub fn discover(dir: &Path) -> Result<Vec<Migration>, MigrateError> {
    let entries = fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
    let mut found: BTreeMap<u64, Migration> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((version, title)) = parse_file_name(file_name) else {
            tracing::debug!(file = %path.display(), "skipping non-migration file");
            continue;
        };
        let Some(version) = version else {
            return Err(MigrateError::VersionOutOfRange { path });
        };
        if let Some(existing) = found.get(&version) {
            return Err(MigrateError::DuplicateVersion {
                version,
                first: existing.path.clone(),
                second: path,
            });
        }
        found.insert(
            version,
            Migration {
                version,
                title,
                path,
            },
        );
    }
    Ok(found.into_values().collect())
}

/// Split `<digits>_<title>.up.sql`. The version is `None` when the digits
/// do not fit the INTEGER column of `schema_migrations`.
fn parse_file_name(name: &str) -> Option<(Option<u64>, String)> {
    let stem = name.strip_suffix(UP_SUFFIX)?;
    let (version, title) = stem.split_once('_')?;
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let version = version
        .parse::<i64>()
        .ok()
        .and_then(|v| u64::try_from(v).ok());
    Some((version, title.to_string()))
}

/// Read the recorded `(version, dirty)` pair, creating the table if needed.
pub fn current_version(conn: &Connection) -> Result<Option<(u64, bool)>, MigrateError> {
    ensure_table(conn)?;
    let row = conn
        .query_row(
            &format!("SELECT version, dirty FROM {MIGRATIONS_TABLE} LIMIT 1"),
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?)),
        )
        .optional()?;
    row.map(|(version, dirty)| {
        u64::try_from(version)
            .map(|version| (version, dirty))
            .map_err(|_| MigrateError::InvalidRecordedVersion(version))
    })
    .transpose()
}

/// Apply every migration from `source` newer than the recorded version.
pub fn migrate(db: &Database, source: &str) -> Result<MigrateOutcome, MigrateError> {
    let dir = source_dir(source)?;
    let migrations = discover(&dir)?;
    let conn = db.connection()?;
    apply_all(conn.connection(), &migrations)
}

pub fn apply_all(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<MigrateOutcome, MigrateError> {
    let recorded = current_version(conn)?;
    if let Some((version, true)) = recorded {
        return Err(MigrateError::Dirty(version));
    }
    let from = recorded.map(|(version, _)| version);

    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| from.is_none_or(|v| m.version > v))
        .collect();
    let Some(last) = pending.last() else {
        tracing::info!(version = ?from, "schema is up to date");
        return Ok(MigrateOutcome::NoChange { version: from });
    };
    let to = last.version;

    for migration in &pending {
        apply_one(conn, migration)?;
    }
    tracing::info!(from = ?from, to, count = pending.len(), "applied migrations");
    Ok(MigrateOutcome::Applied {
        from,
        to,
        count: pending.len(),
    })
}

fn apply_one(conn: &Connection, migration: &Migration) -> Result<(), MigrateError> {
    let sql = fs::read_to_string(&migration.path).map_err(|e| io_error(&migration.path, e))?;
    tracing::debug!(
        version = migration.version,
        title = %migration.title,
        "applying migration"
    );

    set_version(conn, migration.version, true)?;

    let tx = conn.unchecked_transaction()?;
    let applied = tx.execute_batch(&sql).and_then(|_| {
        write_version(&tx, migration.version, false)?;
        tx.commit()
    });
    applied.map_err(|source| MigrateError::Apply {
        version: migration.version,
        path: migration.path.clone(),
        source,
    })
}

fn ensure_table(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (version INTEGER NOT NULL, dirty INTEGER NOT NULL);
         CREATE UNIQUE INDEX IF NOT EXISTS version_unique ON {MIGRATIONS_TABLE} (version);"
    ))
}

fn set_version(conn: &Connection, version: u64, dirty: bool) -> Result<(), rusqlite::Error> {
    let tx = conn.unchecked_transaction()?;
    write_version(&tx, version, dirty)?;
    tx.commit()
}

fn write_version(conn: &Connection, version: u64, dirty: bool) -> Result<(), rusqlite::Error> {
    let version =
        i64::try_from(version).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(&format!("DELETE FROM {MIGRATIONS_TABLE}"), [])?;
    conn.execute(
        &format!("INSERT INTO {MIGRATIONS_TABLE} (version, dirty) VALUES (?1, ?2)"),
        params![version, dirty],
    )?;
    Ok(())
}

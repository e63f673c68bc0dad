//! Migration runner against real database files.

use std::fs;
use std::path::Path;

use shout_db::migrate::{self, current_version};
use shout_db::{DEFAULT_BUSY_TIMEOUT, Database, MigrateError, MigrateOutcome};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, sql: &str) {
    fs::write(dir.join(name), sql).expect("write migration");
}

fn open(dir: &TempDir) -> Database {
    Database::open(dir.path().join("db.sqlite"), 2, DEFAULT_BUSY_TIMEOUT).expect("open db")
}

#[test]
fn applies_pending_migrations_in_version_order() {
    let tmp = TempDir::new().expect("tmp");
    let migrations = tmp.path().join("migrations");
    fs::create_dir(&migrations).expect("mkdir");
    write(
        &migrations,
        "2_seed_users.up.sql",
        "INSERT INTO users (id, name) VALUES (1, 'Alice');",
    );
    write(
        &migrations,
        "1_create_users.up.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    );
    write(&migrations, "1_create_users.down.sql", "DROP TABLE users;");
    write(&migrations, "README.md", "not a migration");

    let db = open(&tmp);
    let source = format!("file://{}", migrations.display());
    let outcome = migrate::migrate(&db, &source).expect("migrate");
    assert_eq!(
        outcome,
        MigrateOutcome::Applied {
            from: None,
            to: 2,
            count: 2
        }
    );

    let conn = db.connection().expect("conn");
    let name: String = conn
        .connection()
        .query_row("SELECT name FROM users WHERE id = 1", [], |row| row.get(0))
        .expect("seeded row");
    assert_eq!(name, "Alice");
    assert_eq!(current_version(conn.connection()).expect("version"), Some((2, false)));
}

#[test]
fn second_run_is_a_no_op_and_picks_up_new_files() {
    let tmp = TempDir::new().expect("tmp");
    let migrations = tmp.path().join("migrations");
    fs::create_dir(&migrations).expect("mkdir");
    write(&migrations, "1_joins.up.sql", "CREATE TABLE joins (node TEXT);");

    let db = open(&tmp);
    let source = migrations.display().to_string();
    migrate::migrate(&db, &source).expect("first run");
    assert_eq!(
        migrate::migrate(&db, &source).expect("second run"),
        MigrateOutcome::NoChange { version: Some(1) }
    );

    write(
        &migrations,
        "2_joins_index.up.sql",
        "CREATE INDEX joins_node ON joins (node);",
    );
    assert_eq!(
        migrate::migrate(&db, &source).expect("third run"),
        MigrateOutcome::Applied {
            from: Some(1),
            to: 2,
            count: 1
        }
    );
}

#[test]
fn failed_migration_leaves_database_dirty() {
    let tmp = TempDir::new().expect("tmp");
    let migrations = tmp.path().join("migrations");
    fs::create_dir(&migrations).expect("mkdir");
    write(&migrations, "1_ok.up.sql", "CREATE TABLE a (x INTEGER);");
    write(&migrations, "2_broken.up.sql", "CREATE TABLE b (x INTEGER;");

    let db = open(&tmp);
    let source = migrations.display().to_string();
    let err = migrate::migrate(&db, &source).unwrap_err();
    assert!(
        matches!(err, MigrateError::Apply { version: 2, .. }),
        "got {err:?}"
    );

    let conn = db.connection().expect("conn");
    assert_eq!(current_version(conn.connection()).expect("version"), Some((2, true)));
    let b_exists: i64 = conn
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'b'",
            [],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(b_exists, 0);
    drop(conn);

    fs::write(migrations.join("2_broken.up.sql"), "CREATE TABLE b (x INTEGER);").expect("fix");
    let err = migrate::migrate(&db, &source).unwrap_err();
    assert!(matches!(err, MigrateError::Dirty(2)), "got {err:?}");
}

#[test]
fn missing_directory_is_an_error() {
    let tmp = TempDir::new().expect("tmp");
    let db = open(&tmp);
    let source = tmp.path().join("absent").display().to_string();
    let err = migrate::migrate(&db, &source).unwrap_err();
    assert!(matches!(err, MigrateError::Io { .. }), "got {err:?}");
}

#[test]
fn duplicate_versions_are_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let migrations = tmp.path().join("migrations");
    fs::create_dir(&migrations).expect("mkdir");
    write(&migrations, "1_a.up.sql", "SELECT 1;");
    write(&migrations, "001_b.up.sql", "SELECT 1;");

    let err = migrate::discover(&migrations).unwrap_err();
    assert!(
        matches!(err, MigrateError::DuplicateVersion { version: 1, .. }),
        "got {err:?}"
    );
}

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use shout_db::{DEFAULT_BUSY_TIMEOUT, Database};
use shout_node::NodeConfig;
use tempfile::TempDir;

pub const CREATE_USERS: &str = "\
CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
INSERT INTO users (id, name) VALUES (1, 'Alice');
INSERT INTO users (id, name) VALUES (2, 'Bob');
CREATE TABLE joins (node TEXT NOT NULL);
";

/// Handler tree, migrations and database file under one temp dir.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        for sub in ["handlers/queries", "handlers/events", "migrations"] {
            fs::create_dir_all(dir.path().join(sub)).expect("mkdir");
        }
        let fixture = Self { dir };
        fixture.migration("1_create_users.up.sql", CREATE_USERS);
        fixture.query("get_user", "SELECT id, name FROM users WHERE id = :id");
        fixture.query("count_joins", "SELECT count(*) AS joins FROM joins");
        fixture.event("log_join", "INSERT INTO joins (node) VALUES (:node)");
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn handlers(&self) -> PathBuf {
        self.root().join("handlers")
    }

    pub fn db_path(&self) -> PathBuf {
        self.root().join("db.sqlite")
    }

    pub fn migrations_source(&self) -> String {
        format!("file://{}", self.root().join("migrations").display())
    }

    pub fn query(&self, name: &str, sql: &str) {
        fs::write(self.handlers().join("queries").join(format!("{name}.sql")), sql)
            .expect("write query handler");
    }

    pub fn event(&self, name: &str, sql: &str) {
        fs::write(self.handlers().join("events").join(format!("{name}.sql")), sql)
            .expect("write event handler");
    }

    pub fn migration(&self, file: &str, sql: &str) {
        fs::write(self.root().join("migrations").join(file), sql).expect("write migration");
    }

    /// Open the database and apply the fixture migrations.
    pub fn database(&self) -> Database {
        let db = Database::open(self.db_path(), 2, DEFAULT_BUSY_TIMEOUT).expect("open db");
        shout_db::migrate(&db, &self.migrations_source()).expect("migrate");
        db
    }

    pub fn config(&self) -> NodeConfig {
        NodeConfig {
            node_name: "test-node".into(),
            db_path: self.db_path(),
            rpc_addr: "127.0.0.1:0".into(),
            handlers_path: self.handlers(),
            migrations_source: self.migrations_source(),
            pool_size: 2,
            ..NodeConfig::default()
        }
    }
}

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands_and_global_flags() {
    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("shout"))
        .arg("--help")
        .output()
        .expect("run help");
    assert!(output.status.success(), "--help should succeed");
    let text = String::from_utf8_lossy(&output.stdout);

    for needle in ["run", "query", "event", "members", "leave", "--rpc-addr", "--pretty"] {
        assert!(
            text.contains(needle),
            "help output should contain '{needle}'"
        );
    }
}

#[test]
fn run_help_shows_node_flags_and_defaults() {
    Command::new(assert_cmd::cargo::cargo_bin!("shout"))
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--db"))
        .stdout(predicate::str::contains("--memberlist-port"))
        .stdout(predicate::str::contains("--handlers"))
        .stdout(predicate::str::contains("--migrations"))
        .stdout(predicate::str::contains("file://migrations"))
        .stdout(predicate::str::contains("7946"));
}

#[test]
fn query_without_a_node_fails() {
    // Port 1 is privileged and never has a shout node behind it.
    Command::new(assert_cmd::cargo::cargo_bin!("shout"))
        .args(["--rpc-addr", "127.0.0.1:1", "query", "get_user", r#"{"id":1}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no node reachable at 127.0.0.1:1"));
}

#[test]
fn run_fails_when_database_cannot_be_opened() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let db = dir.path().join("missing/dir/db.sqlite");
    Command::new(assert_cmd::cargo::cargo_bin!("shout"))
        .env_remove("RUST_LOG")
        .args(["--rpc-addr", "127.0.0.1:0", "run", "--node", "t"])
        .arg("--db")
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("open database"));
}

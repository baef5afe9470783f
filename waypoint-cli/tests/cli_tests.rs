//! Integration tests for the Waypoint CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the waypoint binary
#[allow(deprecated)]
fn waypoint_cmd() -> Command {
    let mut cmd = Command::cargo_bin("waypoint").unwrap();
    cmd.env_remove("DATABASE_URL").env_remove("RUST_LOG");
    cmd
}

fn sql_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_help_command() {
    waypoint_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Waypoint"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("rewind"))
        .stdout(predicate::str::contains("step"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("create"));
}

#[test]
fn test_version_command() {
    waypoint_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_run_flags_in_help() {
    waypoint_cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--plan-only"))
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--no-lock"))
        .stdout(predicate::str::contains("--database-url"));
}

#[test]
fn test_create_reversible() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("migrations");

    waypoint_cmd()
        .current_dir(temp.path())
        .args(["create", "Add Users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created migration"));

    let names = sql_files(&dir);
    assert_eq!(names.len(), 2);
    assert!(names[0].ends_with("_add_users.do.sql"), "{names:?}");
    assert!(names[1].ends_with("_add_users.undo.sql"), "{names:?}");
}

#[test]
fn test_create_irreversible_with_custom_dir() {
    let temp = TempDir::new().unwrap();

    waypoint_cmd()
        .current_dir(temp.path())
        .args(["create", "seed_data", "--irreversible", "--migrations", "db"])
        .assert()
        .success();

    let names = sql_files(&temp.path().join("db"));
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with("_seed_data.do.sql"));
}

#[test]
fn test_create_uses_config_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("waypoint.toml"),
        "[migrations]\ndirectory = \"sql\"\n",
    )
    .unwrap();

    waypoint_cmd()
        .current_dir(temp.path())
        .args(["create", "first"])
        .assert()
        .success();

    assert_eq!(sql_files(&temp.path().join("sql")).len(), 2);
}

#[test]
fn test_invalid_config_file() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("waypoint.toml"), "[migrations\n").unwrap();

    waypoint_cmd()
        .current_dir(temp.path())
        .args(["create", "first"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse TOML"));
}

#[test]
fn test_migrate_requires_database_url() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("migrations")).unwrap();

    waypoint_cmd()
        .current_dir(temp.path())
        .args(["migrate", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no database URL"));
}

#[test]
fn test_migrate_requires_migrations_dir() {
    let temp = TempDir::new().unwrap();

    waypoint_cmd()
        .current_dir(temp.path())
        .args(["migrate", "--database-url", "postgres://localhost/app"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_rejects_unsafe_table_name() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("migrations")).unwrap();

    waypoint_cmd()
        .current_dir(temp.path())
        .env("DATABASE_URL", "postgres://localhost/app")
        .args(["status", "--table", "ledger; drop table users"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid ledger table name"));
}

#[test]
fn test_step_requires_a_number() {
    waypoint_cmd()
        .args(["step", "forward"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

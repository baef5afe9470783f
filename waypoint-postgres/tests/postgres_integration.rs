//! Integration tests against a live PostgreSQL server.
//!
//! Run with `WAYPOINT_TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use waypoint_migrate::{
    ExecutionContext, MigrationError, Migrator, Operation, SqlFileSource, Target, TargetConfig,
};
use waypoint_postgres::{PgExecutor, PgPool, PgTarget};

fn database_url() -> String {
    std::env::var("WAYPOINT_TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/waypoint_test".to_string())
}

fn write(dir: &std::path::Path, name: &str, sql: &str) {
    std::fs::write(dir.join(name), sql).unwrap();
}

fn ids(actions: &[waypoint_migrate::Action]) -> Vec<&str> {
    actions.iter().map(|a| a.id()).collect()
}

fn target(pool: &PgPool, table: &str) -> PgTarget {
    PgTarget::new(pool.clone(), TargetConfig::new().table_name(table)).unwrap()
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_ledger_lifecycle() {
    let pool = PgPool::from_url(&database_url()).unwrap();
    let ledger = target(&pool, "_waypoint_ledger_lifecycle");

    ledger.destroy().await.unwrap();
    assert!(!ledger.exists().await.unwrap());
    ledger.create().await.unwrap();
    ledger.create().await.unwrap();
    assert!(ledger.exists().await.unwrap());

    ledger.add("002").await.unwrap();
    ledger.add("001").await.unwrap();
    assert_eq!(ledger.done().await.unwrap(), vec!["001", "002"]);
    assert!(matches!(
        ledger.add("001").await,
        Err(MigrationError::AlreadyApplied(_))
    ));

    ledger.start_migration("003").await.unwrap();
    assert!(matches!(
        ledger.done().await,
        Err(MigrationError::DirtyMigration(id)) if id == "003"
    ));
    ledger.finish_migration("003").await.unwrap();
    assert_eq!(ledger.current().await.unwrap(), "003");

    ledger.remove("003").await.unwrap();
    assert!(matches!(
        ledger.remove("003").await,
        Err(MigrationError::MigrationNotFound(_))
    ));

    ledger.destroy().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_advisory_lock_excludes_second_holder() {
    let pool = PgPool::from_url(&database_url()).unwrap();
    let ledger = target(&pool, "_waypoint_ledger_lock");

    let lock = ledger.lock().await.unwrap();

    let second = tokio::time::timeout(Duration::from_millis(300), ledger.lock()).await;
    assert!(second.is_err(), "second lock should block while the first is held");

    lock.release().await.unwrap();

    let again = ledger.lock().await.unwrap();
    again.release().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_cancelled_lock_wait_leaves_lock_free() {
    let pool = PgPool::from_url(&database_url()).unwrap();
    let ledger = target(&pool, "_waypoint_ledger_lock_cancel");

    let held = ledger.lock().await.unwrap();

    let ctx = ExecutionContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });
    let waited = ctx.guard(ledger.lock()).await;
    assert!(matches!(waited, Err(MigrationError::Cancelled)));

    held.release().await.unwrap();

    // The abandoned session must not have picked the lock up.
    let again = tokio::time::timeout(Duration::from_secs(5), ledger.lock())
        .await
        .expect("lock should be free after the cancelled wait")
        .unwrap();
    again.release().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_plan_does_not_create_ledger() {
    let pool = PgPool::from_url(&database_url()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "20240101000000_noop.sql", "SELECT 1;");

    let ledger = target(&pool, "_waypoint_ledger_readonly");
    ledger.destroy().await.unwrap();

    let source = SqlFileSource::new(dir.path(), Arc::new(PgExecutor::new(pool.clone())));
    let migrator = Migrator::new(source, ledger);

    let plan = migrator.plan(&Operation::Migrate).await.unwrap();
    assert_eq!(plan.len(), 1);
    let status = migrator.status().await.unwrap();
    assert_eq!(status.pending_count(), 1);
    assert!(!migrator.target().exists().await.unwrap());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn test_migrate_and_reset_sql_files() {
    const WIDGETS: &str = "20240101000001";
    const NAME: &str = "20240101000002";

    let pool = PgPool::from_url(&database_url()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    write(
        dir.path(),
        "20240101000001_create_widgets.do.sql",
        "CREATE TABLE waypoint_widgets (id SERIAL PRIMARY KEY);",
    );
    write(dir.path(), "20240101000001_create_widgets.undo.sql", "DROP TABLE waypoint_widgets;");
    write(
        dir.path(),
        "20240101000002_add_name.do.sql",
        "ALTER TABLE waypoint_widgets ADD COLUMN name TEXT;",
    );
    write(
        dir.path(),
        "20240101000002_add_name.undo.sql",
        "ALTER TABLE waypoint_widgets DROP COLUMN name;",
    );

    let ledger = target(&pool, "_waypoint_ledger_files");
    ledger.destroy().await.unwrap();

    let source = SqlFileSource::new(dir.path(), Arc::new(PgExecutor::new(pool.clone())));
    let migrator = Migrator::new(source, ledger);
    let ctx = ExecutionContext::new();

    let response = migrator.run(&ctx, &Operation::Migrate).await.unwrap();
    assert_eq!(ids(&response.successful), vec![WIDGETS, NAME]);

    let response = migrator.run(&ctx, &Operation::Reset).await.unwrap();
    assert_eq!(ids(&response.successful), vec![NAME, WIDGETS, WIDGETS, NAME]);

    let response = migrator.run(&ctx, &Operation::Rewind).await.unwrap();
    assert_eq!(ids(&response.successful), vec![NAME, WIDGETS]);
    assert!(migrator.target().done().await.unwrap().is_empty());

    migrator.target().destroy().await.unwrap();
}

//! Migration ledger stored in a PostgreSQL table.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex_lite::Regex;
use tracing::{debug, info};
use waypoint_migrate::{MigrateResult, MigrationError, MigrationLock, Target, TargetConfig};

use crate::error::{PgError, PgResult};
use crate::lock::{acquire_advisory_lock, lock_key, AdvisoryUnlocker};
use crate::pool::PgPool;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid identifier pattern")
});

/// Validate a possibly schema-qualified table name and quote each part.
pub fn quote_table_name(name: &str) -> PgResult<String> {
    if name.len() > 127 || !IDENTIFIER.is_match(name) {
        return Err(PgError::config(format!("invalid ledger table name '{}'", name)));
    }

    Ok(name
        .split('.')
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join("."))
}

/// Statements for one ledger table.
#[derive(Debug, Clone)]
struct LedgerSql {
    table: String,
    exists: String,
    create: String,
    destroy: String,
    select: String,
    add: String,
    remove: String,
    start: String,
    finish: String,
}

impl LedgerSql {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            exists: "SELECT to_regclass($1) IS NOT NULL".to_string(),
            create: format!(
                "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, dirty BOOLEAN NOT NULL DEFAULT TRUE)",
                table
            ),
            destroy: format!("DROP TABLE IF EXISTS {}", table),
            select: format!("SELECT id, dirty FROM {} ORDER BY id COLLATE \"C\"", table),
            add: format!("INSERT INTO {} (id, dirty) VALUES ($1, FALSE)", table),
            remove: format!("DELETE FROM {} WHERE id = $1", table),
            start: format!(
                "INSERT INTO {} (id, dirty) VALUES ($1, TRUE) ON CONFLICT (id) DO UPDATE SET dirty = TRUE",
                table
            ),
            finish: format!("UPDATE {} SET dirty = FALSE WHERE id = $1", table),
        }
    }
}

/// A [`Target`] backed by a PostgreSQL table.
///
/// With [`Driver::Postgres`](waypoint_migrate::Driver::Postgres) the lock is a session-level advisory lock keyed
/// by the database and table names, held on a dedicated pooled connection.
/// [`Driver::Generic`](waypoint_migrate::Driver::Generic) uses no lock.
pub struct PgTarget {
    pool: PgPool,
    config: TargetConfig,
    sql: LedgerSql,
}

impl PgTarget {
    /// Create a ledger target on `pool`.
    pub fn new(pool: PgPool, config: TargetConfig) -> PgResult<Self> {
        let table = quote_table_name(&config.table_name)?;
        Ok(Self {
            pool,
            sql: LedgerSql::new(&table),
            config,
        })
    }

    /// The pool used for ledger statements.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The ledger configuration.
    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    async fn execute_one(&self, sql: &str, id: &str) -> PgResult<u64> {
        let conn = self.pool.get().await?;
        conn.execute(sql, &[&id]).await
    }

    async fn database_name(&self) -> PgResult<String> {
        if let Some(name) = &self.config.database_name {
            return Ok(name.clone());
        }
        let conn = self.pool.get().await?;
        let row = conn.query_one("SELECT current_database()", &[]).await?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl Target for PgTarget {
    async fn create(&self) -> MigrateResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(&self.sql.create).await?;
        debug!(table = %self.config.table_name, "Ledger table ready");
        Ok(())
    }

    async fn destroy(&self) -> MigrateResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(&self.sql.destroy).await?;
        info!(table = %self.config.table_name, "Ledger table dropped");
        Ok(())
    }

    async fn exists(&self) -> MigrateResult<bool> {
        let conn = self.pool.get().await?;
        let row = conn.query_one(&self.sql.exists, &[&self.sql.table]).await?;
        Ok(row.get(0))
    }

    async fn done(&self) -> MigrateResult<Vec<String>> {
        let conn = self.pool.get().await?;
        let rows = conn.query(&self.sql.select, &[]).await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get(0);
            let dirty: bool = row.get(1);
            if dirty {
                return Err(MigrationError::DirtyMigration(id));
            }
            ids.push(id);
        }
        Ok(ids)
    }

    async fn add(&self, id: &str) -> MigrateResult<()> {
        match self.execute_one(&self.sql.add, id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => Err(MigrationError::AlreadyApplied(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, id: &str) -> MigrateResult<()> {
        match self.execute_one(&self.sql.remove, id).await? {
            0 => Err(MigrationError::MigrationNotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    async fn start_migration(&self, id: &str) -> MigrateResult<()> {
        self.execute_one(&self.sql.start, id).await?;
        Ok(())
    }

    async fn finish_migration(&self, id: &str) -> MigrateResult<()> {
        match self.execute_one(&self.sql.finish, id).await? {
            0 => Err(MigrationError::MigrationNotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    async fn lock(&self) -> MigrateResult<MigrationLock> {
        if !self.config.driver.supports_locking() {
            debug!(driver = %self.config.driver, "Driver has no lock; continuing unlocked");
            return Ok(MigrationLock::noop());
        }

        let database = self.database_name().await?;
        let key = lock_key(&database, &self.config.table_name);

        let conn = self.pool.get().await?;
        info!(key, database = %database, table = %self.config.table_name, "Waiting for advisory lock");
        let conn = acquire_advisory_lock(conn, key).await?;
        info!(key, "Acquired advisory lock");

        Ok(MigrationLock::new(key, AdvisoryUnlocker::new(conn, key)))
    }
}

impl std::fmt::Debug for PgTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTarget")
            .field("database", &self.pool.config().database)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_table_name() {
        assert_eq!(quote_table_name("_migrations").unwrap(), "\"_migrations\"");
        assert_eq!(
            quote_table_name("ops.schema_log").unwrap(),
            "\"ops\".\"schema_log\""
        );
    }

    #[test]
    fn test_rejects_unsafe_table_names() {
        for name in ["", "1table", "a;drop table x", "a.b.c", "\"quoted\"", "with space"] {
            assert!(quote_table_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_ledger_sql() {
        let sql = LedgerSql::new("\"_migrations\"");
        assert_eq!(
            sql.create,
            "CREATE TABLE IF NOT EXISTS \"_migrations\" (id TEXT PRIMARY KEY, dirty BOOLEAN NOT NULL DEFAULT TRUE)"
        );
        assert!(sql.start.contains("ON CONFLICT (id) DO UPDATE SET dirty = TRUE"));
        assert!(sql.select.ends_with("ORDER BY id COLLATE \"C\""));
        assert_eq!(sql.table, "\"_migrations\"");
        assert_eq!(sql.exists, "SELECT to_regclass($1) IS NOT NULL");
        assert_eq!(sql.finish, "UPDATE \"_migrations\" SET dirty = FALSE WHERE id = $1");
    }

    #[tokio::test]
    async fn test_new_validates_table() {
        let pool = PgPool::from_url("postgres://localhost/app").unwrap();
        let err = PgTarget::new(pool, TargetConfig::new().table_name("bad name")).unwrap_err();
        assert!(matches!(err, PgError::Config(_)));
    }
}

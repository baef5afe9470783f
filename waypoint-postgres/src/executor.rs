//! Runs migration file bodies against PostgreSQL.

use async_trait::async_trait;
use waypoint_migrate::{BoxError, SqlExecutor};

use crate::pool::PgPool;

/// Executes SQL migration files on a pooled connection.
///
/// A file is sent with the simple query protocol, so a multi-statement body
/// runs as one implicit transaction unless it manages transactions itself.
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Create an executor on `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> Result<(), BoxError> {
        let conn = self.pool.get().await?;
        conn.batch_execute(sql).await?;
        Ok(())
    }
}

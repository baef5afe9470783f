//! PostgreSQL connection wrapper.

use deadpool_postgres::Object;
use tokio_postgres::types::ToSql;
use tokio_postgres::{CancelToken, Row};
use tracing::debug;

use crate::error::PgResult;

/// A pooled PostgreSQL connection.
pub struct PgConnection {
    client: Object,
}

impl PgConnection {
    pub(crate) fn new(client: Object) -> Self {
        Self { client }
    }

    /// Execute a query and return exactly one row.
    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Row> {
        debug!(sql = %sql, "Executing query_one");
        Ok(self.client.query_one(sql, params).await?)
    }

    /// Execute a query and return all rows.
    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        debug!(sql = %sql, "Executing query");
        Ok(self.client.query(sql, params).await?)
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<u64> {
        debug!(sql = %sql, "Executing statement");
        Ok(self.client.execute(sql, params).await?)
    }

    /// Execute one or more statements without parameters.
    pub async fn batch_execute(&self, sql: &str) -> PgResult<()> {
        debug!(bytes = sql.len(), "Executing batch");
        Ok(self.client.batch_execute(sql).await?)
    }

    /// Token for cancelling the query running on this session.
    pub fn cancel_token(&self) -> CancelToken {
        self.client.cancel_token()
    }

    /// Close the underlying session instead of returning it to the pool.
    pub fn discard(self) {
        drop(Object::take(self.client));
    }
}

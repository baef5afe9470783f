//! Session-scoped advisory locks.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio_postgres::NoTls;
use tracing::{debug, info, warn};
use waypoint_migrate::{MigrateResult, MigrationError, Unlocker};

use crate::connection::PgConnection;
use crate::error::{PgError, PgResult};

/// Lock key for a ledger: the first 8 bytes of SHA-256 over `"{database}|||{table}"`.
///
/// Every process migrating the same ledger derives the same key.
pub fn lock_key(database: &str, table: &str) -> i64 {
    let digest = Sha256::digest(format!("{}|||{}", database, table).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// A session waiting in `pg_advisory_lock`.
///
/// Dropped before the wait completes, it cancels the query and closes the
/// session, so the server can never grant the lock to a pooled connection.
struct PendingLock {
    conn: Option<PgConnection>,
    key: i64,
}

impl PendingLock {
    async fn wait(&self) -> PgResult<()> {
        if let Some(conn) = &self.conn {
            conn.query_one("SELECT pg_advisory_lock($1)", &[&self.key])
                .await
                .map_err(|e| PgError::lock(e.to_string()))?;
        }
        Ok(())
    }

    fn into_held(mut self) -> PgResult<PgConnection> {
        self.conn
            .take()
            .ok_or_else(|| PgError::lock("advisory lock session already closed"))
    }
}

impl Drop for PendingLock {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        let key = self.key;
        let cancel = conn.cancel_token();
        conn.discard();
        warn!(key, "Abandoned advisory lock wait; closing the session");

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = cancel.cancel_query(NoTls).await {
                    debug!(key, error = %e, "Cancel request for advisory lock wait failed");
                }
            });
        }
    }
}

/// Block until `conn` holds the advisory lock `key`.
///
/// Dropping the returned future before it resolves leaves no lock behind.
pub(crate) async fn acquire_advisory_lock(conn: PgConnection, key: i64) -> PgResult<PgConnection> {
    let pending = PendingLock {
        conn: Some(conn),
        key,
    };
    pending.wait().await?;
    pending.into_held()
}

/// Holds the connection that owns an advisory lock until it is released.
pub(crate) struct AdvisoryUnlocker {
    conn: Option<PgConnection>,
    key: i64,
}

impl AdvisoryUnlocker {
    pub(crate) fn new(conn: PgConnection, key: i64) -> Self {
        Self {
            conn: Some(conn),
            key,
        }
    }
}

#[async_trait]
impl Unlocker for AdvisoryUnlocker {
    async fn unlock(&mut self) -> MigrateResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        let released = conn
            .query_one("SELECT pg_advisory_unlock($1)", &[&self.key])
            .await
            .map(|row| row.get::<_, bool>(0));

        match released {
            Ok(true) => {
                info!(key = self.key, "Released advisory lock");
                Ok(())
            }
            Ok(false) => {
                // Closing the session drops every advisory lock it holds.
                conn.discard();
                Err(MigrationError::lock_failed(format!(
                    "advisory lock {} was not held by this session",
                    self.key
                )))
            }
            Err(e) => {
                warn!(key = self.key, error = %e, "Unlock failed; closing the session");
                conn.discard();
                Err(MigrationError::lock_failed(e.to_string()))
            }
        }
    }
}

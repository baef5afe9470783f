//! Connection pool for PostgreSQL.

use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use crate::config::PgConfig;
use crate::connection::PgConnection;
use crate::error::{PgError, PgResult};

/// A connection pool for PostgreSQL.
#[derive(Clone)]
pub struct PgPool {
    inner: Pool,
    config: Arc<PgConfig>,
}

impl PgPool {
    /// Create a new connection pool from configuration.
    pub fn new(config: PgConfig) -> PgResult<Self> {
        Self::with_pool_config(config, PoolConfig::default())
    }

    /// Create a pool straight from a database URL.
    pub fn from_url(url: &str) -> PgResult<Self> {
        Self::new(PgConfig::from_url(url)?)
    }

    /// Create a new connection pool with custom pool configuration.
    pub fn with_pool_config(config: PgConfig, pool_config: PoolConfig) -> PgResult<Self> {
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(config.to_pg_config(), NoTls, mgr_config);

        let pool = Pool::builder(mgr)
            .runtime(Runtime::Tokio1)
            .max_size(pool_config.max_connections)
            .wait_timeout(pool_config.connection_timeout)
            .create_timeout(pool_config.connection_timeout)
            .build()
            .map_err(|e| PgError::config(format!("failed to create pool: {}", e)))?;

        info!(
            host = %config.host,
            port = %config.port,
            database = %config.database,
            max_connections = %pool_config.max_connections,
            "PostgreSQL connection pool created"
        );

        Ok(Self {
            inner: pool,
            config: Arc::new(config),
        })
    }

    /// Get a connection from the pool.
    pub async fn get(&self) -> PgResult<PgConnection> {
        debug!("Acquiring connection from pool");
        let client = self.inner.get().await?;
        Ok(PgConnection::new(client))
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// Close the pool and all connections.
    pub fn close(&self) {
        self.inner.close();
        info!("PostgreSQL connection pool closed");
    }
}

/// Configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: usize,
    /// Maximum time to wait for a connection.
    pub connection_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        // One connection stays pinned by the advisory lock for the whole run.
        Self {
            max_connections: 4,
            connection_timeout: Some(Duration::from_secs(30)),
        }
    }
}

//! Error types for PostgreSQL operations.

use thiserror::Error;
use waypoint_migrate::MigrationError;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Advisory lock error.
    #[error("lock error: {0}")]
    Lock(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a lock error.
    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Pool(_) => true,
            Self::Postgres(e) => e.is_closed(),
            _ => false,
        }
    }

    /// Check if the server rejected a duplicate key.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Postgres(e) if e.code().is_some_and(|c| c.code() == UNIQUE_VIOLATION))
    }
}

impl From<PgError> for MigrationError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Config(msg) => MigrationError::Config(msg),
            PgError::Lock(msg) => MigrationError::LockFailed(msg),
            other => MigrationError::database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PgError::config("invalid URL");
        assert!(matches!(err, PgError::Config(_)));
        assert!(!err.is_connection_error());
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_into_migration_error() {
        let err: MigrationError = PgError::config("bad table").into();
        assert!(matches!(err, MigrationError::Config(msg) if msg == "bad table"));

        let err: MigrationError = PgError::lock("unlock returned false").into();
        assert!(matches!(err, MigrationError::LockFailed(_)));
    }
}

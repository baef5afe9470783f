//! Error types for the migration engine.

use thiserror::Error;

use crate::migration::ActionKind;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Boxed error returned by user-supplied migration steps.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while loading, planning or executing migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger storage error.
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid migration definition or file layout.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Two migrations with the same ID were added to one catalog.
    #[error("Migration '{0}' is already registered")]
    DuplicateId(String),

    /// Migration (or ledger entry) not found.
    #[error("Migration '{0}' not found")]
    MigrationNotFound(String),

    /// The catalog is empty.
    #[error("No migrations available")]
    NoMigrationsAvailable,

    /// Nothing has been applied to the target yet.
    #[error("No migration has been applied")]
    NoCurrentMigration,

    /// A ledger entry was left dirty by an interrupted or failed run.
    #[error("Migration '{0}' is dirty; fix the target manually before running again")]
    DirtyMigration(String),

    /// An applied migration no longer matches the catalog at its position.
    #[error("Migration '{id}' is stale{}", expected_suffix(.expected))]
    StaleMigration {
        /// Applied migration ID.
        id: String,
        /// Catalog ID found at the same position, if any.
        expected: Option<String>,
    },

    /// The target has applied a migration newer than anything in the catalog.
    #[error("Current migration '{current}' is more recent than the latest known migration '{latest}'")]
    CurrentMigrationMoreRecent {
        /// Applied migration ID.
        current: String,
        /// Newest catalog ID.
        latest: String,
    },

    /// A resolver produced a destination that is not in the catalog.
    #[error("Migration '{0}' is not listed in the catalog")]
    MigrationNotListed(String),

    /// A step resolver walked past either end of the history.
    #[error("Step {step:+} is out of bounds")]
    StepOutOfBounds {
        /// Requested step.
        step: i64,
    },

    /// The plan wants to undo a migration that has no undo step.
    #[error("Migration '{0}' cannot be undone")]
    MigrationNotUndoable(String),

    /// Unrecognised action kind.
    #[error("Invalid action '{0}'")]
    InvalidAction(String),

    /// Ledger already holds the migration.
    #[error("Migration '{0}' has already been applied")]
    AlreadyApplied(String),

    /// Lock acquisition or release failed.
    #[error("Failed to acquire migration lock: {0}")]
    LockFailed(String),

    /// The execution context was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// A migration step returned an error.
    #[error("Migration '{id}' failed during {kind}: {source}")]
    Failed {
        /// Migration ID.
        id: String,
        /// Direction that failed.
        kind: ActionKind,
        /// Error returned by the step.
        #[source]
        source: BoxError,
    },
}

fn expected_suffix(expected: &Option<String>) -> String {
    match expected {
        Some(id) => format!(" (expected '{}' at its position)", id),
        None => String::new(),
    }
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a lock failed error.
    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::LockFailed(msg.into())
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// ID of the migration this error is about, when there is one.
    pub fn migration_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateId(id)
            | Self::MigrationNotFound(id)
            | Self::DirtyMigration(id)
            | Self::MigrationNotListed(id)
            | Self::MigrationNotUndoable(id)
            | Self::AlreadyApplied(id) => Some(id),
            Self::StaleMigration { id, .. } | Self::Failed { id, .. } => Some(id),
            Self::CurrentMigrationMoreRecent { current, .. } => Some(current),
            _ => None,
        }
    }

    /// SQL text of the statement that failed, for failures raised by SQL steps.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Failed { source, .. } => source
                .downcast_ref::<QueryError>()
                .map(|err| err.query.as_str()),
            _ => None,
        }
    }

    /// Problems with the catalog itself.
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateId(_) | Self::MigrationNotFound(_) | Self::NoMigrationsAvailable
        )
    }

    /// The ledger disagrees with the catalog or was left in a partial state.
    pub fn is_ledger_inconsistency(&self) -> bool {
        matches!(
            self,
            Self::DirtyMigration(_)
                | Self::StaleMigration { .. }
                | Self::CurrentMigrationMoreRecent { .. }
        )
    }

    /// No destination could be computed for the request.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Self::MigrationNotListed(_) | Self::StepOutOfBounds { .. }
        )
    }
}

/// A failed SQL statement, carrying the statement text.
#[derive(Debug, Error)]
#[error("query failed: {source}")]
pub struct QueryError {
    /// Statement text.
    pub query: String,
    /// Driver error.
    #[source]
    pub source: BoxError,
}

impl QueryError {
    /// Wrap a driver error together with the statement that caused it.
    pub fn new(query: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            query: query.into(),
            source: source.into(),
        }
    }
}

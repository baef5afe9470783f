//! CLI error types and result alias.

use miette::Diagnostic;
use thiserror::Error;
use waypoint_migrate::{ExecutionError, MigrationError};

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Process exit codes
pub mod exit_code {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// General or configuration error
    pub const GENERAL: i32 = 1;
    /// The plan was empty
    pub const NOTHING_TO_DO: i32 = 10;
    /// No plan could be computed
    pub const PLANNING_FAILED: i32 = 11;
    /// The user declined or interrupted the run
    pub const CANCELLED: i32 = 12;
    /// A migration failed while executing
    pub const EXECUTION_FAILED: i32 = 13;
}

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(waypoint::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(waypoint::config))]
    Config(String),

    /// Backend setup error
    #[error("Database error: {0}")]
    #[diagnostic(code(waypoint::database))]
    Database(String),

    /// The plan was empty
    #[error("Nothing to do")]
    #[diagnostic(code(waypoint::nothing_to_do))]
    NothingToDo,

    /// No plan could be computed
    #[error("Planning failed: {0}")]
    #[diagnostic(
        code(waypoint::planning),
        help("run `waypoint status` to compare the ledger with the migration files")
    )]
    Planning(#[source] MigrationError),

    /// The user declined or interrupted the run
    #[error("Cancelled")]
    #[diagnostic(code(waypoint::cancelled))]
    Cancelled,

    /// A migration failed while executing
    #[error("Execution failed: {0}")]
    #[diagnostic(code(waypoint::execution))]
    Execution(#[source] MigrationError),

    /// Any other engine error
    #[error("Migration error: {0}")]
    #[diagnostic(code(waypoint::migration))]
    Migration(#[source] MigrationError),
}

impl CliError {
    /// Exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NothingToDo => exit_code::NOTHING_TO_DO,
            Self::Planning(_) => exit_code::PLANNING_FAILED,
            Self::Cancelled => exit_code::CANCELLED,
            Self::Execution(_) => exit_code::EXECUTION_FAILED,
            Self::Io(_) | Self::Config(_) | Self::Database(_) | Self::Migration(_) => {
                exit_code::GENERAL
            }
        }
    }

    /// Classify an error raised while loading the catalog or planning
    pub fn planning(err: MigrationError) -> Self {
        match err {
            MigrationError::Cancelled => Self::Cancelled,
            e if e.is_catalog_error() || e.is_ledger_inconsistency() || e.is_planning_error() => {
                Self::Planning(e)
            }
            e @ MigrationError::InvalidMigration(_) => Self::Planning(e),
            e => Self::Migration(e),
        }
    }
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Config(msg) => Self::Config(msg),
            MigrationError::Cancelled => Self::Cancelled,
            e => Self::Migration(e),
        }
    }
}

impl From<ExecutionError> for CliError {
    fn from(err: ExecutionError) -> Self {
        // Failures before any action ran come from locking or planning.
        if err.response.errored.is_empty() {
            return match err.into_inner() {
                MigrationError::MigrationNotUndoable(id) => {
                    Self::Execution(MigrationError::MigrationNotUndoable(id))
                }
                e => Self::planning(e),
            };
        }

        match err.into_inner() {
            MigrationError::Cancelled => Self::Cancelled,
            e => Self::Execution(e),
        }
    }
}

impl From<waypoint_postgres::PgError> for CliError {
    fn from(err: waypoint_postgres::PgError) -> Self {
        match err {
            waypoint_postgres::PgError::Config(msg) => Self::Config(msg),
            e => Self::Database(e.to_string()),
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Config(format!("Failed to serialize JSON: {}", err))
    }
}

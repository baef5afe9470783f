//! Configuration for migrators and ledgers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;
use crate::reporter::{NoopReporter, Reporter};

/// Default ledger table name.
pub const DEFAULT_TABLE_NAME: &str = "_migrations";

/// Locking capability of a SQL ledger, chosen at configuration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// Plain SQL; no cross-process lock.
    Generic,
    /// PostgreSQL advisory locks.
    #[default]
    Postgres,
}

impl Driver {
    /// Whether this driver can take a cross-process lock.
    pub fn supports_locking(&self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => f.write_str("generic"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

impl FromStr for Driver {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "sql" => Ok(Self::Generic),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(MigrationError::config(format!("unknown driver '{}'", other))),
        }
    }
}

/// Settings for a SQL ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Ledger table, optionally schema-qualified.
    pub table_name: String,
    /// Locking driver.
    pub driver: Driver,
    /// Database name used in the lock key. Looked up when unset.
    pub database_name: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            driver: Driver::default(),
            database_name: None,
        }
    }
}

impl TargetConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ledger table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set the driver.
    pub fn driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    /// Set the database name used for the lock key.
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }
}

/// Settings for a [`Migrator`](crate::Migrator) run.
#[derive(Clone)]
pub struct MigratorConfig {
    /// Hold the target lock for the whole run.
    pub lock: bool,
    /// Create the ledger before planning.
    pub create: bool,
    /// Progress sink.
    pub reporter: Arc<dyn Reporter>,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            lock: true,
            create: true,
            reporter: Arc::new(NoopReporter),
        }
    }
}

impl MigratorConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable locking.
    pub fn lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// Enable or disable ledger creation.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Set the reporter.
    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }
}

impl fmt::Debug for MigratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigratorConfig")
            .field("lock", &self.lock)
            .field("create", &self.create)
            .finish_non_exhaustive()
    }
}

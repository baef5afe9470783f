//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use waypoint_migrate::{Driver, TargetConfig, DEFAULT_TABLE_NAME};

use crate::cli::GlobalArgs;
use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "waypoint.toml";

/// Default migrations directory (relative to project root)
pub const MIGRATIONS_DIR: &str = "migrations";

/// Waypoint CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Migration configuration
    pub migrations: MigrationConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> CliResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, args: &GlobalArgs) -> Self {
        if let Some(url) = &args.database_url {
            self.database.url = Some(url.clone());
        }
        if let Some(driver) = args.driver {
            self.database.driver = driver.into();
        }
        if let Some(dir) = &args.migrations {
            self.migrations.directory = dir.clone();
        }
        if let Some(table) = &args.table {
            self.migrations.table_name = table.clone();
        }
        self
    }

    /// The database URL, which must be set by now
    pub fn database_url(&self) -> CliResult<&str> {
        self.database.url.as_deref().ok_or_else(|| {
            CliError::Config(format!(
                "no database URL; set DATABASE_URL, pass --database-url or add [database] url to {}",
                CONFIG_FILE_NAME
            ))
        })
    }

    /// Ledger settings for the engine
    pub fn target_config(&self) -> TargetConfig {
        let config = TargetConfig::new()
            .table_name(&self.migrations.table_name)
            .driver(self.database.driver);
        match &self.database.database_name {
            Some(name) => config.database_name(name),
            None => config,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: Option<String>,

    /// Locking driver (generic, postgres)
    pub driver: Driver,

    /// Database name used for the lock key
    pub database_name: Option<String>,
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory for migration files
    pub directory: PathBuf,

    /// Migration table name
    pub table_name: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(MIGRATIONS_DIR),
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }
}

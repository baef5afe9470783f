//! CLI command implementations.

pub mod create;
pub mod run;
pub mod status;
pub mod version;

use std::sync::Arc;

use waypoint_migrate::{Migrator, MigratorConfig, Session, SqlFileSource};
use waypoint_postgres::{PgExecutor, PgPool, PgTarget};

use crate::cli::GlobalArgs;
use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::output;

/// Migrator over SQL files and a PostgreSQL ledger.
pub type SqlMigrator = Migrator<SqlFileSource, PgTarget>;

/// A locked [`SqlMigrator`] run.
pub type SqlSession<'m> = Session<'m, SqlFileSource, PgTarget>;

/// Load `waypoint.toml` (if present) and apply command-line overrides.
pub fn load_config(global: &GlobalArgs) -> CliResult<Config> {
    Ok(Config::load_or_default(&global.config)?.with_overrides(global))
}

/// Connect to the database and build a migrator for the configured directory.
pub fn connect(config: &Config, settings: MigratorConfig) -> CliResult<SqlMigrator> {
    let dir = &config.migrations.directory;
    if !dir.is_dir() {
        return Err(CliError::Config(format!(
            "migrations directory '{}' does not exist",
            dir.display()
        )));
    }

    let pool = PgPool::from_url(config.database_url()?)?;
    let source = SqlFileSource::new(dir.clone(), Arc::new(PgExecutor::new(pool.clone())));
    let target = PgTarget::new(pool, config.target_config())?;

    Ok(Migrator::with_config(source, target, settings))
}

/// Print where migrations come from and where they are recorded.
pub fn print_settings(config: &Config) {
    output::kv("Migrations", &config.migrations.directory.display().to_string());
    output::kv("Ledger", &config.migrations.table_name);
    output::kv("Driver", &config.database.driver.to_string());
    output::newline();
}

//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use waypoint_migrate::{Driver, Operation};

/// Waypoint - Ordered, reversible database migrations
#[derive(Parser, Debug)]
#[command(name = "waypoint")]
#[command(version)]
#[command(about = "Waypoint - Ordered, reversible database migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = crate::config::CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Database connection URL
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Directory holding migration files
    #[arg(long, global = true)]
    pub migrations: Option<PathBuf>,

    /// Ledger table name
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Locking driver for the ledger
    #[arg(long, global = true)]
    pub driver: Option<DriverArg>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply all pending migrations
    Migrate(RunArgs),

    /// Undo every applied migration
    Rewind(RunArgs),

    /// Undo every applied migration, then apply all of them again
    Reset(RunArgs),

    /// Apply the next pending migration
    Do(RunArgs),

    /// Undo the most recently applied migration
    Undo(RunArgs),

    /// Move a number of migrations forward (positive) or backward (negative)
    Step(StepArgs),

    /// Move forward or backward to a specific migration
    To(ToArgs),

    /// Show which migrations are applied
    Status(StatusArgs),

    /// Create new migration files
    Create(CreateArgs),

    /// Display version information
    Version,
}

impl Command {
    /// The engine operation and run flags for commands that move the ledger.
    pub fn operation(&self) -> Option<(Operation, &RunArgs)> {
        match self {
            Self::Migrate(run) => Some((Operation::Migrate, run)),
            Self::Rewind(run) => Some((Operation::Rewind, run)),
            Self::Reset(run) => Some((Operation::Reset, run)),
            Self::Do(run) => Some((Operation::Do, run)),
            Self::Undo(run) => Some((Operation::Undo, run)),
            Self::Step(args) => Some((Operation::Step(args.count), &args.run)),
            Self::To(args) => Some((Operation::To(args.id.clone()), &args.run)),
            Self::Status(_) | Self::Create(_) | Self::Version => None,
        }
    }
}

// =============================================================================
// Run Commands
// =============================================================================

/// Flags shared by commands that execute a plan
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Print the plan without executing it
    #[arg(short, long)]
    pub plan_only: bool,

    /// Execute without asking for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Do not take the ledger lock
    #[arg(long)]
    pub no_lock: bool,
}

/// Arguments for the `step` command
#[derive(Args, Debug)]
pub struct StepArgs {
    /// Number of migrations to move; negative values undo
    #[arg(allow_negative_numbers = true)]
    pub count: i64,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Arguments for the `to` command
#[derive(Args, Debug)]
pub struct ToArgs {
    /// ID of the migration to end on
    pub id: String,

    #[command(flatten)]
    pub run: RunArgs,
}

// =============================================================================
// Status Command
// =============================================================================

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

// =============================================================================
// Create Command
// =============================================================================

/// Arguments for the `create` command
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Short description used in the file name
    pub name: String,

    /// Only create the forward file
    #[arg(long)]
    pub irreversible: bool,
}

/// Supported ledger drivers
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DriverArg {
    /// Plain SQL, no lock
    Generic,
    /// PostgreSQL advisory locks
    Postgres,
}

impl From<DriverArg> for Driver {
    fn from(arg: DriverArg) -> Self {
        match arg {
            DriverArg::Generic => Driver::Generic,
            DriverArg::Postgres => Driver::Postgres,
        }
    }
}

//! # waypoint-migrate
//!
//! Migration orchestration engine for Waypoint.
//!
//! This crate provides:
//! - An ordered catalog of migrations ([`Repository`]) and a way to load one ([`Source`])
//! - A persisted ledger of applied migrations with dirty tracking and locking ([`Target`])
//! - Resolver policies and a [`Planner`] that turns them into [`Plan`]s
//! - A [`Runner`] that executes plans one action at a time
//! - A [`Migrator`] facade that locks, plans and executes in one call, or step by
//!   step through a [`Session`]
//! - SQL file migrations ([`SqlFileSource`]) and code migrations ([`code_migration!`])
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌───────────┐     ┌──────────┐     ┌──────────┐
//! │ Repository │────▶│ Resolvers │────▶│ Planner  │────▶│ Runner   │
//! └────────────┘     └───────────┘     └──────────┘     └──────────┘
//!                                           ▲                 │
//!                                           │                 ▼
//!                                      ┌─────────────────────────┐
//!                                      │ Target (ledger + lock)  │
//!                                      └─────────────────────────┘
//! ```
//!
//! A failed action leaves its ledger entry dirty. Every later read of the
//! ledger fails with [`MigrationError::DirtyMigration`] until an operator
//! repairs the target; nothing is rolled back automatically.
//!
//! ## Example
//!
//! ```rust,ignore
//! use waypoint_migrate::{ExecutionContext, MemoryTarget, Migration, Migrator, Operation, Repository};
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = Repository::from_migrations([
//!         Migration::new("20240101120000", "create users", |_ctx| async { Ok(()) })
//!             .with_undo(|_ctx| async { Ok(()) }),
//!     ])?;
//!
//!     let migrator = Migrator::new(repository, MemoryTarget::new());
//!     let plan = migrator.plan(&Operation::Migrate).await?;
//!     println!("Plan: {}", plan.summary());
//!
//!     let response = migrator.run(&ExecutionContext::new(), &Operation::Migrate).await?;
//!     println!("{}", response.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod file;
pub mod memory;
pub mod migration;
pub mod migrator;
pub mod planner;
pub mod reporter;
pub mod resolver;
pub mod runner;
pub mod source;
pub mod target;

// Re-exports
pub use config::{Driver, MigratorConfig, TargetConfig, DEFAULT_TABLE_NAME};
pub use context::ExecutionContext;
pub use error::{BoxError, MigrateResult, MigrationError, QueryError};
pub use file::{create_migration_files, generate_id, MigrationFileName, SqlExecutor, SqlFileSource, SqlStep};
pub use memory::MemoryTarget;
pub use migration::{parse_migration_name, Action, ActionKind, Migration, MigrationStep, Plan};
pub use migrator::{MigrationStatus, Migrator, Operation, Session, StatusEntry};
pub use planner::Planner;
pub use reporter::{NoopReporter, Reporter, TracingReporter};
pub use resolver::{Destination, Resolver};
pub use runner::{ExecutionError, ExecutionResponse, Runner};
pub use source::{Repository, Source};
pub use target::{MigrationLock, Target, Unlocker};

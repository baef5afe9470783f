//! # Waypoint
//!
//! Ordered, reversible database migrations with a persistent ledger.
//!
//! Waypoint provides:
//! - A catalog of migrations ordered by ID, loaded from SQL files or built in code
//! - A ledger that records applied migrations, flags interrupted ones as dirty,
//!   and serializes concurrent runs with a lock
//! - A planner that turns `migrate`, `rewind`, `reset`, `step` and `to` into
//!   an explicit list of actions
//! - A runner that stops at the first failure and reports what ran
//! - A PostgreSQL ledger with advisory locking (the `postgres` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use waypoint::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut repository = Repository::new();
//!     repository.add(Migration::new("20240101120000", "create users", |_ctx| async { Ok(()) }))?;
//!
//!     let migrator = Migrator::new(repository, MemoryTarget::new());
//!     let response = migrator.run(&ExecutionContext::new(), &Operation::Migrate).await?;
//!     println!("{}", response.summary());
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The migration engine: catalogs, ledgers, planning and execution.
pub mod migrate {
    pub use waypoint_migrate::*;
}

/// PostgreSQL ledger, advisory locks and SQL execution.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use waypoint_postgres::*;
}

pub use waypoint_migrate::code_migration;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Action, ActionKind, Driver, ExecutionContext, ExecutionResponse, MemoryTarget,
        MigrateResult, Migration, MigrationError, Migrator, MigratorConfig, Operation, Plan,
        Repository, Source, SqlFileSource, Target, TargetConfig,
    };

    #[cfg(feature = "postgres")]
    pub use crate::postgres::{PgExecutor, PgPool, PgTarget};
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationError, Migrator};

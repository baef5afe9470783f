//! High-level entry point tying a catalog, a ledger and a runner together.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::MigratorConfig;
use crate::context::ExecutionContext;
use crate::error::{MigrateResult, MigrationError};
use crate::memory::MemoryTarget;
use crate::migration::Plan;
use crate::planner::Planner;
use crate::runner::{ExecutionError, ExecutionResponse, Runner};
use crate::source::{Repository, Source};
use crate::target::{MigrationLock, Target};

/// A named movement through the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Apply everything pending.
    Migrate,
    /// Undo everything.
    Rewind,
    /// Undo everything, then apply everything.
    Reset,
    /// Apply the next migration.
    Do,
    /// Undo the current migration.
    Undo,
    /// Move `n` positions.
    Step(i64),
    /// Move to a specific migration.
    To(String),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Migrate => f.write_str("migrate"),
            Self::Rewind => f.write_str("rewind"),
            Self::Reset => f.write_str("reset"),
            Self::Do => f.write_str("do"),
            Self::Undo => f.write_str("undo"),
            Self::Step(n) => write!(f, "step {:+}", n),
            Self::To(id) => write!(f, "to {}", id),
        }
    }
}

/// One catalog migration and whether it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Migration ID.
    pub id: String,
    /// Description.
    pub description: String,
    /// Whether the ledger holds it.
    pub applied: bool,
    /// Whether it can be undone.
    pub reversible: bool,
}

/// Status of the migration system.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    /// Every catalog migration, ascending.
    pub migrations: Vec<StatusEntry>,
    /// Highest applied ID.
    pub current: Option<String>,
    /// Applied IDs that the catalog does not know about.
    pub unknown: Vec<String>,
}

impl MigrationStatus {
    /// Number of applied catalog migrations.
    pub fn applied_count(&self) -> usize {
        self.migrations.iter().filter(|m| m.applied).count()
    }

    /// Number of catalog migrations not yet applied.
    pub fn pending_count(&self) -> usize {
        self.migrations.len() - self.applied_count()
    }

    /// Whether everything in the catalog is applied.
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count() == 0
    }
}

/// Runs operations for one source and one target.
pub struct Migrator<S, T> {
    source: S,
    target: T,
    config: MigratorConfig,
    repository: OnceCell<Repository>,
}

impl<S: Source, T: Target> Migrator<S, T> {
    /// Create a migrator with default settings.
    pub fn new(source: S, target: T) -> Self {
        Self::with_config(source, target, MigratorConfig::default())
    }

    /// Create a migrator with explicit settings.
    pub fn with_config(source: S, target: T, config: MigratorConfig) -> Self {
        Self {
            source,
            target,
            config,
            repository: OnceCell::new(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// The target.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// The catalog, loaded from the source on first use.
    pub async fn repository(&self) -> MigrateResult<&Repository> {
        self.repository
            .get_or_try_init(|| async {
                let repository = self.source.load().await?;
                info!("Loaded {} migrations", repository.len());
                Ok::<_, MigrationError>(repository)
            })
            .await
    }

    /// Plan an operation without executing it.
    ///
    /// A ledger that has not been created reads as empty; planning never
    /// creates it.
    pub async fn plan(&self, operation: &Operation) -> MigrateResult<Plan> {
        let repository = self.repository().await?;
        let empty;
        let ledger: &dyn Target = if self.target.exists().await? {
            &self.target
        } else {
            debug!("Ledger does not exist yet; planning against an empty ledger");
            empty = MemoryTarget::created();
            &empty
        };
        let planner = Planner::new(repository, ledger);

        match operation {
            Operation::Migrate => planner.migrate().await,
            Operation::Rewind => planner.rewind().await,
            Operation::Reset => planner.reset().await,
            Operation::Do => planner.do_next().await,
            Operation::Undo => planner.undo_last().await,
            Operation::Step(n) => planner.step(*n).await,
            Operation::To(id) => planner.to(id).await,
        }
    }

    /// Execute a previously computed plan.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
    ) -> Result<ExecutionResponse, ExecutionError> {
        Runner::new(&self.target)
            .with_reporter(self.config.reporter.clone())
            .execute(ctx, plan)
            .await
    }

    /// Take the lock (when enabled) and create the ledger (when enabled).
    ///
    /// Everything planned and executed through the returned [`Session`] sees
    /// the ledger exactly as the session leaves it.
    pub async fn begin(&self, ctx: &ExecutionContext) -> MigrateResult<Session<'_, S, T>> {
        let lock = if self.config.lock {
            let lock = ctx.guard(self.target.lock()).await?;
            info!(lock_id = lock.id(), "Acquired migration lock");
            Some(lock)
        } else {
            None
        };

        if self.config.create {
            if let Err(e) = ctx.guard(self.target.create()).await {
                return release(lock, Err(e)).await;
            }
        }

        Ok(Session {
            migrator: self,
            lock,
        })
    }

    /// Lock, create the ledger, plan and execute, then unlock.
    pub async fn run(
        &self,
        ctx: &ExecutionContext,
        operation: &Operation,
    ) -> Result<ExecutionResponse, ExecutionError> {
        let session = self.begin(ctx).await?;

        let result = match ctx.guard(session.plan(operation)).await {
            Ok(plan) => {
                if plan.is_empty() {
                    info!(%operation, "Nothing to do");
                }
                session.execute(ctx, &plan).await
            }
            Err(e) => Err(e.into()),
        };

        session.finish(result).await
    }

    /// Record every migration up to and including `id` as applied without
    /// running it. Used to adopt an existing database.
    pub async fn baseline(&self, id: &str) -> MigrateResult<Vec<String>> {
        let repository = self.repository().await?;
        let position = repository
            .position(id)
            .ok_or_else(|| MigrationError::MigrationNotListed(id.to_string()))?;

        if self.config.create {
            self.target.create().await?;
        }

        let done: HashSet<String> = self.target.done().await?.into_iter().collect();
        let mut added = Vec::new();
        for migration in &repository.migrations()[..=position] {
            if done.contains(migration.id()) {
                continue;
            }
            self.target.add(migration.id()).await?;
            added.push(migration.id().to_string());
        }

        info!(baselined = added.len(), up_to = id, "Baselined migrations");
        Ok(added)
    }

    /// Compare the catalog with the ledger.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let repository = self.repository().await?;
        let done = if self.target.exists().await? {
            self.target.done().await?
        } else {
            Vec::new()
        };
        let applied: HashSet<&str> = done.iter().map(String::as_str).collect();

        let migrations = repository
            .migrations()
            .iter()
            .map(|m| StatusEntry {
                id: m.id().to_string(),
                description: m.description().to_string(),
                applied: applied.contains(m.id()),
                reversible: m.is_reversible(),
            })
            .collect();

        let unknown = done
            .iter()
            .filter(|id| repository.position(id).is_none())
            .cloned()
            .collect();

        Ok(MigrationStatus {
            migrations,
            current: done.last().cloned(),
            unknown,
        })
    }
}

/// Exclusive use of a migrator's ledger, from [`Migrator::begin`] to
/// [`finish`](Session::finish).
///
/// A plan obtained here cannot be invalidated by another locked run before it
/// is executed. Dropping the session without finishing releases the lock in
/// the background.
pub struct Session<'m, S, T> {
    migrator: &'m Migrator<S, T>,
    lock: Option<MigrationLock>,
}

impl<S: Source, T: Target> Session<'_, S, T> {
    /// Plan an operation against the locked ledger.
    pub async fn plan(&self, operation: &Operation) -> MigrateResult<Plan> {
        self.migrator.plan(operation).await
    }

    /// Execute a plan produced by [`plan`](Self::plan).
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
    ) -> Result<ExecutionResponse, ExecutionError> {
        self.migrator.execute(ctx, plan).await
    }

    /// Release the lock and hand back `result`.
    ///
    /// A release failure replaces a successful result; after a failed run it
    /// is only logged.
    pub async fn finish<R, E>(self, result: Result<R, E>) -> Result<R, E>
    where
        E: From<MigrationError>,
    {
        release(self.lock, result).await
    }
}

async fn release<R, E>(lock: Option<MigrationLock>, result: Result<R, E>) -> Result<R, E>
where
    E: From<MigrationError>,
{
    let Some(lock) = lock else {
        return result;
    };

    match lock.release().await {
        Ok(()) => result,
        Err(e) if result.is_ok() => Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Failed to release migration lock");
            result
        }
    }
}

//! Turns resolver chains into plans.

use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::migration::{Action, ActionKind, Plan};
use crate::resolver::{Destination, Resolver};
use crate::source::Repository;
use crate::target::Target;

/// Computes [`Plan`]s from a catalog and a ledger snapshot.
///
/// Planning never mutates the target; the same catalog, ledger and resolver
/// chain always produce the same plan.
pub struct Planner<'a> {
    repository: &'a Repository,
    target: &'a dyn Target,
}

impl<'a> Planner<'a> {
    /// Create a planner.
    pub fn new(repository: &'a Repository, target: &'a dyn Target) -> Self {
        Self { repository, target }
    }

    /// Walk the resolver chain from the current position.
    pub async fn plan(&self, resolvers: &[Resolver]) -> MigrateResult<Plan> {
        let migrations = self.repository.list()?;
        let mut cursor = Destination::from(self.cursor().await?);
        let mut actions = Vec::new();

        for resolver in resolvers {
            let destination = resolver.resolve(self.repository, cursor.index())?;
            let (from, to) = (cursor.offset(), destination.offset());

            if to > from {
                for idx in (from + 1)..=to {
                    actions.push(Action::new(
                        ActionKind::Do,
                        migrations[idx as usize].clone(),
                    ));
                }
            } else if to < from {
                for idx in ((to + 1)..=from).rev() {
                    actions.push(Action::new(
                        ActionKind::Undo,
                        migrations[idx as usize].clone(),
                    ));
                }
            }

            debug!(%resolver, from, to, "Resolved destination");
            cursor = destination;
        }

        let plan = Plan::new(actions);
        debug!(actions = plan.len(), summary = %plan.summary(), "Planned");
        Ok(plan)
    }

    /// Apply everything pending, after checking the ledger still matches the catalog.
    pub async fn migrate(&self) -> MigrateResult<Plan> {
        self.verify_history().await?;
        self.plan(&[Resolver::MostRecent]).await
    }

    /// Undo everything.
    pub async fn rewind(&self) -> MigrateResult<Plan> {
        self.plan(&[Resolver::First]).await
    }

    /// Undo everything, then apply everything.
    pub async fn reset(&self) -> MigrateResult<Plan> {
        self.plan(&[Resolver::First, Resolver::MostRecent]).await
    }

    /// Move `n` positions; negative values undo.
    pub async fn step(&self, n: i64) -> MigrateResult<Plan> {
        self.plan(&[Resolver::Step(n)]).await
    }

    /// Apply the next migration.
    pub async fn do_next(&self) -> MigrateResult<Plan> {
        self.step(1).await
    }

    /// Undo the current migration.
    pub async fn undo_last(&self) -> MigrateResult<Plan> {
        self.step(-1).await
    }

    /// Move to a specific migration, forwards or backwards.
    pub async fn to(&self, id: &str) -> MigrateResult<Plan> {
        self.plan(&[Resolver::To(id.to_string())]).await
    }

    /// Check that every applied ID sits at the same index in the catalog.
    pub async fn verify_history(&self) -> MigrateResult<()> {
        let done = self.target.done().await?;
        let migrations = self.repository.migrations();

        for (idx, id) in done.iter().enumerate() {
            match migrations.get(idx) {
                Some(m) if m.id() == id => {}
                Some(m) => {
                    return Err(MigrationError::StaleMigration {
                        id: id.clone(),
                        expected: Some(m.id().to_string()),
                    });
                }
                None => return Err(self.unknown_applied(id)),
            }
        }

        Ok(())
    }

    async fn cursor(&self) -> MigrateResult<Option<usize>> {
        match self.target.current().await {
            Ok(id) => self
                .repository
                .position(&id)
                .map(Some)
                .ok_or_else(|| self.unknown_applied(&id)),
            Err(MigrationError::NoCurrentMigration) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn unknown_applied(&self, id: &str) -> MigrationError {
        match self.repository.last() {
            Some(latest) if id > latest.id() => MigrationError::CurrentMigrationMoreRecent {
                current: id.to_string(),
                latest: latest.id().to_string(),
            },
            _ => MigrationError::StaleMigration {
                id: id.to_string(),
                expected: None,
            },
        }
    }
}

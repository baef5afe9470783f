//! Migration catalogs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{MigrateResult, MigrationError};
use crate::migration::Migration;

/// Ordered catalog of migrations.
///
/// Migrations are kept in ascending ID order regardless of insertion order;
/// neighbours are found by index.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    migrations: Vec<Arc<Migration>>,
    by_id: HashMap<String, Arc<Migration>>,
}

impl Repository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from a set of migrations.
    pub fn from_migrations<I, M>(migrations: I) -> MigrateResult<Self>
    where
        I: IntoIterator<Item = M>,
        M: Into<Arc<Migration>>,
    {
        let mut repository = Self::new();
        for migration in migrations {
            repository.add(migration)?;
        }
        Ok(repository)
    }

    /// Add a migration, keeping the catalog sorted.
    pub fn add(&mut self, migration: impl Into<Arc<Migration>>) -> MigrateResult<()> {
        let migration = migration.into();
        if self.by_id.contains_key(migration.id()) {
            return Err(MigrationError::DuplicateId(migration.id().to_string()));
        }

        let idx = self
            .migrations
            .partition_point(|m| m.id() < migration.id());
        self.by_id
            .insert(migration.id().to_string(), migration.clone());
        self.migrations.insert(idx, migration);
        Ok(())
    }

    /// Ascending list of migrations; fails when the catalog is empty.
    pub fn list(&self) -> MigrateResult<&[Arc<Migration>]> {
        if self.migrations.is_empty() {
            return Err(MigrationError::NoMigrationsAvailable);
        }
        Ok(&self.migrations)
    }

    /// Ascending list of migrations, possibly empty.
    pub fn migrations(&self) -> &[Arc<Migration>] {
        &self.migrations
    }

    /// Look up a migration by ID.
    pub fn by_id(&self, id: &str) -> MigrateResult<&Arc<Migration>> {
        self.by_id
            .get(id)
            .ok_or_else(|| MigrationError::MigrationNotFound(id.to_string()))
    }

    /// Index of a migration in the ordered list.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.migrations.binary_search_by(|m| m.id().cmp(id)).ok()
    }

    /// Migration at `index`.
    pub fn get(&self, index: usize) -> Option<&Arc<Migration>> {
        self.migrations.get(index)
    }

    /// The migration following `id`, if any.
    pub fn next(&self, id: &str) -> MigrateResult<Option<&Arc<Migration>>> {
        let idx = self.index_of(id)?;
        Ok(self.migrations.get(idx + 1))
    }

    /// The migration preceding `id`, if any.
    pub fn previous(&self, id: &str) -> MigrateResult<Option<&Arc<Migration>>> {
        let idx = self.index_of(id)?;
        Ok(idx.checked_sub(1).and_then(|i| self.migrations.get(i)))
    }

    /// Oldest migration.
    pub fn first(&self) -> Option<&Arc<Migration>> {
        self.migrations.first()
    }

    /// Newest migration.
    pub fn last(&self) -> Option<&Arc<Migration>> {
        self.migrations.last()
    }

    /// Number of migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    fn index_of(&self, id: &str) -> MigrateResult<usize> {
        self.position(id)
            .ok_or_else(|| MigrationError::MigrationNotFound(id.to_string()))
    }
}

/// Something that can produce a catalog.
#[async_trait]
pub trait Source: Send + Sync {
    /// Load the full catalog.
    async fn load(&self) -> MigrateResult<Repository>;
}

#[async_trait]
impl Source for Repository {
    async fn load(&self) -> MigrateResult<Repository> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::error::BoxError;

    fn migration(id: &str) -> Migration {
        Migration::new(id, format!("migration {id}"), |_: ExecutionContext| async {
            Ok::<(), BoxError>(())
        })
    }

    fn ids(repository: &Repository) -> Vec<&str> {
        repository.migrations().iter().map(|m| m.id()).collect()
    }

    #[test]
    fn test_add_keeps_order() {
        let repository = Repository::from_migrations(
            ["20240103", "20240101", "20240104", "20240102"].map(migration),
        )
        .unwrap();

        assert_eq!(ids(&repository), ["20240101", "20240102", "20240103", "20240104"]);
    }

    #[test]
    fn test_duplicate_id() {
        let mut repository = Repository::new();
        repository.add(migration("1")).unwrap();
        let err = repository.add(migration("1")).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateId(id) if id == "1"));
        assert_eq!(repository.len(), 1);
    }

    #[test]
    fn test_empty_list() {
        let repository = Repository::new();
        assert!(matches!(
            repository.list(),
            Err(MigrationError::NoMigrationsAvailable)
        ));
        assert!(repository.migrations().is_empty());
    }

    #[test]
    fn test_lookup_and_neighbours() {
        let repository = Repository::from_migrations(["1", "2", "3"].map(migration)).unwrap();

        assert_eq!(repository.by_id("2").unwrap().id(), "2");
        assert!(matches!(
            repository.by_id("9"),
            Err(MigrationError::MigrationNotFound(_))
        ));
        assert_eq!(repository.position("3"), Some(2));
        assert_eq!(repository.next("2").unwrap().map(|m| m.id()), Some("3"));
        assert!(repository.next("3").unwrap().is_none());
        assert_eq!(repository.previous("2").unwrap().map(|m| m.id()), Some("1"));
        assert!(repository.previous("1").unwrap().is_none());
        assert!(repository.next("9").is_err());
        assert_eq!(repository.first().map(|m| m.id()), Some("1"));
        assert_eq!(repository.last().map(|m| m.id()), Some("3"));
    }

    #[tokio::test]
    async fn test_repository_is_a_source() {
        let repository = Repository::from_migrations(["1", "2"].map(migration)).unwrap();
        let loaded = repository.load().await.unwrap();
        assert_eq!(ids(&loaded), ["1", "2"]);
    }
}

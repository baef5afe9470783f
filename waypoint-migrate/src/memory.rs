//! In-process ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::error::{MigrateResult, MigrationError};
use crate::target::{MigrationLock, Target, Unlocker};

/// A [`Target`] kept in memory.
///
/// Clones share state, so a test can hand one clone to a migrator and
/// inspect the other. The lock is exclusive within the process only.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    ledger: Arc<Mutex<Option<BTreeMap<String, bool>>>>,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryTarget {
    /// Create a target whose ledger does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target whose ledger already exists and is empty.
    pub fn created() -> Self {
        let target = Self::new();
        *target.ledger.lock() = Some(BTreeMap::new());
        target
    }

    /// Raw `(id, dirty)` entries, including dirty ones.
    pub fn entries(&self) -> Vec<(String, bool)> {
        self.ledger
            .lock()
            .as_ref()
            .map(|ledger| ledger.iter().map(|(id, dirty)| (id.clone(), *dirty)).collect())
            .unwrap_or_default()
    }

    /// Whether the ledger exists.
    pub fn is_created(&self) -> bool {
        self.ledger.lock().is_some()
    }

    fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, bool>) -> MigrateResult<T>,
    ) -> MigrateResult<T> {
        let mut guard = self.ledger.lock();
        let ledger = guard
            .as_mut()
            .ok_or_else(|| MigrationError::database("migration ledger has not been created"))?;
        f(ledger)
    }
}

struct MemoryUnlocker(Option<OwnedMutexGuard<()>>);

#[async_trait]
impl Unlocker for MemoryUnlocker {
    async fn unlock(&mut self) -> MigrateResult<()> {
        self.0.take();
        Ok(())
    }
}

#[async_trait]
impl Target for MemoryTarget {
    async fn create(&self) -> MigrateResult<()> {
        self.ledger.lock().get_or_insert_with(BTreeMap::new);
        Ok(())
    }

    async fn destroy(&self) -> MigrateResult<()> {
        self.ledger.lock().take();
        Ok(())
    }

    async fn exists(&self) -> MigrateResult<bool> {
        Ok(self.is_created())
    }

    async fn done(&self) -> MigrateResult<Vec<String>> {
        self.with_ledger(|ledger| {
            if let Some((id, _)) = ledger.iter().find(|(_, dirty)| **dirty) {
                return Err(MigrationError::DirtyMigration(id.clone()));
            }
            Ok(ledger.keys().cloned().collect())
        })
    }

    async fn add(&self, id: &str) -> MigrateResult<()> {
        self.with_ledger(|ledger| {
            if ledger.contains_key(id) {
                return Err(MigrationError::AlreadyApplied(id.to_string()));
            }
            ledger.insert(id.to_string(), false);
            Ok(())
        })
    }

    async fn remove(&self, id: &str) -> MigrateResult<()> {
        self.with_ledger(|ledger| {
            ledger
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| MigrationError::MigrationNotFound(id.to_string()))
        })
    }

    async fn start_migration(&self, id: &str) -> MigrateResult<()> {
        self.with_ledger(|ledger| {
            ledger.insert(id.to_string(), true);
            Ok(())
        })
    }

    async fn finish_migration(&self, id: &str) -> MigrateResult<()> {
        self.with_ledger(|ledger| match ledger.get_mut(id) {
            Some(dirty) => {
                *dirty = false;
                Ok(())
            }
            None => Err(MigrationError::MigrationNotFound(id.to_string())),
        })
    }

    async fn lock(&self) -> MigrateResult<MigrationLock> {
        let guard = self.lock.clone().lock_owned().await;
        Ok(MigrationLock::new(0, MemoryUnlocker(Some(guard))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_requires_create() {
        let target = MemoryTarget::new();
        assert!(!target.exists().await.unwrap());
        assert!(matches!(
            target.done().await,
            Err(MigrationError::Database(_))
        ));

        target.create().await.unwrap();
        target.create().await.unwrap();
        assert!(target.exists().await.unwrap());
        assert!(target.done().await.unwrap().is_empty());

        target.destroy().await.unwrap();
        assert!(!target.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_current_and_done() {
        let target = MemoryTarget::created();
        assert!(matches!(
            target.current().await,
            Err(MigrationError::NoCurrentMigration)
        ));

        target.add("2").await.unwrap();
        target.add("1").await.unwrap();
        assert_eq!(target.done().await.unwrap(), ["1", "2"]);
        assert_eq!(target.current().await.unwrap(), "2");

        assert!(matches!(
            target.add("1").await,
            Err(MigrationError::AlreadyApplied(_))
        ));
    }

    #[tokio::test]
    async fn test_dirty_entries_block_reads() {
        let target = MemoryTarget::created();
        target.add("1").await.unwrap();
        target.start_migration("2").await.unwrap();

        assert!(matches!(
            target.done().await,
            Err(MigrationError::DirtyMigration(id)) if id == "2"
        ));
        assert!(matches!(
            target.current().await,
            Err(MigrationError::DirtyMigration(_))
        ));

        target.finish_migration("2").await.unwrap();
        assert_eq!(target.current().await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_missing_entries() {
        let target = MemoryTarget::created();
        assert!(matches!(
            target.remove("1").await,
            Err(MigrationError::MigrationNotFound(_))
        ));
        assert!(matches!(
            target.finish_migration("1").await,
            Err(MigrationError::MigrationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let target = MemoryTarget::created();
        let lock = target.lock().await.unwrap();

        let contender = target.clone();
        let waiting = tokio::spawn(async move { contender.lock().await.map(|l| l.id()) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        lock.release().await.unwrap();
        assert_eq!(waiting.await.unwrap().unwrap(), 0);
    }
}

//! Ledger of applied migrations and the migration lock.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{MigrateResult, MigrationError};

/// Persisted record of applied migrations.
///
/// Each operation is atomic from the store's point of view. Entries are
/// either clean (applied) or dirty (started but never confirmed); reading the
/// ledger while any entry is dirty fails with [`MigrationError::DirtyMigration`].
#[async_trait]
pub trait Target: Send + Sync {
    /// Create the ledger storage. Idempotent.
    async fn create(&self) -> MigrateResult<()>;

    /// Drop the ledger storage.
    async fn destroy(&self) -> MigrateResult<()>;

    /// Whether the ledger storage has been created.
    async fn exists(&self) -> MigrateResult<bool>;

    /// Applied IDs in ascending order.
    async fn done(&self) -> MigrateResult<Vec<String>>;

    /// Highest applied ID, or [`MigrationError::NoCurrentMigration`].
    async fn current(&self) -> MigrateResult<String> {
        self.done()
            .await?
            .pop()
            .ok_or(MigrationError::NoCurrentMigration)
    }

    /// Insert a clean entry. Fails with `AlreadyApplied` if present.
    async fn add(&self, id: &str) -> MigrateResult<()>;

    /// Delete an entry. Fails with `MigrationNotFound` if absent.
    async fn remove(&self, id: &str) -> MigrateResult<()>;

    /// Insert or update an entry as dirty.
    async fn start_migration(&self, id: &str) -> MigrateResult<()>;

    /// Mark an entry clean. Fails with `MigrationNotFound` if absent.
    async fn finish_migration(&self, id: &str) -> MigrateResult<()>;

    /// Acquire exclusive execution rights.
    async fn lock(&self) -> MigrateResult<MigrationLock>;
}

#[async_trait]
impl<T: Target + ?Sized> Target for Arc<T> {
    async fn create(&self) -> MigrateResult<()> {
        (**self).create().await
    }

    async fn destroy(&self) -> MigrateResult<()> {
        (**self).destroy().await
    }

    async fn exists(&self) -> MigrateResult<bool> {
        (**self).exists().await
    }

    async fn done(&self) -> MigrateResult<Vec<String>> {
        (**self).done().await
    }

    async fn current(&self) -> MigrateResult<String> {
        (**self).current().await
    }

    async fn add(&self, id: &str) -> MigrateResult<()> {
        (**self).add(id).await
    }

    async fn remove(&self, id: &str) -> MigrateResult<()> {
        (**self).remove(id).await
    }

    async fn start_migration(&self, id: &str) -> MigrateResult<()> {
        (**self).start_migration(id).await
    }

    async fn finish_migration(&self, id: &str) -> MigrateResult<()> {
        (**self).finish_migration(id).await
    }

    async fn lock(&self) -> MigrateResult<MigrationLock> {
        (**self).lock().await
    }
}

/// Releases a lock taken by a [`Target`].
#[async_trait]
pub trait Unlocker: Send + Sync {
    /// Release the lock. Called at most once.
    async fn unlock(&mut self) -> MigrateResult<()>;
}

struct NoopUnlocker;

#[async_trait]
impl Unlocker for NoopUnlocker {
    async fn unlock(&mut self) -> MigrateResult<()> {
        Ok(())
    }
}

/// Migration lock to prevent concurrent runs.
///
/// Call [`release`](Self::release) to unlock and observe the result. A lock
/// dropped without being released unlocks in a task on the current Tokio
/// runtime.
pub struct MigrationLock {
    lock_id: i64,
    unlocker: Option<Box<dyn Unlocker>>,
}

impl MigrationLock {
    /// Create a new migration lock.
    pub fn new(lock_id: i64, unlocker: impl Unlocker + 'static) -> Self {
        Self {
            lock_id,
            unlocker: Some(Box::new(unlocker)),
        }
    }

    /// A lock that guards nothing, for single-process targets.
    pub fn noop() -> Self {
        Self::new(0, NoopUnlocker)
    }

    /// Get the lock ID.
    pub fn id(&self) -> i64 {
        self.lock_id
    }

    /// Release the lock.
    pub async fn release(mut self) -> MigrateResult<()> {
        match self.unlocker.take() {
            Some(mut unlocker) => {
                debug!(lock_id = self.lock_id, "Releasing migration lock");
                unlocker.unlock().await
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MigrationLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationLock")
            .field("lock_id", &self.lock_id)
            .field("held", &self.unlocker.is_some())
            .finish()
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        let Some(mut unlocker) = self.unlocker.take() else {
            return;
        };

        let lock_id = self.lock_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = unlocker.unlock().await {
                        warn!(lock_id, error = %e, "Failed to release dropped migration lock");
                    }
                });
            }
            Err(_) => {
                warn!(lock_id, "Migration lock dropped outside a runtime; it was not released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingUnlocker(Arc<AtomicUsize>);

    #[async_trait]
    impl Unlocker for CountingUnlocker {
        async fn unlock(&mut self) -> MigrateResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_release_unlocks_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let lock = MigrationLock::new(42, CountingUnlocker(count.clone()));
        assert_eq!(lock.id(), 42);

        lock.release().await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_unlocks_in_background() {
        let count = Arc::new(AtomicUsize::new(0));
        drop(MigrationLock::new(1, CountingUnlocker(count.clone())));

        for _ in 0..10 {
            if count.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_noop_lock() {
        let lock = MigrationLock::noop();
        assert_eq!(lock.id(), 0);
        lock.release().await.unwrap();
    }
}

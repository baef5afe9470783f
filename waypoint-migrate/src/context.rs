//! Execution context handed to every migration step and ledger call.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{MigrateResult, MigrationError};

/// Cancellation scope plus optional caller data shared by a run.
///
/// Cloning is cheap; clones share the same cancellation token and data.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
    data: Option<Arc<dyn Any + Send + Sync>>,
}

impl ExecutionContext {
    /// Create a fresh context with its own cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context driven by an existing token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token, data: None }
    }

    /// Attach caller data (typically a connection handle) for code migrations.
    pub fn with_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    /// Borrow the attached data if it has type `T`.
    pub fn data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.data.as_deref()?.downcast_ref::<T>()
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Request cancellation of everything running under this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `fut` unless the context is cancelled first.
    ///
    /// Cancellation drops the in-flight future and yields [`MigrationError::Cancelled`].
    pub async fn guard<F, T>(&self, fut: F) -> MigrateResult<T>
    where
        F: Future<Output = MigrateResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(MigrationError::Cancelled),
            result = fut => result,
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancelled", &self.is_cancelled())
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

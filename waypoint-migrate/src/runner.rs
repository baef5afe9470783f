//! Plan execution.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::{MigrateResult, MigrationError};
use crate::migration::{Action, ActionKind, Plan};
use crate::reporter::{NoopReporter, Reporter};
use crate::target::Target;

/// Which actions ran and which one failed.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResponse {
    /// Completed actions, in order.
    pub successful: Vec<Action>,
    /// The failing action, if any. Never holds more than one.
    pub errored: Vec<Action>,
    /// Wall time of the run in milliseconds.
    pub duration_ms: u128,
}

impl ExecutionResponse {
    /// Whether nothing failed.
    pub fn is_success(&self) -> bool {
        self.errored.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        match self.errored.first() {
            Some(failed) => format!(
                "{} succeeded, {} failed in {}ms",
                self.successful.len(),
                failed,
                self.duration_ms
            ),
            None if self.successful.is_empty() => "Nothing executed".to_string(),
            None => format!(
                "{} executed in {}ms",
                self.successful.len(),
                self.duration_ms
            ),
        }
    }
}

/// A failed run, carrying the partial response.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ExecutionError {
    /// What ran before the failure.
    pub response: ExecutionResponse,
    /// The failure.
    #[source]
    pub source: MigrationError,
}

impl ExecutionError {
    fn new(response: ExecutionResponse, source: MigrationError) -> Self {
        Self { response, source }
    }

    /// Discard the response and keep the error.
    pub fn into_inner(self) -> MigrationError {
        self.source
    }
}

impl From<MigrationError> for ExecutionError {
    fn from(source: MigrationError) -> Self {
        Self::new(ExecutionResponse::default(), source)
    }
}

impl From<ExecutionError> for MigrationError {
    fn from(err: ExecutionError) -> Self {
        err.source
    }
}

/// Executes plans against a target, one action at a time.
///
/// A failed action stays dirty in the ledger and stops the run. Actions that
/// already succeeded are not compensated.
pub struct Runner<'a> {
    target: &'a dyn Target,
    reporter: Arc<dyn Reporter>,
}

impl<'a> Runner<'a> {
    /// Create a runner with no reporter.
    pub fn new(target: &'a dyn Target) -> Self {
        Self {
            target,
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Set the reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run every action in `plan` in order.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
    ) -> Result<ExecutionResponse, ExecutionError> {
        let started = Instant::now();
        let mut response = ExecutionResponse::default();

        self.reporter.before_execute(plan);

        if let Err(e) = check_undoable(plan) {
            self.reporter.after_execute(&response, Some(&e));
            return Err(ExecutionError::new(response, e));
        }

        for action in plan {
            self.reporter.before_action(action);

            match self.run_action(ctx, action).await {
                Ok(()) => {
                    self.reporter.after_action(action, None);
                    response.successful.push(action.clone());
                }
                Err(e) => {
                    warn!(kind = %action.kind, id = action.id(), error = %e, "Stopping after failed action");
                    self.reporter.after_action(action, Some(&e));
                    response.errored.push(action.clone());
                    response.duration_ms = started.elapsed().as_millis();
                    self.reporter.after_execute(&response, Some(&e));
                    return Err(ExecutionError::new(response, e));
                }
            }
        }

        response.duration_ms = started.elapsed().as_millis();
        self.reporter.after_execute(&response, None);
        Ok(response)
    }

    async fn run_action(&self, ctx: &ExecutionContext, action: &Action) -> MigrateResult<()> {
        let id = action.id();
        debug!(kind = %action.kind, id, "Marking migration dirty");
        ctx.guard(self.target.start_migration(id)).await?;

        ctx.guard(action.migration.execute(action.kind, ctx.clone()))
            .await?;

        match action.kind {
            ActionKind::Do => ctx.guard(self.target.finish_migration(id)).await,
            ActionKind::Undo => ctx.guard(self.target.remove(id)).await,
        }
    }
}

fn check_undoable(plan: &Plan) -> MigrateResult<()> {
    match plan
        .iter()
        .find(|a| a.kind == ActionKind::Undo && !a.migration.is_reversible())
    {
        Some(action) => Err(MigrationError::MigrationNotUndoable(action.id().to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::memory::MemoryTarget;
    use crate::migration::Migration;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn ok(_: ExecutionContext) -> std::future::Ready<Result<(), BoxError>> {
        std::future::ready(Ok(()))
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Reporter for Recorder {
        fn before_execute(&self, plan: &Plan) {
            self.0.lock().push(format!("plan {}", plan.len()));
        }

        fn before_action(&self, action: &Action) {
            self.0.lock().push(format!("before {}", action.id()));
        }

        fn after_action(&self, action: &Action, error: Option<&MigrationError>) {
            self.0
                .lock()
                .push(format!("after {} {}", action.id(), error.is_some()));
        }

        fn after_execute(&self, response: &ExecutionResponse, error: Option<&MigrationError>) {
            self.0.lock().push(format!(
                "done {} {} {}",
                response.successful.len(),
                response.errored.len(),
                error.is_some()
            ));
        }
    }

    #[tokio::test]
    async fn test_do_and_undo_update_ledger() {
        let target = MemoryTarget::created();
        let m = Arc::new(Migration::new("1", "one", ok).with_undo(ok));
        let runner = Runner::new(&target);
        let ctx = ExecutionContext::new();

        let response = runner
            .execute(&ctx, &Plan::new(vec![Action::new(ActionKind::Do, m.clone())]))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(target.entries(), [("1".to_string(), false)]);

        runner
            .execute(&ctx, &Plan::new(vec![Action::new(ActionKind::Undo, m)]))
            .await
            .unwrap();
        assert!(target.entries().is_empty());
    }

    #[tokio::test]
    async fn test_reporter_sequence() {
        let target = MemoryTarget::created();
        let recorder = Arc::new(Recorder::default());
        let plan = Plan::new(vec![
            Action::new(ActionKind::Do, Arc::new(Migration::new("1", "one", ok))),
            Action::new(
                ActionKind::Do,
                Arc::new(Migration::new("2", "two", |_| async {
                    Err::<(), BoxError>("boom".into())
                })),
            ),
        ]);

        let err = Runner::new(&target)
            .with_reporter(recorder.clone())
            .execute(&ExecutionContext::new(), &plan)
            .await
            .unwrap_err();

        assert_eq!(err.response.successful.len(), 1);
        assert_eq!(err.response.errored[0].id(), "2");
        assert_eq!(
            *recorder.0.lock(),
            [
                "plan 2",
                "before 1",
                "after 1 false",
                "before 2",
                "after 2 true",
                "done 1 1 true"
            ]
        );
    }

    #[tokio::test]
    async fn test_undo_of_irreversible_runs_nothing() {
        let target = MemoryTarget::created();
        target.add("1").await.unwrap();
        target.add("2").await.unwrap();
        let plan = Plan::new(vec![
            Action::new(
                ActionKind::Undo,
                Arc::new(Migration::new("2", "two", ok).with_undo(ok)),
            ),
            Action::new(ActionKind::Undo, Arc::new(Migration::new("1", "one", ok))),
        ]);

        let recorder = Arc::new(Recorder::default());
        let err = Runner::new(&target)
            .with_reporter(recorder.clone())
            .execute(&ExecutionContext::new(), &plan)
            .await
            .unwrap_err();

        assert!(matches!(err.source, MigrationError::MigrationNotUndoable(ref id) if id == "1"));
        assert!(err.response.successful.is_empty());
        assert!(err.response.errored.is_empty());
        assert_eq!(target.done().await.unwrap(), ["1", "2"]);
        assert_eq!(*recorder.0.lock(), ["plan 2", "done 0 0 true"]);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_entry_dirty() {
        let target = MemoryTarget::created();
        let slow = Migration::new("1", "slow", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), BoxError>(())
        });
        let plan = Plan::new(vec![Action::new(ActionKind::Do, Arc::new(slow))]);

        let ctx = ExecutionContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = Runner::new(&target).execute(&ctx, &plan).await.unwrap_err();
        assert!(matches!(err.source, MigrationError::Cancelled));
        assert_eq!(err.response.errored.len(), 1);
        assert_eq!(target.entries(), [("1".to_string(), true)]);
    }
}

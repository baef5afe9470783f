//! Execution progress hooks.

use tracing::{error, info};

use crate::error::MigrationError;
use crate::migration::{Action, Plan};
use crate::runner::ExecutionResponse;

/// Receives notifications while a plan runs.
///
/// Hooks are synchronous and cannot change control flow.
pub trait Reporter: Send + Sync {
    /// Once per run, before the plan is checked or any action starts.
    fn before_execute(&self, _plan: &Plan) {}

    /// Before each action.
    fn before_action(&self, _action: &Action) {}

    /// After each action, with its error if it failed.
    fn after_action(&self, _action: &Action, _error: Option<&MigrationError>) {}

    /// After the run, successful or not.
    fn after_execute(&self, _response: &ExecutionResponse, _error: Option<&MigrationError>) {}
}

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Reporter that emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn before_execute(&self, plan: &Plan) {
        info!(actions = plan.len(), summary = %plan.summary(), "Executing plan");
    }

    fn before_action(&self, action: &Action) {
        info!(
            kind = %action.kind,
            id = action.id(),
            description = action.migration.description(),
            "Running migration"
        );
    }

    fn after_action(&self, action: &Action, error: Option<&MigrationError>) {
        match error {
            Some(e) => error!(
                kind = %action.kind,
                id = action.id(),
                query = e.query(),
                error = %e,
                "Migration failed"
            ),
            None => info!(kind = %action.kind, id = action.id(), "Migration finished"),
        }
    }

    fn after_execute(&self, response: &ExecutionResponse, error: Option<&MigrationError>) {
        match error {
            Some(e) => error!(
                successful = response.successful.len(),
                errored = response.errored.len(),
                error = %e,
                "Plan failed"
            ),
            None => info!(successful = response.successful.len(), "Plan finished"),
        }
    }
}

//! Terminal progress reporting.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use waypoint_migrate::{Action, ExecutionResponse, MigrationError, Plan, Reporter};

use crate::output;

#[derive(Debug, Default)]
struct Progress {
    total: usize,
    current: usize,
    started: Option<Instant>,
}

/// Prints each action with its duration, and the failing query on error.
#[derive(Debug, Default)]
pub struct CliReporter {
    progress: Mutex<Progress>,
}

impl CliReporter {
    /// Create a reporter.
    pub fn new() -> Self {
        Self::default()
    }
}

fn format_duration(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

impl Reporter for CliReporter {
    fn before_execute(&self, plan: &Plan) {
        let mut progress = self.progress.lock();
        progress.total = plan.len();
        progress.current = 0;
    }

    fn before_action(&self, action: &Action) {
        let mut progress = self.progress.lock();
        progress.current += 1;
        progress.started = Some(Instant::now());
        output::step(
            progress.current,
            progress.total,
            &format!("{} {}", output::style_kind(action.kind), action.migration),
        );
    }

    fn after_action(&self, action: &Action, error: Option<&MigrationError>) {
        let elapsed = self
            .progress
            .lock()
            .started
            .take()
            .map(|started| format_duration(started.elapsed()))
            .unwrap_or_default();

        match error {
            None => output::list_item(&format!(
                "{} {}",
                output::style_success("done"),
                elapsed
            )),
            Some(e) => {
                output::list_item(&format!(
                    "{} {} after {}",
                    output::style_error("failed"),
                    action.id(),
                    elapsed
                ));
                if let Some(query) = e.query() {
                    output::code(query);
                }
            }
        }
    }

    fn after_execute(&self, response: &ExecutionResponse, error: Option<&MigrationError>) {
        output::newline();
        match error {
            None if response.successful.is_empty() => output::info("Nothing executed"),
            None => output::success(&response.summary()),
            Some(_) => output::warn(&response.summary()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}

//! Commands that move the ledger: `migrate`, `rewind`, `reset`, `do`, `undo`,
//! `step` and `to`.

use waypoint_migrate::{ExecutionContext, MigratorConfig, Operation, Plan};

use crate::cli::{GlobalArgs, RunArgs};
use crate::error::{CliError, CliResult};
use crate::output;
use crate::reporter::CliReporter;

use super::{SqlMigrator, SqlSession};

/// Plan `operation`, confirm it, and execute it under the ledger lock.
pub async fn run(global: &GlobalArgs, operation: Operation, args: &RunArgs) -> CliResult<()> {
    output::header(&format!("Waypoint {}", operation));

    let config = super::load_config(global)?;
    super::print_settings(&config);

    let settings = MigratorConfig::new()
        .lock(!args.no_lock)
        .reporter(CliReporter::new());
    let migrator = super::connect(&config, settings)?;

    let result = if args.plan_only {
        preview(&migrator, &operation).await
    } else {
        if args.no_lock {
            output::warn("Running without the ledger lock");
        } else if !config.database.driver.supports_locking() {
            output::warn("The generic driver takes no lock; concurrent runs are not excluded");
        }
        execute(&migrator, &operation, args).await
    };

    migrator.target().pool().close();
    result
}

/// Print the plan without locking, creating or changing anything.
async fn preview(migrator: &SqlMigrator, operation: &Operation) -> CliResult<()> {
    let plan = migrator
        .plan(operation)
        .await
        .map_err(CliError::planning)?;
    show(&plan)?;
    output::dim("Plan only; nothing was executed.");
    Ok(())
}

async fn execute(migrator: &SqlMigrator, operation: &Operation, args: &RunArgs) -> CliResult<()> {
    let ctx = ExecutionContext::new();
    let session = migrator.begin(&ctx).await?;
    let result = confirm_and_execute(&session, &ctx, operation, args).await;
    session.finish(result).await
}

/// Plan under the lock, confirm, then execute that same plan.
async fn confirm_and_execute(
    session: &SqlSession<'_>,
    ctx: &ExecutionContext,
    operation: &Operation,
    args: &RunArgs,
) -> CliResult<()> {
    let plan = session
        .plan(operation)
        .await
        .map_err(CliError::planning)?;
    show(&plan)?;

    if !args.yes {
        if !output::is_interactive() {
            output::warn("stdin is not a terminal; pass --yes to run without confirmation");
            return Err(CliError::Cancelled);
        }
        if !output::confirm("Execute this plan?") {
            return Err(CliError::Cancelled);
        }
        output::newline();
    }

    // Ctrl-C cancels the in-flight step; the ledger keeps it dirty.
    let token = ctx.token().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = session.execute(ctx, &plan).await;
    interrupt.abort();

    result?;
    Ok(())
}

fn show(plan: &Plan) -> CliResult<()> {
    if plan.is_empty() {
        return Err(CliError::NothingToDo);
    }
    output::plan(plan);
    Ok(())
}

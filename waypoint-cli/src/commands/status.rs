//! `waypoint status` command - Compare migration files with the ledger.

use waypoint_migrate::{MigrationStatus, MigratorConfig};

use crate::cli::{GlobalArgs, StatusArgs};
use crate::error::{CliError, CliResult};
use crate::output::{self, kv, success, warn};

/// Run the status command
pub async fn run(global: &GlobalArgs, args: StatusArgs) -> CliResult<()> {
    let config = super::load_config(global)?;
    let migrator = super::connect(&config, MigratorConfig::new())?;

    let status = migrator.status().await.map_err(CliError::planning)?;
    migrator.target().pool().close();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    output::header("Migration Status");
    super::print_settings(&config);
    print_status(&status);
    Ok(())
}

fn print_status(status: &MigrationStatus) {
    if status.migrations.is_empty() {
        output::info("No migrations found.");
        output::newline();
        output::section("Getting started");
        output::list_item("Run `waypoint create <name>` to create your first migration");
        return;
    }

    output::section("Migrations");
    for (i, migration) in status.migrations.iter().enumerate() {
        let state = if migration.applied {
            output::style_success("✓ Applied")
        } else {
            output::style_pending("○ Pending")
        };
        let reversible = if migration.reversible { "" } else { " (irreversible)" };
        output::numbered_item(
            i + 1,
            &format!(
                "{}_{} - {}{}",
                migration.id, migration.description, state, reversible
            ),
        );
    }
    output::newline();

    if !status.unknown.is_empty() {
        warn("Applied migrations missing from the migrations directory:");
        for id in &status.unknown {
            output::list_item(&output::style_error(id));
        }
        output::newline();
    }

    kv("Total", &status.migrations.len().to_string());
    kv("Applied", &status.applied_count().to_string());
    kv("Pending", &status.pending_count().to_string());
    kv("Current", status.current.as_deref().unwrap_or("(none)"));
    output::newline();

    if status.is_up_to_date() {
        success("Up to date");
    }
}

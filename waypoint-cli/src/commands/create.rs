//! `waypoint create` command - Write new migration files.

use waypoint_migrate::create_migration_files;

use crate::cli::{CreateArgs, GlobalArgs};
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the create command
pub async fn run(global: &GlobalArgs, args: CreateArgs) -> CliResult<()> {
    let config = super::load_config(global)?;
    let dir = &config.migrations.directory;

    let files = create_migration_files(dir, &args.name, !args.irreversible).await?;

    success(&format!("Created migration '{}'", args.name));
    for file in &files {
        output::list_item(&file.display().to_string());
    }
    if args.irreversible {
        output::dim("No undo file was written; this migration cannot be rewound.");
    }

    Ok(())
}

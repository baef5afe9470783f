//! `waypoint version` command - Display version information.

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::header("Waypoint");

    kv("Version", VERSION);
    kv("Binary", "waypoint");

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);
    kv("Drivers", "generic, postgres");

    output::newline();
    output::section("Components");
    kv("waypoint-migrate", VERSION);
    kv("waypoint-postgres", VERSION);

    Ok(())
}

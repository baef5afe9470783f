//! Log subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise only warnings are shown, or
/// debug output for the Waypoint crates with `--verbose`.
pub fn init(verbose: bool) {
    let default = if verbose {
        "warn,waypoint_migrate=debug,waypoint_postgres=debug,waypoint_cli=debug"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

//! Waypoint CLI - Command-line interface for Waypoint migrations.

use clap::Parser;

use waypoint_cli::cli::{Cli, Command};
use waypoint_cli::commands;
use waypoint_cli::error::{exit_code, CliError, CliResult};
use waypoint_cli::{logging, output};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    let code = match run(cli).await {
        Ok(()) => exit_code::SUCCESS,
        Err(CliError::NothingToDo) => {
            output::info("Nothing to do");
            exit_code::NOTHING_TO_DO
        }
        Err(CliError::Cancelled) => {
            output::newline();
            output::warn("Cancelled");
            exit_code::CANCELLED
        }
        Err(e) => {
            let code = e.exit_code();
            output::newline();
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> CliResult<()> {
    let global = cli.global;

    if let Some((operation, args)) = cli.command.operation() {
        return commands::run::run(&global, operation, args).await;
    }

    match cli.command {
        Command::Status(args) => commands::status::run(&global, args).await,
        Command::Create(args) => commands::create::run(&global, args).await,
        Command::Version => commands::version::run().await,
        // Run commands returned above.
        _ => Ok(()),
    }
}

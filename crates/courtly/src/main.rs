mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use courtly_core::AvailabilityController;

use crate::cli::{Cli, Command, SlotsArgs, SlotsCommand};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands manage the file; no service connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "courtly", &mut std::io::stdout());
            Ok(())
        }

        // Everything else talks to the service
        cmd => {
            let (mut service, session) = config::resolve_service(&cli.global)?;
            service.feed_enabled = wants_feed(&cmd);

            let controller = AvailabilityController::connect(&service)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &controller, session.as_ref(), &cli.global).await;
            controller.shutdown().await;
            result
        }
    }
}

/// Only `slots watch` keeps the live change feed open.
fn wants_feed(cmd: &Command) -> bool {
    matches!(
        cmd,
        Command::Slots(SlotsArgs {
            command: SlotsCommand::Watch(_)
        })
    )
}

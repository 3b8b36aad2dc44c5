mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use obsdeck_api::WebSocketConnector;
use obsdeck_core::{ConnectTarget, Session};

use crate::cli::{Cli, Command, GlobalOpts};
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
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Presets are managed without an OBS connection
        Command::Presets(args) => commands::presets::handle(args, &cli.global).await,

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "obsdeck", &mut std::io::stdout());
            Ok(())
        }

        Command::Watch(args) => {
            let (session, target) = open_session(&cli.global).await?;
            commands::watch::handle(&session, target, &args, &cli.global).await
        }

        Command::Control(cmd) => {
            let (session, target) = open_session(&cli.global).await?;
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &session, target, &cli.global).await
        }
    }
}

/// Resolve the connection target and build an unconnected session.
async fn open_session(global: &GlobalOpts) -> Result<(Session, ConnectTarget), CliError> {
    let cfg = obsdeck_config::load_config()?;
    let connection = config::resolve_connection(global, &cfg).await?;
    let connector = Arc::new(WebSocketConnector::new(connection.transport));
    tracing::debug!(target = %connection.target.key(), "session target resolved");
    Ok((
        Session::new(connector, cfg.session_settings()),
        connection.target,
    ))
}

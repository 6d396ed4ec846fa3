mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use plantwatch_config::FileSettingsStore;
use plantwatch_core::{Coordinator, HubClient};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

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
    let path = cli
        .global
        .config
        .clone()
        .unwrap_or_else(plantwatch_config::config_path);
    let store = FileSettingsStore::new(path);

    match cli.command {
        // Config commands work without a reachable hub
        Command::Config(args) => commands::config_cmd::handle(args, &store, &cli.global).await,

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "plantwatch", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let coordinator = build_coordinator(&store, &cli.global)?;
            tracing::debug!(command = ?cmd, path = %store.path().display(), "dispatching command");
            commands::dispatch(cmd, &coordinator, &store, &cli.global)
                .await
                .map_err(|e| with_settings_path(e, &store))
        }
    }
}

/// Build a coordinator over the settings file, with `--timeout` taking
/// precedence over the file's request timeout.
pub(crate) fn build_coordinator(
    store: &FileSettingsStore,
    global: &GlobalOpts,
) -> Result<Coordinator, CliError> {
    let mut transport = store.config().transport();
    if let Some(secs) = global.timeout {
        transport.timeout = Duration::from_secs(secs.max(1));
    }

    let hub = HubClient::new(&transport).map_err(plantwatch_core::CoreError::from)?;
    Ok(Coordinator::new(hub, Arc::new(store.clone())))
}

/// Point the setup hint at the settings file actually in use.
fn with_settings_path(err: CliError, store: &FileSettingsStore) -> CliError {
    match err {
        CliError::NotConfigured { .. } => CliError::NotConfigured {
            path: store.path().display().to_string(),
        },
        other => other,
    }
}

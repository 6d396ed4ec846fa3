//! Config subcommand handlers.

use std::io::BufRead;

use dialoguer::{Confirm, Input};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use plantwatch_config::{Config, FileSettingsStore, load_file, save_config};
use plantwatch_core::SettingsStore;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

// ── Show view ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ConfigView<'a> {
    path: String,
    token: &'static str,
    #[serde(flatten)]
    config: &'a Config,
}

fn token_state(store: &FileSettingsStore) -> &'static str {
    match store.load_secret_token() {
        Ok(token) if token.expose_secret().is_empty() => "not set",
        Ok(_) => "set",
        Err(_) => "unavailable",
    }
}

fn show_detail(view: &ConfigView<'_>) -> String {
    let cfg = view.config;
    let mut lines = vec![
        format!("Settings file:      {}", view.path),
        format!(
            "Hub address:        {}",
            if cfg.hub_address.is_empty() {
                "(not set)"
            } else {
                cfg.hub_address.as_str()
            }
        ),
        format!("Access token:       {}", view.token),
        format!("Refresh interval:   {}s", cfg.refresh_interval),
        format!("Healthy threshold:  {}%", cfg.healthy_threshold),
        format!("Critical threshold: {}%", cfg.critical_threshold),
        format!("Request timeout:    {}s", cfg.timeout),
        format!("Accept bad certs:   {}", cfg.accept_invalid_certs),
    ];
    if !cfg.custom_names.is_empty() {
        lines.push("Custom names:".into());
        for (id, name) in &cfg.custom_names {
            lines.push(format!("  #{id}  {name}"));
        }
    }
    lines.join("\n")
}

// ── Token input ─────────────────────────────────────────────────────

fn read_token(from_stdin: bool) -> Result<SecretString, CliError> {
    let raw = if from_stdin {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line
    } else {
        rpassword::prompt_password("Maker API access token: ").map_err(prompt_err)?
    };

    let token = raw.trim();
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "access token cannot be empty".into(),
        });
    }
    Ok(SecretString::from(token.to_owned()))
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: ConfigArgs,
    store: &FileSettingsStore,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(store, global).await,

        ConfigCommand::Show => {
            let cfg = store.config();
            let view = ConfigView {
                path: store.path().display().to_string(),
                token: token_state(store),
                config: &cfg,
            };
            let out = output::render_single(&global.output, &view, show_detail, |v| {
                format!("{}\t{}", v.config.hub_address, v.token)
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = load_file(store.path())?;
            cfg.set_value(&key, &value)?;
            save_config(store.path(), &cfg)?;
            if !global.quiet {
                eprintln!("{key} = {value}");
            }
            Ok(())
        }

        ConfigCommand::SetToken { stdin } => {
            let token = read_token(stdin)?;
            store.save_secret_token(&token)?;
            if !global.quiet {
                eprintln!("Access token stored in the system keyring");
            }
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", store.path().display());
            Ok(())
        }
    }
}

/// Interactive first-time setup: hub address, token, then an optional
/// connection check.
async fn init(store: &FileSettingsStore, global: &GlobalOpts) -> Result<(), CliError> {
    eprintln!("plantwatch setup");
    eprintln!("   Settings file: {}\n", store.path().display());

    let current = store.config();
    let mut prompt = Input::<String>::new().with_prompt("Hub address (IP or host name)");
    if !current.hub_address.is_empty() {
        prompt = prompt.default(current.hub_address.clone());
    }
    let address: String = prompt.interact_text().map_err(prompt_err)?;
    let address = address.trim();
    if address.is_empty() {
        return Err(CliError::Validation {
            field: "hub_address".into(),
            reason: "hub address cannot be empty".into(),
        });
    }

    let token = read_token(false)?;

    let coordinator = crate::build_coordinator(store, global)?;
    coordinator.update_credentials(address, &token)?;
    eprintln!("Saved to {}", store.path().display());

    let check = Confirm::new()
        .with_prompt("Test the connection now?")
        .default(true)
        .interact()
        .map_err(prompt_err)?;
    if check {
        coordinator.test_connection().await?;
        eprintln!("Connected to hub at {address}");
    }
    Ok(())
}

//! Clap derive structures for the `plantwatch` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// plantwatch -- keep an eye on your soil moisture sensors
#[derive(Debug, Parser)]
#[command(
    name = "plantwatch",
    version,
    about = "Check Hubitat soil moisture sensors from the command line",
    long_about = "Polls a Hubitat hub's Maker API for moisture sensors, classifies each \
        plant against your thresholds, and reports which ones need water.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Settings file to use instead of the platform default
    #[arg(long, env = "PLANTWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PLANTWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides the settings file)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one sensor per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refresh once and show every moisture sensor
    #[command(alias = "s")]
    Status,

    /// Keep refreshing on the configured interval until interrupted
    #[command(alias = "w")]
    Watch,

    /// Mark a sensor as just watered for the next 24 hours
    Water(SensorIdArg),

    /// Clear a sensor's just-watered mark
    Unwater(SensorIdArg),

    /// Give a sensor a custom name, or remove it when no name is given
    Rename(RenameArgs),

    /// Check that the hub answers with the stored address and token
    Test,

    /// Manage the settings file and access token
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Sensor commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SensorIdArg {
    /// Hub device id of the sensor
    pub id: i64,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Hub device id of the sensor
    pub id: i64,

    /// New display name; omit to go back to the hub's name
    pub name: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive first-time setup
    Init,

    /// Show current settings (token redacted)
    Show,

    /// Set a setting
    Set {
        /// hub_address, refresh_interval, healthy_threshold,
        /// critical_threshold, timeout, or accept_invalid_certs
        key: String,
        /// New value
        value: String,
    },

    /// Store the Maker API access token in the system keyring
    SetToken {
        /// Read the token from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },

    /// Print the settings file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use plantwatch_config::ConfigError;
use plantwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the hub: {reason}")]
    #[diagnostic(
        code(plantwatch::connection_failed),
        help(
            "Check that the hub is powered on and reachable from this machine.\n\
             Try: plantwatch test"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Hub returned an error: {message}")]
    #[diagnostic(
        code(plantwatch::api_error),
        help("Check that the Maker API app is installed and exposes your sensors.")
    )]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(plantwatch::auth_failed),
        help(
            "The hub rejected the access token.\n\
             Copy it from the Maker API app and run: plantwatch config set-token"
        )
    )]
    AuthFailed,

    #[error("Hub address or access token is not configured")]
    #[diagnostic(
        code(plantwatch::not_configured),
        help(
            "Run: plantwatch config init\n\
             Or set PLANTWATCH_HUB_ADDRESS and PLANTWATCH_TOKEN.\n\
             Settings file: {path}"
        )
    )]
    NotConfigured { path: String },

    // ── Sensors ──────────────────────────────────────────────────────
    #[error("No moisture sensor with id {id}")]
    #[diagnostic(
        code(plantwatch::not_found),
        help("Run: plantwatch status to see available sensors")
    )]
    SensorNotFound { id: i64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(plantwatch::validation))]
    Validation { field: String, reason: String },

    // ── Storage ──────────────────────────────────────────────────────
    #[error("Could not access the system keyring: {message}")]
    #[diagnostic(
        code(plantwatch::secret_store),
        help("Set PLANTWATCH_TOKEN to bypass the keyring.")
    )]
    SecretStore { message: String },

    #[error("Could not save settings: {message}")]
    #[diagnostic(code(plantwatch::settings))]
    Settings { message: String },

    #[error(transparent)]
    #[diagnostic(code(plantwatch::config))]
    Config(#[from] ConfigError),

    // ── IO / tasks ───────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Background refresh task failed: {0}")]
    #[diagnostic(code(plantwatch::task))]
    Task(#[from] tokio::task::JoinError),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed => exit_code::AUTH,
            Self::SensorNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config(ConfigError::Validation { .. } | ConfigError::UnknownKey(_)) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Network { message } => CliError::ConnectionFailed { reason: message },
            CoreError::Api { message, status } => CliError::ApiError { message, status },
            CoreError::Authentication => CliError::AuthFailed,
            CoreError::InvalidConfiguration => CliError::NotConfigured {
                path: String::from("(see: plantwatch config path)"),
            },
            CoreError::SecretStore { message } => CliError::SecretStore { message },
            CoreError::Settings { message } => CliError::Settings { message },
        }
    }
}

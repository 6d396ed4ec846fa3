// ── Core error types ──
//
// The domain error taxonomy. Consumers branch on the variant (or on
// `ErrorKind`), never on message contents. The `From<plantwatch_api::Error>`
// impl folds transport-layer failures into these kinds.

use thiserror::Error;

/// Unified error type for the core crate.
///
/// `Clone` so the last failure can travel inside published snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Transport-level failure or an unreadable response. A later poll may succeed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The hub answered with a non-2xx status or an undecodable device id.
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    /// The hub rejected the access token.
    #[error("Authentication failed. Please check your access token.")]
    Authentication,

    /// Hub address or access token is missing.
    #[error("Invalid configuration. Please check your hub address and access token.")]
    InvalidConfiguration,

    /// Reading or writing the access token failed.
    #[error("Secret store error: {message}")]
    SecretStore { message: String },

    /// Persisting settings failed.
    #[error("Settings error: {message}")]
    Settings { message: String },
}

/// Discriminant of [`CoreError`] for callers that only care about the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Api,
    Authentication,
    InvalidConfiguration,
    SecretStore,
    Settings,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Api { .. } => ErrorKind::Api,
            Self::Authentication => ErrorKind::Authentication,
            Self::InvalidConfiguration => ErrorKind::InvalidConfiguration,
            Self::SecretStore { .. } => ErrorKind::SecretStore,
            Self::Settings { .. } => ErrorKind::Settings,
        }
    }

    /// Errors a presentation layer should answer by prompting for setup or credentials.
    pub fn needs_setup(&self) -> bool {
        matches!(self, Self::Authentication | Self::InvalidConfiguration)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<plantwatch_api::Error> for CoreError {
    fn from(err: plantwatch_api::Error) -> Self {
        match err {
            plantwatch_api::Error::NotConfigured | plantwatch_api::Error::InvalidUrl(_) => {
                CoreError::InvalidConfiguration
            }
            plantwatch_api::Error::Authentication => CoreError::Authentication,
            plantwatch_api::Error::Api { status, message } => CoreError::Api {
                message: format!("HTTP {status}: {message}"),
                status: Some(status),
            },
            plantwatch_api::Error::InvalidDeviceId { raw } => CoreError::Api {
                message: format!("invalid device id {raw:?}"),
                status: None,
            },
            plantwatch_api::Error::Transport(e) => CoreError::Network {
                message: e.to_string(),
            },
            plantwatch_api::Error::Deserialization { message, .. } => CoreError::Network {
                message: format!("unexpected response: {message}"),
            },
            plantwatch_api::Error::Client(message) => CoreError::Network { message },
        }
    }
}

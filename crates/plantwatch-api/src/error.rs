use thiserror::Error;

/// Top-level error type for the `plantwatch-api` crate.
///
/// Covers every failure mode of the Maker API surface: missing
/// configuration, authentication, non-2xx responses, transport, and
/// response decoding. `plantwatch-core` maps these into the domain
/// error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// Hub address or access token is empty. Raised before any request is sent.
    #[error("Hub address or access token is not configured")]
    NotConfigured,

    /// The configured hub address does not form a valid URL.
    #[error("Invalid hub URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    // ── Authentication ──────────────────────────────────────────────
    /// The hub rejected the access token (HTTP 401).
    #[error("Authentication failed -- the hub rejected the access token")]
    Authentication,

    // ── HTTP ────────────────────────────────────────────────────────
    /// Any non-2xx status other than 401.
    #[error("Hub returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Connection refused, DNS failure, timeout, etc.
    ///
    /// The request URL is stripped before wrapping so the access token
    /// never ends up in a rendered error.
    #[error("HTTP transport error: {0}")]
    Transport(reqwest::Error),

    // ── Data ────────────────────────────────────────────────────────
    /// The response body did not have the expected shape.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A device id arrived as a string that is not an integer.
    #[error("Invalid device id {raw:?}: expected an integer")]
    InvalidDeviceId { raw: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.without_url())
    }
}

impl Error {
    /// Returns `true` if this is a transient error a later poll may not hit.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

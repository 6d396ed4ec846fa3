// Maker API HTTP client
//
// Wraps `reqwest::Client` with hub URL construction, query-parameter
// token auth, and status-code mapping. The token never appears in logs:
// requests are logged by path only.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{Device, DeviceAttribute, DeviceId, RawDevice, attributes_from_detail};
use crate::transport::TransportConfig;

/// Fixed Maker API path segment (app endpoint + API version).
pub const API_PATH: &str = "apps/api/242";

/// Async client for a single hub's Maker API.
///
/// Cheap to clone; the inner `reqwest::Client` is shared. A client built
/// with [`new`](Self::new) carries no credentials, so
/// [`with_credentials`](Self::with_credentials) is used to derive a
/// configured client from the current settings on every refresh.
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    hub_address: String,
    access_token: SecretString,
}

impl HubClient {
    /// Build an unconfigured client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?))
    }

    /// Wrap a pre-built `reqwest::Client` (caller manages headers and timeout).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            hub_address: String::new(),
            access_token: SecretString::from(String::new()),
        }
    }

    /// Derive a client for the given hub address and token, sharing the
    /// underlying connection pool.
    pub fn with_credentials(&self, hub_address: impl Into<String>, token: SecretString) -> Self {
        Self {
            http: self.http.clone(),
            hub_address: hub_address.into(),
            access_token: token,
        }
    }

    /// `true` iff both the hub address and the access token are non-empty.
    pub fn is_configured(&self) -> bool {
        !self.hub_address.is_empty() && !self.access_token.expose_secret().is_empty()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Root URL of the hub: the address as-is when it carries a scheme,
    /// otherwise prefixed with `http://`.
    pub fn base_url(&self) -> Result<Url, Error> {
        let address = self.hub_address.trim_end_matches('/');
        let full = if address.contains("://") {
            address.to_owned()
        } else {
            format!("http://{address}")
        };
        Ok(Url::parse(&full)?)
    }

    /// `{base}/apps/api/242/{path}?access_token={token}`
    fn endpoint_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url()?;
        let root = base.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{root}/{API_PATH}/{path}"))?;
        url.query_pairs_mut()
            .append_pair("access_token", self.access_token.expose_secret());
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET and return the body of a 2xx response.
    async fn get_body(&self, path: &str) -> Result<String, Error> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }

        let url = self.endpoint_url(path)?;
        debug!(path = url.path(), "GET");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(Error::Api {
                status: status.as_u16(),
                message: if preview.is_empty() {
                    status.to_string()
                } else {
                    preview
                },
            });
        }

        Ok(resp.text().await?)
    }

    fn deserialization_error(err: &serde_json::Error, body: String) -> Error {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body,
        }
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// List every device exposed to the Maker API app.
    pub async fn fetch_devices(&self) -> Result<Vec<Device>, Error> {
        let body = self.get_body("devices").await?;
        let raw: Vec<RawDevice> =
            serde_json::from_str(&body).map_err(|e| Self::deserialization_error(&e, body))?;
        raw.into_iter().map(Device::try_from).collect()
    }

    /// Fetch the current attributes of one device.
    pub async fn fetch_device_attributes(
        &self,
        device_id: DeviceId,
    ) -> Result<Vec<DeviceAttribute>, Error> {
        let body = self.get_body(&format!("devices/{device_id}")).await?;
        let detail: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| Self::deserialization_error(&e, body))?;
        Ok(attributes_from_detail(&detail))
    }

    /// `Ok(true)` iff the device listing succeeds; failures propagate unchanged.
    pub async fn test_connection(&self) -> Result<bool, Error> {
        self.fetch_devices().await?;
        Ok(true)
    }
}

//! Settings file and secret storage for plantwatch.
//!
//! A TOML settings file (layered with `PLANTWATCH_*` environment
//! overrides) plus the system keyring for the hub access token, exposed to
//! the core as a [`SettingsStore`] implementation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use plantwatch_core::settings::{
    DEFAULT_CRITICAL_THRESHOLD, DEFAULT_HEALTHY_THRESHOLD, DEFAULT_REFRESH_INTERVAL_SECS,
    MAX_REFRESH_INTERVAL_SECS, MIN_REFRESH_INTERVAL_SECS,
};
use plantwatch_core::{CoreError, DeviceId, Settings, SettingsStore, TransportConfig};

/// Environment variable that overrides the stored access token.
pub const TOKEN_ENV: &str = "PLANTWATCH_TOKEN";
/// Keyring service name.
pub const KEYRING_SERVICE: &str = "plantwatch";
/// Keyring user under which the hub token is stored.
pub const KEYRING_USER: &str = "hub-token";

const ENV_PREFIX: &str = "PLANTWATCH_";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Keyring(e) => CoreError::SecretStore {
                message: e.to_string(),
            },
            other => CoreError::Settings {
                message: other.to_string(),
            },
        }
    }
}

// ── TOML config struct ──────────────────────────────────────────────

/// On-disk settings. Device-id map keys are strings because TOML tables
/// only have string keys.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Hub IP or host name, optionally with a scheme and port.
    pub hub_address: String,

    /// Polling period in seconds.
    pub refresh_interval: u64,

    pub healthy_threshold: f64,
    pub critical_threshold: f64,

    /// Per-request timeout in seconds.
    pub timeout: u64,

    /// Accept self-signed certificates for `https://` hubs.
    pub accept_invalid_certs: bool,

    pub custom_names: BTreeMap<String, String>,
    pub just_watered_sensors: Vec<i64>,
    pub just_watered_timestamps: BTreeMap<String, DateTime<Utc>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub_address: String::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
            healthy_threshold: DEFAULT_HEALTHY_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            timeout: DEFAULT_TIMEOUT_SECS,
            accept_invalid_certs: false,
            custom_names: BTreeMap::new(),
            just_watered_sensors: Vec::new(),
            just_watered_timestamps: BTreeMap::new(),
        }
    }
}

fn parse_key(key: &str, table: &str) -> Option<DeviceId> {
    match key.trim().parse::<DeviceId>() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(key, table, "skipping entry with non-numeric device id");
            None
        }
    }
}

fn positive_or(value: f64, default: f64) -> f64 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        default
    }
}

impl Config {
    /// Core view of the file. Zero interval or thresholds mean defaults.
    pub fn to_settings(&self) -> Settings {
        Settings {
            hub_address: self.hub_address.trim().to_owned(),
            refresh_interval_secs: if self.refresh_interval == 0 {
                DEFAULT_REFRESH_INTERVAL_SECS
            } else {
                self.refresh_interval
            },
            healthy_threshold: positive_or(self.healthy_threshold, DEFAULT_HEALTHY_THRESHOLD),
            critical_threshold: positive_or(self.critical_threshold, DEFAULT_CRITICAL_THRESHOLD),
            custom_names: self
                .custom_names
                .iter()
                .filter_map(|(k, v)| Some((parse_key(k, "custom_names")?, v.clone())))
                .collect(),
            just_watered_sensors: self
                .just_watered_sensors
                .iter()
                .copied()
                .map(DeviceId)
                .collect(),
            just_watered_timestamps: self
                .just_watered_timestamps
                .iter()
                .filter_map(|(k, v)| Some((parse_key(k, "just_watered_timestamps")?, *v)))
                .collect(),
        }
    }

    /// Overwrite the core-owned fields; transport fields are left alone.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.hub_address.clone_from(&settings.hub_address);
        self.refresh_interval = settings.refresh_interval_secs;
        self.healthy_threshold = settings.healthy_threshold;
        self.critical_threshold = settings.critical_threshold;
        self.custom_names = settings
            .custom_names
            .iter()
            .map(|(id, name)| (id.to_string(), name.clone()))
            .collect();
        self.just_watered_sensors = settings
            .just_watered_sensors
            .iter()
            .map(|id| id.get())
            .collect();
        self.just_watered_timestamps = settings
            .just_watered_timestamps
            .iter()
            .map(|(id, at)| (id.to_string(), *at))
            .collect();
    }

    /// Like [`apply_settings`](Self::apply_settings), except the scalars
    /// that env vars can override are written only when `after` differs
    /// from `before`, the view the change was made against.
    pub fn apply_changes(&mut self, before: &Settings, after: &Settings) {
        let hub_address = std::mem::take(&mut self.hub_address);
        let refresh_interval = self.refresh_interval;
        let healthy_threshold = self.healthy_threshold;
        let critical_threshold = self.critical_threshold;

        self.apply_settings(after);

        if after.hub_address == before.hub_address {
            self.hub_address = hub_address;
        }
        if after.refresh_interval_secs == before.refresh_interval_secs {
            self.refresh_interval = refresh_interval;
        }
        if after.healthy_threshold.to_bits() == before.healthy_threshold.to_bits() {
            self.healthy_threshold = healthy_threshold;
        }
        if after.critical_threshold.to_bits() == before.critical_threshold.to_bits() {
            self.critical_threshold = critical_threshold;
        }
    }

    pub fn transport(&self) -> TransportConfig {
        let secs = if self.timeout == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            self.timeout
        };
        TransportConfig {
            timeout: Duration::from_secs(secs),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }

    /// Set one scalar setting from its textual form, enforcing the
    /// preference ranges.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "hub_address" => self.hub_address = value.trim().to_owned(),
            "refresh_interval" => {
                self.refresh_interval = parse_in_range(
                    key,
                    value,
                    MIN_REFRESH_INTERVAL_SECS,
                    MAX_REFRESH_INTERVAL_SECS,
                )?;
            }
            "healthy_threshold" => {
                self.healthy_threshold = parse_in_range(key, value, 10.0, 80.0)?;
            }
            "critical_threshold" => {
                self.critical_threshold = parse_in_range(key, value, 5.0, 50.0)?;
            }
            "timeout" => self.timeout = parse_in_range(key, value, 1, 300)?,
            "accept_invalid_certs" => {
                self.accept_invalid_certs = value.parse().map_err(|_| ConfigError::Validation {
                    field: key.into(),
                    reason: format!("expected 'true' or 'false', got '{value}'"),
                })?;
            }
            other => return Err(ConfigError::UnknownKey(other.into())),
        }
        Ok(())
    }
}

fn parse_in_range<T>(field: &str, value: &str, min: T, max: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let parsed: T = value.trim().parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{value}' is not a number"),
    })?;
    if parsed < min || parsed > max {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("must be between {min} and {max}, got {parsed}"),
        });
    }
    Ok(parsed)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "plantwatch", "plantwatch").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("plantwatch");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load defaults, then the file at `path`, then `PLANTWATCH_*` env vars.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).only(&[
            "hub_address",
            "refresh_interval",
            "healthy_threshold",
            "critical_threshold",
            "timeout",
            "accept_invalid_certs",
        ]))
        .extract()?;
    Ok(config)
}

/// The file alone, without env overrides, so saving never persists them.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(config)
}

/// Load config, falling back to defaults on any error.
pub fn load_config_or_default(path: &Path) -> Config {
    load_config(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
        Config::default()
    })
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Token storage ───────────────────────────────────────────────────

/// Read the hub token: `PLANTWATCH_TOKEN` first, then the keyring.
///
/// A missing keyring entry is an empty token, not an error.
pub fn load_token(service: &str) -> Result<SecretString, ConfigError> {
    if let Ok(val) = std::env::var(TOKEN_ENV) {
        if !val.is_empty() {
            return Ok(SecretString::from(val));
        }
    }

    let entry = keyring::Entry::new(service, KEYRING_USER)?;
    match entry.get_password() {
        Ok(secret) => Ok(SecretString::from(secret)),
        Err(keyring::Error::NoEntry) => Ok(SecretString::from(String::new())),
        Err(e) => Err(e.into()),
    }
}

/// Store the hub token in the keyring; an empty token deletes it.
pub fn save_token(service: &str, token: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(service, KEYRING_USER)?;
    if token.expose_secret().is_empty() {
        return match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        };
    }
    entry.set_password(token.expose_secret())?;
    Ok(())
}

// ── SettingsStore implementation ────────────────────────────────────

/// `SettingsStore` over a TOML file and the system keyring.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full file config with env overrides applied.
    pub fn config(&self) -> Config {
        load_config_or_default(&self.path)
    }
}

impl SettingsStore for FileSettingsStore {
    fn load_settings(&self) -> Settings {
        self.config().to_settings()
    }

    /// Writes only what the caller changed relative to [`load_settings`],
    /// so env overrides never reach the file. An unreadable file is left
    /// untouched and reported as a settings error.
    ///
    /// [`load_settings`]: SettingsStore::load_settings
    fn save_settings(&self, settings: &Settings) -> Result<(), CoreError> {
        let mut cfg = load_file(&self.path)?;
        cfg.apply_changes(&self.load_settings(), settings);
        save_config(&self.path, &cfg)?;
        Ok(())
    }

    fn load_secret_token(&self) -> Result<SecretString, CoreError> {
        Ok(load_token(KEYRING_SERVICE)?)
    }

    fn save_secret_token(&self, token: &SecretString) -> Result<(), CoreError> {
        Ok(save_token(KEYRING_SERVICE, token)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let cfg = Config {
            refresh_interval: 0,
            healthy_threshold: 0.0,
            critical_threshold: 0.0,
            timeout: 0,
            ..Config::default()
        };
        let settings = cfg.to_settings();
        assert_eq!(settings.refresh_interval_secs, 1800);
        assert!((settings.healthy_threshold - 40.0).abs() < f64::EPSILON);
        assert!((settings.critical_threshold - 20.0).abs() < f64::EPSILON);
        assert_eq!(cfg.transport().timeout, Duration::from_secs(30));
    }

    #[test]
    fn bad_map_keys_are_skipped() {
        let mut cfg = Config::default();
        cfg.custom_names.insert("5".into(), "Basil".into());
        cfg.custom_names.insert("kitchen".into(), "Fern".into());

        let settings = cfg.to_settings();
        assert_eq!(settings.custom_names.len(), 1);
        assert_eq!(settings.custom_name(DeviceId(5)), Some("Basil"));
    }

    #[test]
    fn set_value_enforces_preference_ranges() {
        let mut cfg = Config::default();
        cfg.set_value("refresh_interval", "600").unwrap();
        assert_eq!(cfg.refresh_interval, 600);

        assert!(matches!(
            cfg.set_value("refresh_interval", "60"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            cfg.set_value("healthy_threshold", "95"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            cfg.set_value("critical_threshold", "abc"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            cfg.set_value("colour", "red"),
            Err(ConfigError::UnknownKey(_))
        ));

        cfg.set_value("critical_threshold", "12.5").unwrap();
        assert!((cfg.critical_threshold - 12.5).abs() < f64::EPSILON);
        cfg.set_value("accept_invalid_certs", "true").unwrap();
        assert!(cfg.transport().accept_invalid_certs);
    }

    #[test]
    fn keyring_errors_map_to_secret_store() {
        let err: CoreError = ConfigError::Keyring(keyring::Error::NoEntry).into();
        assert!(matches!(err, CoreError::SecretStore { .. }));

        let err: CoreError = ConfigError::UnknownKey("x".into()).into();
        assert!(matches!(err, CoreError::Settings { .. }));
    }
}

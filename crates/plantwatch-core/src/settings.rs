// ── Settings and the settings/secret store seam ──
//
// The core never persists anything itself. It reads `Settings` and the
// access token through `SettingsStore` at the start of each operation
// and writes back through the same trait.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::DeviceId;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 1800;
/// Bounds offered when the interval is edited; not enforced here.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 300;
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 7200;
pub const DEFAULT_HEALTHY_THRESHOLD: f64 = 40.0;
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 20.0;

/// How long a manual "just watered" mark overrides the moisture reading.
pub const JUST_WATERED_WINDOW_HOURS: i64 = 24;

/// User-facing configuration read at the start of every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hub_address: String,
    pub refresh_interval_secs: u64,
    pub healthy_threshold: f64,
    pub critical_threshold: f64,
    pub custom_names: BTreeMap<DeviceId, String>,
    pub just_watered_sensors: BTreeSet<DeviceId>,
    pub just_watered_timestamps: BTreeMap<DeviceId, DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hub_address: String::new(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            healthy_threshold: DEFAULT_HEALTHY_THRESHOLD,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            custom_names: BTreeMap::new(),
            just_watered_sensors: BTreeSet::new(),
            just_watered_timestamps: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Polling period; an unset (zero) interval means the default.
    pub fn refresh_interval(&self) -> Duration {
        let secs = if self.refresh_interval_secs == 0 {
            DEFAULT_REFRESH_INTERVAL_SECS
        } else {
            self.refresh_interval_secs
        };
        Duration::from_secs(secs)
    }

    /// Record a watering at `at`, replacing any earlier mark.
    pub fn mark_watered(&mut self, id: DeviceId, at: DateTime<Utc>) {
        self.just_watered_sensors.insert(id);
        self.just_watered_timestamps.insert(id, at);
    }

    pub fn clear_watered(&mut self, id: DeviceId) {
        self.just_watered_sensors.remove(&id);
        self.just_watered_timestamps.remove(&id);
    }

    /// `None` or a blank name removes the override.
    pub fn set_custom_name(&mut self, id: DeviceId, name: Option<String>) {
        match name.map(|n| n.trim().to_owned()) {
            Some(n) if !n.is_empty() => {
                self.custom_names.insert(id, n);
            }
            _ => {
                self.custom_names.remove(&id);
            }
        }
    }

    pub fn custom_name(&self, id: DeviceId) -> Option<&str> {
        self.custom_names.get(&id).map(String::as_str)
    }
}

// ── Store trait ─────────────────────────────────────────────────────

/// Narrow persistence interface for settings and the hub access token.
///
/// `load_settings` never fails: implementations fall back to defaults.
/// An empty token means "not configured", not an error.
pub trait SettingsStore: Send + Sync {
    fn load_settings(&self) -> Settings;

    fn save_settings(&self, settings: &Settings) -> Result<(), CoreError>;

    fn load_secret_token(&self) -> Result<SecretString, CoreError>;

    fn save_secret_token(&self, token: &SecretString) -> Result<(), CoreError>;
}

/// Process-local store, for tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
    token: Mutex<Option<SecretString>>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings, token: Option<SecretString>) -> Self {
        Self {
            settings: Mutex::new(settings),
            token: Mutex::new(token),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_settings(&self) -> Settings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), CoreError> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Ok(())
    }

    fn load_secret_token(&self) -> Result<SecretString, CoreError> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| SecretString::from(String::new())))
    }

    fn save_secret_token(&self, token: &SecretString) -> Result<(), CoreError> {
        let value = if token.expose_secret().is_empty() {
            None
        } else {
            Some(token.clone())
        };
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = value;
        Ok(())
    }
}

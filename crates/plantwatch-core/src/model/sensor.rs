// ── Moisture sensor domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::DeviceId;

/// Condition of a single sensor, or of the whole sensor set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MoistureStatus {
    Healthy,
    NeedsAttention,
    Critical,
    Unknown,
    JustWatered,
}

impl MoistureStatus {
    /// Human-readable label for menus and tables.
    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::NeedsAttention => "Needs Water",
            Self::Critical => "Critical",
            Self::Unknown => "Unknown",
            Self::JustWatered => "Just Watered",
        }
    }

    /// Sort key, most urgent first.
    pub fn severity(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::NeedsAttention => 1,
            Self::Unknown => 2,
            Self::JustWatered => 3,
            Self::Healthy => 4,
        }
    }

    /// Worst-case summary of a sensor set.
    ///
    /// Critical beats needs-attention beats unknown. A non-empty set made
    /// only of healthy and just-watered sensors is healthy; an empty set
    /// is unknown.
    pub fn overall<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut any = false;
        let mut attention = false;
        let mut unknown = false;

        for status in statuses {
            any = true;
            match status {
                Self::Critical => return Self::Critical,
                Self::NeedsAttention => attention = true,
                Self::Unknown => unknown = true,
                Self::Healthy | Self::JustWatered => {}
            }
        }

        if attention {
            Self::NeedsAttention
        } else if unknown || !any {
            Self::Unknown
        } else {
            Self::Healthy
        }
    }
}

/// One moisture sensor as classified during a single refresh pass.
///
/// Recreated wholesale on every pass; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoistureSensor {
    pub id: DeviceId,
    /// Hub display name (label, falling back to the device name).
    pub name: String,
    pub custom_name: Option<String>,
    /// Percent, absent when the reading was missing or unparseable.
    pub moisture_level: Option<f64>,
    pub battery_level: Option<i32>,
    /// When this reading was taken; absent when the per-device fetch failed.
    pub last_activity: Option<DateTime<Utc>>,
    pub status: MoistureStatus,
    /// Settings membership, independent of the 24h expiry applied to `status`.
    pub is_just_watered: bool,
}

impl MoistureSensor {
    pub fn display_name(&self) -> &str {
        match self.custom_name.as_deref() {
            Some(custom) if !custom.is_empty() => custom,
            _ => &self.name,
        }
    }

    pub fn moisture_percentage(&self) -> String {
        self.moisture_level
            .map_or_else(|| "N/A".to_owned(), |level| format!("{level:.0}%"))
    }

    pub fn battery_percentage(&self) -> String {
        self.battery_level
            .map_or_else(|| "N/A".to_owned(), |level| format!("{level}%"))
    }

    /// Abbreviated age of the last reading relative to `now`.
    pub fn last_activity_relative(&self, now: DateTime<Utc>) -> String {
        let Some(at) = self.last_activity else {
            return "Never".to_owned();
        };

        let elapsed = now.signed_duration_since(at);
        let minutes = elapsed.num_minutes();
        let hours = elapsed.num_hours();
        let days = elapsed.num_days();

        if minutes < 1 {
            "just now".to_owned()
        } else if hours < 1 {
            format!("{minutes} min ago")
        } else if days < 1 {
            format!("{hours} hr ago")
        } else if days == 1 {
            "1 day ago".to_owned()
        } else {
            format!("{days} days ago")
        }
    }

    /// Watering is only offered for sensors that are actually dry.
    pub fn can_mark_watered(&self) -> bool {
        matches!(
            self.status,
            MoistureStatus::Critical | MoistureStatus::NeedsAttention
        )
    }
}

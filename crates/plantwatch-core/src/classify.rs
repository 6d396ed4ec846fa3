// ── Sensor classification ──
//
// Pure mapping from hub devices and their attributes to `MoistureSensor`
// records, plus the batch fetch that feeds it. Per-device attribute
// failures are contained here: that sensor degrades to `Unknown` and the
// pass carries on.

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::stream::{self, StreamExt};
use plantwatch_api::HubClient;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{Device, DeviceAttribute, DeviceId, MoistureSensor, MoistureStatus};
use crate::settings::{JUST_WATERED_WINDOW_HOURS, Settings};

/// Attribute fetches in flight at once during a pass.
const ATTRIBUTE_FETCH_CONCURRENCY: usize = 4;

/// A per-device attribute fetch that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    pub device_id: DeviceId,
    pub device_name: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: CoreError,
}

fn serialize_display<S: serde::Serializer>(err: &CoreError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

/// Output of one classification pass, in device-list order.
#[derive(Debug, Clone, Default)]
pub struct SensorBatch {
    pub sensors: Vec<MoistureSensor>,
    pub failures: Vec<DeviceFailure>,
}

// ── Candidate filtering ─────────────────────────────────────────────

/// A device is a moisture sensor when its type, name, or display name
/// mentions "moisture" or "soil", ignoring case.
pub fn is_moisture_candidate(device: &Device) -> bool {
    [
        device.device_type.as_str(),
        device.name.as_str(),
        device.display_name(),
    ]
    .iter()
    .map(|field| field.to_lowercase())
    .any(|field| field.contains("moisture") || field.contains("soil"))
}

// ── Attribute extraction ────────────────────────────────────────────

/// First moisture-named attribute, else the first one named exactly
/// `humidity`. Missing, unparseable, and non-finite values yield `None`.
pub fn moisture_level(attributes: &[DeviceAttribute]) -> Option<f64> {
    let attribute = attributes
        .iter()
        .find(|a| a.name.to_lowercase().contains("moisture"))
        .or_else(|| {
            attributes
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case("humidity"))
        })?;

    attribute
        .current_value
        .as_deref()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// First attribute named exactly `battery`, as an integer percent.
pub fn battery_level(attributes: &[DeviceAttribute]) -> Option<i32> {
    attributes
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case("battery"))?
        .current_value
        .as_deref()?
        .trim()
        .parse()
        .ok()
}

// ── Status derivation ───────────────────────────────────────────────

/// `true` while a recorded watering is younger than the grace window.
///
/// Membership without a timestamp never counts as active.
pub fn is_just_watered_active(settings: &Settings, id: DeviceId, now: DateTime<Utc>) -> bool {
    if !settings.just_watered_sensors.contains(&id) {
        return false;
    }
    settings
        .just_watered_timestamps
        .get(&id)
        .is_some_and(|at| {
            now.signed_duration_since(*at) < TimeDelta::hours(JUST_WATERED_WINDOW_HOURS)
        })
}

/// Status precedence: active watering mark, missing reading, critical,
/// needs attention, healthy. Thresholds are inclusive and critical is
/// checked first even when the thresholds are inverted.
pub fn derive_status(
    moisture: Option<f64>,
    watered_active: bool,
    settings: &Settings,
) -> MoistureStatus {
    if watered_active {
        return MoistureStatus::JustWatered;
    }
    let Some(level) = moisture else {
        return MoistureStatus::Unknown;
    };
    if level <= settings.critical_threshold {
        MoistureStatus::Critical
    } else if level <= settings.healthy_threshold {
        MoistureStatus::NeedsAttention
    } else {
        MoistureStatus::Healthy
    }
}

/// Classify one device.
///
/// `attributes` is `None` when the per-device fetch failed: the sensor
/// is then `Unknown` with no reading and no activity time, whatever the
/// watering mark says.
pub fn build_sensor(
    device: &Device,
    attributes: Option<&[DeviceAttribute]>,
    settings: &Settings,
    now: DateTime<Utc>,
) -> MoistureSensor {
    let is_just_watered = settings.just_watered_sensors.contains(&device.id);
    let custom_name = settings.custom_name(device.id).map(str::to_owned);

    let (moisture, battery, last_activity, status) = match attributes {
        Some(attrs) => {
            let moisture = moisture_level(attrs);
            let watered = is_just_watered_active(settings, device.id, now);
            (
                moisture,
                battery_level(attrs),
                Some(now),
                derive_status(moisture, watered, settings),
            )
        }
        None => (None, None, None, MoistureStatus::Unknown),
    };

    MoistureSensor {
        id: device.id,
        name: device.display_name().to_owned(),
        custom_name,
        moisture_level: moisture,
        battery_level: battery,
        last_activity,
        status,
        is_just_watered,
    }
}

// ── Batch fetch ─────────────────────────────────────────────────────

/// One attribute fetch and the moment it completed.
type FetchResult = (Device, Result<Vec<DeviceAttribute>, CoreError>, DateTime<Utc>);

/// Run one classification pass against the hub.
///
/// A failed device listing aborts the pass. Attribute fetches run
/// concurrently, but the result keeps device-list order and is only
/// returned once every candidate is resolved.
pub async fn fetch_sensors(
    client: &HubClient,
    settings: &Settings,
) -> Result<SensorBatch, CoreError> {
    let devices = client.fetch_devices().await?;
    let candidates: Vec<Device> = devices.into_iter().filter(is_moisture_candidate).collect();
    debug!(candidates = candidates.len(), "classifying moisture sensors");

    let results: Vec<FetchResult> = stream::iter(candidates)
        .map(move |device| async move {
            let attrs = client
                .fetch_device_attributes(device.id)
                .await
                .map_err(CoreError::from);
            (device, attrs, Utc::now())
        })
        .buffered(ATTRIBUTE_FETCH_CONCURRENCY)
        .collect()
        .await;

    let mut batch = SensorBatch::default();
    for (device, attrs, fetched_at) in results {
        match attrs {
            Ok(attrs) => {
                batch
                    .sensors
                    .push(build_sensor(&device, Some(attrs.as_slice()), settings, fetched_at));
            }
            Err(error) => {
                warn!(
                    device_id = %device.id,
                    device = device.display_name(),
                    error = %error,
                    "attribute fetch failed"
                );
                batch.sensors.push(build_sensor(&device, None, settings, fetched_at));
                batch.failures.push(DeviceFailure {
                    device_id: device.id,
                    device_name: device.display_name().to_owned(),
                    error,
                });
            }
        }
    }

    Ok(batch)
}

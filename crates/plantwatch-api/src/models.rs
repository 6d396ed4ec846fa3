// ── Maker API wire types ──
//
// The hub is loose about JSON types: device ids arrive as strings or
// numbers, attribute values as strings, numbers, or nothing at all.
// Raw wire shapes are decoded through small untagged unions and then
// normalized into the public `Device` / `DeviceAttribute` types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── DeviceId ────────────────────────────────────────────────────────

/// Integer device identifier assigned by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl DeviceId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<i64> for DeviceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A device as reported by the hub's device listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub label: Option<String>,
    pub device_type: String,
    pub device_network_id: Option<String>,
}

impl Device {
    /// The label when the hub has one, otherwise the device name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Wire id: `"123"` or `123`.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDevice {
    id: WireId,
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "type")]
    device_type: String,
    #[serde(default)]
    device_network_id: Option<String>,
}

impl TryFrom<RawDevice> for Device {
    type Error = Error;

    fn try_from(raw: RawDevice) -> Result<Self, Self::Error> {
        let id = match raw.id {
            WireId::Number(n) => n,
            WireId::Text(s) => s
                .parse::<i64>()
                .map_err(|_| Error::InvalidDeviceId { raw: s.clone() })?,
        };
        Ok(Self {
            id: DeviceId(id),
            name: raw.name,
            label: raw.label,
            device_type: raw.device_type,
            device_network_id: raw.device_network_id,
        })
    }
}

// ── DeviceAttribute ─────────────────────────────────────────────────

/// A named current value reported by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttribute {
    pub name: String,
    /// Normalized to text whether the hub sent a string or a number.
    pub current_value: Option<String>,
    pub data_type: Option<String>,
    pub unit: Option<String>,
}

/// Loosely typed JSON value, tried in order: string, number, anything else.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LooseValue {
    Text(String),
    Number(serde_json::Number),
    Other(serde_json::Value),
}

impl LooseValue {
    /// Strings and numbers become text; everything else is absent.
    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(n) => Some(number_text(&n)),
            Self::Other(_) => None,
        }
    }

    /// Only genuine strings count.
    fn into_string(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) | Self::Other(_) => None,
        }
    }
}

/// Natural textual form of a JSON number: integers without a fraction,
/// whole floats without a trailing `.0`, other floats as-is.
fn number_text(n: &serde_json::Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                return format!("{f:.0}");
            }
        }
    }
    n.to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttribute {
    #[serde(default)]
    name: Option<LooseValue>,
    #[serde(default)]
    current_value: Option<LooseValue>,
    #[serde(default)]
    data_type: Option<LooseValue>,
    #[serde(default)]
    unit: Option<LooseValue>,
}

impl RawAttribute {
    /// Entries without a string `name` are dropped.
    fn into_attribute(self) -> Option<DeviceAttribute> {
        let name = self.name.and_then(LooseValue::into_string)?;
        Some(DeviceAttribute {
            name,
            current_value: self.current_value.and_then(LooseValue::into_text),
            data_type: self.data_type.and_then(LooseValue::into_string),
            unit: self.unit.and_then(LooseValue::into_string),
        })
    }
}

/// Extract the `attributes` array from a device detail body.
///
/// A missing or non-array `attributes` field yields no attributes; entries
/// that are not objects or carry no name are skipped.
pub(crate) fn attributes_from_detail(detail: &serde_json::Value) -> Vec<DeviceAttribute> {
    detail
        .get("attributes")
        .and_then(serde_json::Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| RawAttribute::deserialize(entry).ok())
                .filter_map(RawAttribute::into_attribute)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn decode_device(value: serde_json::Value) -> Result<Device, Error> {
        let raw: RawDevice = serde_json::from_value(value).unwrap();
        Device::try_from(raw)
    }

    #[test]
    fn string_id_normalizes_to_integer() {
        let device = decode_device(json!({"id": "123", "name": "Pot", "type": "Generic"})).unwrap();
        assert_eq!(device.id, DeviceId(123));
    }

    #[test]
    fn numeric_id_is_kept() {
        let device = decode_device(json!({"id": 7, "name": "Pot", "type": "Generic"})).unwrap();
        assert_eq!(device.id, DeviceId(7));
    }

    #[test]
    fn non_numeric_string_id_is_rejected() {
        let err = decode_device(json!({"id": "abc", "name": "Pot", "type": "Generic"})).unwrap_err();
        assert!(matches!(err, Error::InvalidDeviceId { ref raw } if raw == "abc"));
    }

    #[test]
    fn display_name_prefers_label() {
        let labeled = decode_device(
            json!({"id": 1, "name": "Zigbee Sensor", "label": "Fern", "type": "x"}),
        )
        .unwrap();
        assert_eq!(labeled.display_name(), "Fern");

        let unlabeled =
            decode_device(json!({"id": 1, "name": "Zigbee Sensor", "label": null, "type": "x"}))
                .unwrap();
        assert_eq!(unlabeled.display_name(), "Zigbee Sensor");
    }

    #[test]
    fn attribute_values_normalize_to_text() {
        let detail = json!({
            "attributes": [
                {"name": "moisture", "currentValue": "15", "dataType": "NUMBER", "unit": "%"},
                {"name": "battery", "currentValue": 80},
                {"name": "temperature", "currentValue": 21.5},
                {"name": "humidity", "currentValue": 55.0},
                {"name": "switch", "currentValue": null},
                {"name": "contact", "currentValue": true}
            ]
        });

        let attrs = attributes_from_detail(&detail);
        let values: Vec<(&str, Option<&str>)> = attrs
            .iter()
            .map(|a| (a.name.as_str(), a.current_value.as_deref()))
            .collect();

        assert_eq!(
            values,
            vec![
                ("moisture", Some("15")),
                ("battery", Some("80")),
                ("temperature", Some("21.5")),
                ("humidity", Some("55")),
                ("switch", None),
                ("contact", None),
            ]
        );
        assert_eq!(attrs[0].data_type.as_deref(), Some("NUMBER"));
        assert_eq!(attrs[0].unit.as_deref(), Some("%"));
    }

    #[test]
    fn nameless_attributes_are_dropped() {
        let detail = json!({
            "attributes": [
                {"currentValue": "10"},
                {"name": 42, "currentValue": "11"},
                "not-an-object",
                {"name": "battery", "currentValue": "90"}
            ]
        });

        let attrs = attributes_from_detail(&detail);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, "battery");
    }

    #[test]
    fn missing_attributes_field_yields_empty() {
        assert!(attributes_from_detail(&json!({"id": "5"})).is_empty());
        assert!(attributes_from_detail(&json!({"attributes": "nope"})).is_empty());
    }
}

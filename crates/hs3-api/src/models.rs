// JSON API response types
//
// Records returned by the HS3 `/JSON` endpoint. Payloads arrive under a
// top-level `Devices` or `Events` key. Fields use `#[serde(default)]`
// liberally because HS3 omits empty strings on some firmware builds.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Stable integer reference identifying a device on every API surface.
pub type DeviceRef = u32;

// ── DeviceValue ──────────────────────────────────────────────────────

/// A device's numeric value as reported by the controller.
///
/// HS3 reports whole numbers for most devices and fractional values for
/// sensors. The variant is chosen from the textual form: anything
/// containing a `.` is fractional.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum DeviceValue {
    Integer(i64),
    Fractional(f64),
}

impl DeviceValue {
    /// Numeric value widened to `f64`.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(v) => v as f64,
            Self::Fractional(v) => v,
        }
    }

    pub fn is_fractional(self) -> bool {
        matches!(self, Self::Fractional(_))
    }
}

impl PartialEq for DeviceValue {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialOrd for DeviceValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl From<i64> for DeviceValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for DeviceValue {
    fn from(v: f64) -> Self {
        Self::Fractional(v)
    }
}

impl fmt::Display for DeviceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Fractional(v) => write!(f, "{v}"),
        }
    }
}

/// A value field that was neither an integer nor a decimal number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid device value: {0:?}")]
pub struct InvalidValue(pub String);

impl FromStr for DeviceValue {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('.') {
            s.parse::<f64>()
                .map(Self::Fractional)
                .map_err(|_| InvalidValue(s.to_owned()))
        } else {
            s.parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| InvalidValue(s.to_owned()))
        }
    }
}

/// Raw shape of a value field: HS3 sends numbers, older builds strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(serde_json::Number),
    Text(String),
}

impl<'de> Deserialize<'de> for DeviceValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = match RawValue::deserialize(deserializer)? {
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ── Device status ────────────────────────────────────────────────────

/// One device from `request=getstatus`.
///
/// Only the fields the client models are named; everything else the
/// controller sends lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "ref")]
    pub reference: DeviceRef,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub location2: String,
    #[serde(default)]
    pub device_type_string: String,
    pub value: DeviceValue,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Control pairs ────────────────────────────────────────────────────

/// One device's control metadata from `request=getcontrol`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRecord {
    #[serde(rename = "ref")]
    pub reference: DeviceRef,
    #[serde(rename = "ControlPairs", default)]
    pub control_pairs: Vec<ControlPair>,
}

/// A `(ControlUse, ControlValue)` association.
///
/// `control_use` is the controller's numeric code for the semantic action
/// (1 = on, 2 = off, 18 = lock, 19 = unlock, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPair {
    #[serde(rename = "ControlUse")]
    pub control_use: i32,
    #[serde(rename = "ControlValue")]
    pub control_value: DeviceValue,
    #[serde(rename = "Label", default)]
    pub label: Option<String>,
}

// ── Events ───────────────────────────────────────────────────────────

/// One event definition from `request=getevents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "Group")]
    pub group: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

//! Telemetry data model
//!
//! Two shapes matter here: [`RawRecord`] is what the backend actually sends,
//! with every field optional and loosely typed, and [`Reading`] is the
//! canonical record the rest of the system consumes. Conversion happens once
//! at the ingestion boundary; after that a `Reading` is immutable.

use serde::{Deserialize, Serialize};

use crate::time::{RawTimestamp, TimeSource, Timestamp};

/// Accelerometer axis.
///
/// Using an enum instead of a string means an invalid axis is a compile
/// error, not a runtime one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Lateral axis.
    X,
    /// Longitudinal axis.
    Y,
    /// Vertical axis.
    Z,
}

impl Axis {
    /// All axes in canonical order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Uppercase label used in reports and alarm ids.
    pub fn label(&self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

impl core::fmt::Display for Axis {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// A record as it arrives from the backend, before normalization.
///
/// Every field is optional: real stores accumulate records written by
/// different firmware revisions, and ingestion must accept all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Backend-assigned key, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// X axis acceleration, if present.
    #[serde(default)]
    pub x: Option<f64>,
    /// Y axis acceleration, if present.
    #[serde(default)]
    pub y: Option<f64>,
    /// Z axis acceleration, if present.
    #[serde(default)]
    pub z: Option<f64>,
    /// Wire timestamp in epoch seconds or text form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<RawTimestamp>,
}

impl RawRecord {
    /// Convenience constructor for tests and simulators.
    pub fn new(x: f64, y: f64, z: f64, epoch_secs: f64) -> Self {
        Self {
            id: None,
            x: Some(x),
            y: Some(y),
            z: Some(z),
            timestamp: Some(RawTimestamp::Seconds(epoch_secs)),
        }
    }

    /// Normalize into a canonical [`Reading`].
    ///
    /// Missing or non-finite axis values become 0.0, missing timestamps
    /// become "now", and a missing id is synthesized from the timestamp and
    /// a caller-supplied sequence number so it stays unique within a batch.
    pub fn normalize(&self, clock: &dyn TimeSource, seq: usize) -> Reading {
        let timestamp = RawTimestamp::normalize(self.timestamp.as_ref(), clock);
        let id = match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("reading-{}-{}", timestamp, seq),
        };
        Reading {
            id,
            x: sanitize(self.x),
            y: sanitize(self.y),
            z: sanitize(self.z),
            timestamp,
            is_prediction: false,
        }
    }
}

fn sanitize(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// A normalized accelerometer reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Unique id, either backend-assigned or synthesized at ingestion.
    pub id: String,
    /// X axis acceleration.
    pub x: f64,
    /// Y axis acceleration.
    pub y: f64,
    /// Z axis acceleration.
    pub z: f64,
    /// Canonical epoch milliseconds.
    pub timestamp: Timestamp,
    /// True for values produced by the prediction engine, never for
    /// ingested telemetry.
    #[serde(default)]
    pub is_prediction: bool,
}

impl Reading {
    /// Value for one axis.
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

//! Monitor configuration
//!
//! The externally persisted settings blob: poll cadence, chart range,
//! alarm thresholds, and the prediction knobs. Serde-backed so the host
//! application can round-trip it through whatever storage it uses. Loading
//! is lenient; unknown fields are ignored and out-of-range values are
//! clamped rather than rejected, since a corrupt settings blob must not
//! prevent the monitor from starting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alarm::ThresholdSet;

/// Chart display range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    /// Last five minutes.
    #[serde(rename = "5m")]
    FiveMinutes,
    /// Last fifteen minutes.
    #[serde(rename = "15m")]
    #[default]
    FifteenMinutes,
    /// Last hour.
    #[serde(rename = "1h")]
    OneHour,
    /// Last day.
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl TimeRange {
    /// Range length in milliseconds.
    pub fn as_millis(&self) -> i64 {
        match self {
            TimeRange::FiveMinutes => 5 * 60_000,
            TimeRange::FifteenMinutes => 15 * 60_000,
            TimeRange::OneHour => 60 * 60_000,
            TimeRange::TwentyFourHours => 24 * 60 * 60_000,
        }
    }
}

/// Forecast strategy selector, mirrored by the forecast crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMethod {
    /// Least-squares linear trend extrapolation.
    #[default]
    Linear,
    /// Exponential smoothing (flat forecast at the smoothed level).
    Exponential,
}

/// Prediction knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Whether forecasts are computed at all.
    pub enabled: bool,
    /// Strategy used when enabled.
    pub method: PredictionMethod,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: PredictionMethod::Linear,
        }
    }
}

/// Full monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Poll cadence in seconds; fractional values allowed down to 0.1.
    pub refresh_interval_secs: f64,
    /// Chart display range.
    pub time_range: TimeRange,
    /// Alarm bounds per axis.
    pub thresholds: ThresholdSet,
    /// Forecast knobs.
    pub prediction: PredictionConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 1.0,
            time_range: TimeRange::default(),
            thresholds: ThresholdSet::default(),
            prediction: PredictionConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Poll interval as a duration, clamped to the 100 ms floor.
    ///
    /// Non-finite or non-positive values fall back to the default cadence.
    pub fn poll_interval(&self) -> Duration {
        if !self.refresh_interval_secs.is_finite() || self.refresh_interval_secs <= 0.0 {
            return Duration::from_secs(1);
        }
        let interval = Duration::from_secs_f64(self.refresh_interval_secs);
        interval.max(Duration::from_millis(100))
    }

    /// Parse from a JSON settings blob, falling back to defaults on error.
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("invalid settings blob ({e}); using defaults");
                Self::default()
            }
        }
    }

    /// Serialize for persistence.
    pub fn to_json(&self) -> String {
        // Serialization of a plain struct with no maps cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Axis;

    #[test]
    fn defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.time_range, TimeRange::FifteenMinutes);
        assert_eq!(config.thresholds.axis(Axis::X).max, 10.0);
        assert!(config.prediction.enabled);
        assert_eq!(config.prediction.method, PredictionMethod::Linear);
    }

    #[test]
    fn fractional_interval_is_supported() {
        let config = MonitorConfig {
            refresh_interval_secs: 0.5,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn tiny_interval_is_floored() {
        let config = MonitorConfig {
            refresh_interval_secs: 0.01,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn bogus_interval_falls_back() {
        for secs in [0.0, -1.0, f64::NAN] {
            let config = MonitorConfig {
                refresh_interval_secs: secs,
                ..Default::default()
            };
            assert_eq!(config.poll_interval(), Duration::from_secs(1), "secs {secs}");
        }
    }

    #[test]
    fn json_round_trip() {
        let mut config = MonitorConfig::default();
        config.refresh_interval_secs = 2.5;
        config.time_range = TimeRange::OneHour;
        config.thresholds.set(Axis::Y, -3.0, 3.0);
        config.prediction.method = PredictionMethod::Exponential;

        let parsed = MonitorConfig::from_json(&config.to_json());
        assert_eq!(parsed, config);
    }

    #[test]
    fn time_range_tokens() {
        let config = MonitorConfig::from_json(r#"{"time_range": "24h"}"#);
        assert_eq!(config.time_range, TimeRange::TwentyFourHours);
        assert_eq!(config.time_range.as_millis(), 86_400_000);
    }

    #[test]
    fn corrupt_blob_yields_defaults() {
        let config = MonitorConfig::from_json("{not json");
        assert_eq!(config, MonitorConfig::default());
    }
}

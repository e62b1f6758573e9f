//! Short-Horizon Forecasting for AccelMon Telemetry
//!
//! ## Overview
//!
//! Produces a handful of synthetic future readings from the newest window of
//! the telemetry buffer so the host application can draw a forecast ahead of
//! the live trace. Two interchangeable strategies, both cheap enough to
//! recompute wholesale on every ingestion cycle:
//!
//! - **Linear**: ordinary least-squares fit over the newest 30 samples,
//!   continued forward. Tracks trends; overshoots on reversals.
//! - **Exponential smoothing**: smoothed level over the newest 10 samples,
//!   repeated flat. Tracks levels; ignores trends by construction.
//!
//! Each axis is forecast independently. Predicted readings carry
//! `is_prediction = true` and synthetic ids, so downstream consumers can
//! split them from observed telemetry with a single filter.
//!
//! ## Why not something heavier?
//!
//! Forecasts here are a display aid recomputed around once per second, not
//! an input to control decisions. A fitted line and a smoothed level cover
//! the two signal regimes that matter (trending, hovering) at a fraction of
//! the cost and complexity of an ARIMA-class model.
//!
//! ```rust
//! use accelmon_forecast::PredictionEngine;
//! use accelmon_core::PredictionMethod;
//!
//! let engine = PredictionEngine::new(PredictionMethod::Linear);
//! let predicted = engine.predict(&[]); // too little data: empty forecast
//! assert!(predicted.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod linear;
pub mod scoring;
pub mod smoothing;

pub use scoring::{mae, rmse, ScoreError};

use accelmon_core::reading::Reading;
use accelmon_core::PredictionMethod;

/// Points produced per call by the linear strategy.
pub const DEFAULT_LINEAR_POINTS: usize = 10;

/// Points produced per call by the smoothing strategy. Fewer than linear:
/// a flat forecast carries no information past the first point anyway.
pub const DEFAULT_SMOOTHING_POINTS: usize = 5;

/// Fallback inter-sample interval when the buffer can't supply one.
pub const DEFAULT_INTERVAL_MS: i64 = 1_000;

/// At least this many readings are needed before any strategy runs.
pub const MIN_READINGS: usize = 2;

/// Forecast engine over a newest-first reading window.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    method: PredictionMethod,
    points_ahead: usize,
}

impl PredictionEngine {
    /// Engine with the default horizon for the chosen method.
    pub fn new(method: PredictionMethod) -> Self {
        let points_ahead = match method {
            PredictionMethod::Linear => DEFAULT_LINEAR_POINTS,
            PredictionMethod::Exponential => DEFAULT_SMOOTHING_POINTS,
        };
        Self {
            method,
            points_ahead,
        }
    }

    /// Override the forecast horizon.
    pub fn with_points_ahead(mut self, points_ahead: usize) -> Self {
        self.points_ahead = points_ahead;
        self
    }

    /// Active strategy.
    pub fn method(&self) -> PredictionMethod {
        self.method
    }

    /// Forecast horizon in points.
    pub fn points_ahead(&self) -> usize {
        self.points_ahead
    }

    /// Produce future readings from a newest-first window.
    ///
    /// Fewer than [`MIN_READINGS`] inputs yields an empty forecast; there is
    /// no interval to extrapolate timestamps from. Timestamps continue at
    /// the observed inter-sample interval of the two newest readings,
    /// falling back to one second when that interval is zero.
    pub fn predict(&self, readings: &[Reading]) -> Vec<Reading> {
        if readings.len() < MIN_READINGS {
            log::debug!(
                "forecast skipped: {} readings, need {}",
                readings.len(),
                MIN_READINGS
            );
            return Vec::new();
        }

        let interval = match (readings[0].timestamp - readings[1].timestamp).abs() {
            0 => DEFAULT_INTERVAL_MS,
            delta => delta,
        };
        let last_ts = readings[0].timestamp;

        let forecast_axis = |extract: fn(&Reading) -> f64| -> Vec<f64> {
            let values: Vec<f64> = readings.iter().map(extract).collect();
            match self.method {
                PredictionMethod::Linear => linear::forecast(&values, self.points_ahead),
                PredictionMethod::Exponential => smoothing::forecast(&values, self.points_ahead),
            }
        };

        let xs = forecast_axis(|r| r.x);
        let ys = forecast_axis(|r| r.y);
        let zs = forecast_axis(|r| r.z);

        (0..self.points_ahead)
            .map(|i| Reading {
                id: format!("prediction-{i}"),
                x: xs[i],
                y: ys[i],
                z: zs[i],
                timestamp: last_ts + (i as i64 + 1) * interval,
                is_prediction: true,
            })
            .collect()
    }
}

//! Per-axis summary statistics
//!
//! Pure functions over reading slices. Population standard deviation
//! (divide by N) because the buffer is the whole window of interest, not a
//! sample drawn from it.

use serde::Serialize;

use crate::reading::{Axis, Reading};

/// Summary for a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisStats {
    /// Smallest observed value.
    pub min: f64,
    /// Largest observed value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

/// Summary statistics over a window of readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    /// X axis summary.
    pub x: AxisStats,
    /// Y axis summary.
    pub y: AxisStats,
    /// Z axis summary.
    pub z: AxisStats,
    /// Number of readings summarized.
    pub sample_count: usize,
}

impl Statistics {
    /// Stats for one axis by enum, for callers iterating [`Axis::ALL`].
    pub fn axis(&self, axis: Axis) -> &AxisStats {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

/// Compute per-axis statistics, or `None` for an empty window.
///
/// `None` is the sentinel consumers branch on; it is not an error.
pub fn compute_statistics(readings: &[Reading]) -> Option<Statistics> {
    if readings.is_empty() {
        return None;
    }

    Some(Statistics {
        x: axis_stats(readings, Axis::X),
        y: axis_stats(readings, Axis::Y),
        z: axis_stats(readings, Axis::Z),
        sample_count: readings.len(),
    })
}

fn axis_stats(readings: &[Reading], axis: Axis) -> AxisStats {
    let n = readings.len() as f64;

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for r in readings {
        let v = r.axis(axis);
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    let mean = sum / n;

    let variance = readings
        .iter()
        .map(|r| {
            let d = r.axis(axis) - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    AxisStats {
        min,
        max,
        mean,
        std_dev: variance.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(x: f64, y: f64, z: f64) -> Reading {
        Reading {
            id: "t".into(),
            x,
            y,
            z,
            timestamp: 0,
            is_prediction: false,
        }
    }

    #[test]
    fn empty_window_is_none() {
        assert!(compute_statistics(&[]).is_none());
    }

    #[test]
    fn single_reading_has_zero_spread() {
        let stats = compute_statistics(&[reading(2.5, -1.0, 9.8)]).unwrap();
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.x.min, 2.5);
        assert_eq!(stats.x.max, 2.5);
        assert_eq!(stats.x.mean, 2.5);
        assert_eq!(stats.x.std_dev, 0.0);
        assert_eq!(stats.y.mean, -1.0);
        assert_eq!(stats.z.mean, 9.8);
    }

    #[test]
    fn population_std_dev_for_one_two_three() {
        let readings = [reading(1.0, 0.0, 0.0), reading(2.0, 0.0, 0.0), reading(3.0, 0.0, 0.0)];
        let stats = compute_statistics(&readings).unwrap();

        assert_eq!(stats.x.min, 1.0);
        assert_eq!(stats.x.max, 3.0);
        assert_eq!(stats.x.mean, 2.0);
        // sqrt(2/3), population convention
        assert!((stats.x.std_dev - 0.816_496_580_927_726).abs() < 1e-12);
    }

    #[test]
    fn axes_are_independent() {
        let readings = [reading(1.0, 10.0, -5.0), reading(3.0, 20.0, -7.0)];
        let stats = compute_statistics(&readings).unwrap();

        assert_eq!(stats.x.mean, 2.0);
        assert_eq!(stats.y.mean, 15.0);
        assert_eq!(stats.z.mean, -6.0);
        assert_eq!(stats.axis(Axis::Y).max, 20.0);
    }

    #[test]
    fn negative_values_are_handled() {
        let readings = [reading(-3.0, 0.0, 0.0), reading(-1.0, 0.0, 0.0)];
        let stats = compute_statistics(&readings).unwrap();
        assert_eq!(stats.x.min, -3.0);
        assert_eq!(stats.x.max, -1.0);
        assert_eq!(stats.x.mean, -2.0);
    }
}

//! Ordinary least-squares trend forecasting
//!
//! Fits value against chronological sample index over a recency-biased
//! window and extends the fitted line forward. The window is deliberately
//! short; accelerometer telemetry is only locally linear, and an old trend
//! is worse than no trend.

use heapless::Vec as HVec;

/// Samples considered for the fit, newest-first input prefix.
pub const WINDOW: usize = 30;

/// Below this many samples the system is ill-conditioned and the forecast
/// degenerates to the last observed value.
pub const MIN_SAMPLES: usize = 5;

/// Forecast `points` future values from a newest-first value series.
///
/// Input shorter than [`MIN_SAMPLES`] yields a constant forecast of the
/// newest value. Empty input yields an empty forecast; callers gate on
/// window size before getting here.
pub fn forecast(values_newest_first: &[f64], points: usize) -> Vec<f64> {
    let Some(&newest) = values_newest_first.first() else {
        return Vec::new();
    };

    if values_newest_first.len() < MIN_SAMPLES {
        return vec![newest; points];
    }

    // Window capacity bounds the fit cost no matter how large the buffer is.
    let mut window: HVec<f64, WINDOW> = values_newest_first
        .iter()
        .copied()
        .take(WINDOW)
        .collect();
    // Fit in chronological order so the slope points forward in time.
    window.reverse();

    let n = window.len();
    let n_f = n as f64;

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, &y) in window.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n_f * sum_xx - sum_x * sum_x;
    // Zero variance cannot happen for n >= 2 distinct indices, but guard
    // rather than divide.
    let slope = if denominator == 0.0 {
        0.0
    } else {
        (n_f * sum_xy - sum_x * sum_y) / denominator
    };
    let intercept = (sum_y - slope * sum_x) / n_f;

    (1..=points)
        .map(|k| {
            let x = (n - 1 + k) as f64;
            intercept + slope * x
        })
        .collect()
}

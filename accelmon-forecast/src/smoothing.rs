//! Simple exponential smoothing
//!
//! Single-parameter smoothing over a short recency-biased window. Simple
//! exponential smoothing has a flat forecast: every predicted point is the
//! final smoothed level. That makes it the conservative counterpart to the
//! linear strategy, useful when the signal hovers around a level instead of
//! trending.

use heapless::Vec as HVec;

/// Smoothing factor. 0.3 weights the recent level heavily enough to track
/// drift without chasing every sample.
pub const ALPHA: f64 = 0.3;

/// Samples folded into the level, newest-first input prefix.
pub const WINDOW: usize = 10;

/// Forecast `points` future values from a newest-first value series.
///
/// The level is seeded with the newest value and folded across the rest of
/// the window; all output points equal the final level.
pub fn forecast(values_newest_first: &[f64], points: usize) -> Vec<f64> {
    let Some(&newest) = values_newest_first.first() else {
        return Vec::new();
    };

    let window: HVec<f64, WINDOW> = values_newest_first
        .iter()
        .copied()
        .take(WINDOW)
        .collect();

    let mut level = newest;
    for &value in window.iter().skip(1) {
        level = ALPHA * value + (1.0 - ALPHA) * level;
    }

    vec![level; points]
}

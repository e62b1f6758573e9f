//! Forecast accuracy metrics
//!
//! Diagnostics for comparing a forecast against the values that actually
//! arrived. Length mismatches are reported as errors rather than silently
//! truncated; a misaligned comparison is a caller bug worth surfacing.

use thiserror::Error;

/// Errors from accuracy calculations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreError {
    /// The two series must pair up one-to-one.
    #[error("series length mismatch: {actual} actual vs {predicted} predicted")]
    LengthMismatch {
        actual: usize,
        predicted: usize,
    },

    /// No pairs to score.
    #[error("cannot score empty series")]
    Empty,
}

fn check(actual: &[f64], predicted: &[f64]) -> Result<(), ScoreError> {
    if actual.len() != predicted.len() {
        return Err(ScoreError::LengthMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(ScoreError::Empty);
    }
    Ok(())
}

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64, ScoreError> {
    check(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root mean square error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64, ScoreError> {
    check(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| {
            let d = a - p;
            d * d
        })
        .sum();
    Ok(libm::sqrt(sum / actual.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_forecast_scores_zero() {
        let series = [1.0, 2.0, 3.0];
        assert_eq!(mae(&series, &series).unwrap(), 0.0);
        assert_eq!(rmse(&series, &series).unwrap(), 0.0);
    }

    #[test]
    fn known_errors() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 1.0];

        assert!((mae(&actual, &predicted).unwrap() - 1.0).abs() < 1e-12);
        // sqrt((1 + 0 + 4) / 3)
        assert!((rmse(&actual, &predicted).unwrap() - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn rmse_dominates_mae_on_outliers() {
        let actual = [0.0, 0.0, 0.0, 0.0];
        let predicted = [0.0, 0.0, 0.0, 4.0];
        assert!(rmse(&actual, &predicted).unwrap() > mae(&actual, &predicted).unwrap());
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let result = mae(&[1.0, 2.0], &[1.0]);
        assert_eq!(
            result,
            Err(ScoreError::LengthMismatch {
                actual: 2,
                predicted: 1
            })
        );
    }

    #[test]
    fn empty_series_is_an_error() {
        assert_eq!(rmse(&[], &[]), Err(ScoreError::Empty));
    }
}

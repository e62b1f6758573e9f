//! Report generation
//!
//! Selects a relative time window from the buffer, summarizes it through the
//! statistics engine, and renders a fixed CSV layout for export. The layout
//! is part of the external contract; downstream spreadsheets parse it by
//! section header.

use serde::{Deserialize, Serialize};

use crate::reading::{Axis, Reading};
use crate::stats::{compute_statistics, Statistics};
use crate::time::{format_iso8601, TimeSource, Timestamp};

/// Relative time window for report selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    minutes: u64,
}

impl TimeWindow {
    /// Fallback when a token is unrecognized.
    pub const DEFAULT_MINUTES: u64 = 30;

    /// Window of `minutes` minutes.
    pub const fn minutes(minutes: u64) -> Self {
        Self { minutes }
    }

    /// Window of `hours` hours, saturating on overflow.
    pub const fn hours(hours: u64) -> Self {
        Self {
            minutes: hours.saturating_mul(60),
        }
    }

    /// Parse a window token: `<N>m` for minutes or `<N>h` for hours.
    ///
    /// Anything else, including empty strings and out-of-range digits,
    /// falls back to 30 minutes. Total by design so a corrupt settings blob
    /// cannot break report generation.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        let Some(unit) = token.chars().last() else {
            return Self::minutes(Self::DEFAULT_MINUTES);
        };
        let digits = &token[..token.len() - unit.len_utf8()];
        let Ok(n) = digits.parse::<u64>() else {
            return Self::minutes(Self::DEFAULT_MINUTES);
        };
        match unit {
            'm' => Self::minutes(n),
            'h' => Self::hours(n),
            _ => Self::minutes(Self::DEFAULT_MINUTES),
        }
    }

    /// Window length in milliseconds, saturating at `i64::MAX` so absurd
    /// but grammar-valid tokens stay total.
    pub fn as_millis(&self) -> i64 {
        let ms = self.minutes.saturating_mul(60_000);
        if ms > i64::MAX as u64 {
            i64::MAX
        } else {
            ms as i64
        }
    }

    /// Human-readable label used in the report header.
    pub fn label(&self) -> String {
        if self.minutes % 60 == 0 && self.minutes > 0 {
            format!("{}h", self.minutes / 60)
        } else {
            format!("{}m", self.minutes)
        }
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::minutes(Self::DEFAULT_MINUTES)
    }
}

/// Everything needed to render a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    /// Window label, e.g. `30m`.
    pub time_interval: String,
    /// Generation time.
    pub timestamp: Timestamp,
    /// Per-axis summary, `None` for an empty window.
    pub stats: Option<Statistics>,
    /// Number of readings in the window.
    pub sample_count: usize,
    /// Window contents, newest first, possibly empty.
    pub raw_data: Vec<Reading>,
}

/// Filter the buffer by window and compute the report payload.
///
/// Predicted readings are excluded; reports cover observed telemetry only.
pub fn generate_report_data(
    window: TimeWindow,
    readings: &[Reading],
    clock: &dyn TimeSource,
) -> ReportData {
    let now = clock.now();
    let cutoff = now.saturating_sub(window.as_millis());

    let raw_data: Vec<Reading> = readings
        .iter()
        .filter(|r| !r.is_prediction && r.timestamp >= cutoff)
        .cloned()
        .collect();

    let stats = compute_statistics(&raw_data);

    ReportData {
        time_interval: window.label(),
        timestamp: now,
        stats,
        sample_count: raw_data.len(),
        raw_data,
    }
}

/// Render the fixed CSV layout.
///
/// Header block, a STATISTICS section with one row per axis to four
/// decimals, and a RAW DATA section with ISO-8601 timestamps. An empty
/// window renders a placeholder line instead of the sections.
pub fn generate_csv_report(report: &ReportData) -> String {
    let mut out = String::new();

    out.push_str("AccelMon Report\n");
    out.push_str(&format!("Generated: {}\n", format_iso8601(report.timestamp)));
    out.push_str(&format!("Time Interval: {}\n", report.time_interval));
    out.push_str(&format!("Sample Count: {}\n", report.sample_count));
    out.push('\n');

    let Some(stats) = &report.stats else {
        out.push_str("No data available for report\n");
        return out;
    };

    out.push_str("STATISTICS\n");
    out.push_str("Axis,Min,Max,Average,StdDev\n");
    for axis in Axis::ALL {
        let s = stats.axis(axis);
        out.push_str(&format!(
            "{},{:.4},{:.4},{:.4},{:.4}\n",
            axis.label(),
            s.min,
            s.max,
            s.mean,
            s.std_dev
        ));
    }

    if !report.raw_data.is_empty() {
        out.push('\n');
        out.push_str("RAW DATA\n");
        out.push_str("Timestamp,X,Y,Z\n");
        for r in &report.raw_data {
            out.push_str(&format!(
                "{},{:.4},{:.4},{:.4}\n",
                format_iso8601(r.timestamp),
                r.x,
                r.y,
                r.z
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;

    fn reading(ts: Timestamp, x: f64) -> Reading {
        Reading {
            id: format!("r{ts}"),
            x,
            y: x * 2.0,
            z: x * 3.0,
            timestamp: ts,
            is_prediction: false,
        }
    }

    #[test]
    fn window_token_parsing() {
        assert_eq!(TimeWindow::parse("5m"), TimeWindow::minutes(5));
        assert_eq!(TimeWindow::parse("2h"), TimeWindow::hours(2));
        assert_eq!(TimeWindow::parse("15m").as_millis(), 900_000);
    }

    #[test]
    fn bad_tokens_default_to_thirty_minutes() {
        for token in ["", "abc", "5x", "m", "-3m", "1.5h"] {
            assert_eq!(TimeWindow::parse(token), TimeWindow::minutes(30), "token {token:?}");
        }
    }

    #[test]
    fn huge_window_tokens_saturate_instead_of_overflowing() {
        // Grammar-valid but absurd durations must stay total.
        let window = TimeWindow::parse("400000000000000000h");
        assert_eq!(window.as_millis(), i64::MAX);

        let window = TimeWindow::parse("18446744073709551615m");
        assert_eq!(window.as_millis(), i64::MAX);

        // A saturated window selects everything.
        let clock = FixedClock::new(0);
        let report = generate_report_data(window, &[reading(-5_000, 1.0)], &clock);
        assert_eq!(report.sample_count, 1);
    }

    #[test]
    fn window_filters_old_readings() {
        let clock = FixedClock::new(10 * 60_000);
        let readings = vec![
            reading(9 * 60_000, 1.0),  // 1 minute old, kept
            reading(2 * 60_000, 2.0),  // 8 minutes old, dropped
        ];

        let report = generate_report_data(TimeWindow::minutes(5), &readings, &clock);
        assert_eq!(report.sample_count, 1);
        assert_eq!(report.raw_data[0].x, 1.0);
    }

    #[test]
    fn predictions_are_excluded() {
        let clock = FixedClock::new(60_000);
        let mut predicted = reading(59_000, 5.0);
        predicted.is_prediction = true;
        let readings = vec![reading(58_000, 1.0), predicted];

        let report = generate_report_data(TimeWindow::minutes(5), &readings, &clock);
        assert_eq!(report.sample_count, 1);
    }

    #[test]
    fn empty_report_has_placeholder() {
        let clock = FixedClock::new(0);
        let report = generate_report_data(TimeWindow::default(), &[], &clock);
        let csv = generate_csv_report(&report);

        assert!(csv.contains("Sample Count: 0"));
        assert!(csv.contains("No data available for report"));
        assert!(!csv.contains("STATISTICS"));
    }

    #[test]
    fn csv_round_trip_recovers_statistics() {
        let clock = FixedClock::new(60_000);
        let readings = vec![reading(59_000, 1.0), reading(58_000, 2.0), reading(57_000, 3.0)];
        let report = generate_report_data(TimeWindow::minutes(5), &readings, &clock);
        let csv = generate_csv_report(&report);

        // Recover the sample count from the header.
        let count_line = csv
            .lines()
            .find(|l| l.starts_with("Sample Count:"))
            .unwrap();
        let parsed_count: usize = count_line["Sample Count:".len()..].trim().parse().unwrap();
        assert_eq!(parsed_count, report.sample_count);

        // Recover the X statistics row and compare at the rendered precision.
        let x_row = csv.lines().find(|l| l.starts_with("X,")).unwrap();
        let fields: Vec<f64> = x_row[2..].split(',').map(|f| f.parse().unwrap()).collect();
        let stats = report.stats.unwrap();
        assert_eq!(fields[0], stats.x.min);
        assert_eq!(fields[1], stats.x.max);
        assert_eq!(fields[2], stats.x.mean);
        assert!((fields[3] - stats.x.std_dev).abs() < 5e-5);
    }

    #[test]
    fn raw_data_section_uses_iso_timestamps() {
        let clock = FixedClock::new(60_000);
        let readings = vec![reading(59_000, 1.0)];
        let report = generate_report_data(TimeWindow::minutes(5), &readings, &clock);
        let csv = generate_csv_report(&report);

        assert!(csv.contains("RAW DATA"));
        assert!(csv.contains("Timestamp,X,Y,Z"));
        assert!(csv.contains("1970-01-01T00:00:59+00:00"));
    }
}

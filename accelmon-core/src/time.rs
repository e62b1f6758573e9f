//! Time handling and timestamp normalization
//!
//! The backend stores timestamps in several historical shapes: epoch seconds
//! as a number, ISO-8601 strings, or nothing at all. Everything downstream
//! works in a single canonical unit, milliseconds since the Unix epoch, and
//! this module is the only place the conversion happens.
//!
//! Clocks are injected through the [`TimeSource`] trait so the pipeline,
//! alarm engine, and report builder can be driven by a fixed clock in tests.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
///
/// Signed so arithmetic on deltas and window cutoffs never underflows.
pub type Timestamp = i64;

/// Source of wall-clock time for the system.
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in milliseconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}

/// System clock backed by `std::time::SystemTime`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp_millis()
    }
}

/// Fixed clock for tests.
///
/// Interior mutability so a test can advance time while the pipeline holds
/// a shared reference to the clock.
#[derive(Debug, Default)]
pub struct FixedClock {
    now_ms: std::sync::atomic::AtomicI64,
}

impl FixedClock {
    /// Clock frozen at `now_ms`.
    pub fn new(now_ms: Timestamp) -> Self {
        Self {
            now_ms: std::sync::atomic::AtomicI64::new(now_ms),
        }
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, now_ms: Timestamp) {
        self.now_ms
            .store(now_ms, std::sync::atomic::Ordering::Relaxed);
    }

    /// Shift the clock forward (or backward, with a negative delta).
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms
            .fetch_add(delta_ms, std::sync::atomic::Ordering::Relaxed);
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> Timestamp {
        self.now_ms.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// A timestamp as it appears on the wire, before normalization.
///
/// Untagged so serde picks the variant from the JSON shape. Numbers are
/// epoch *seconds* (possibly fractional), strings are parsed as RFC 3339
/// with a lenient `YYYY-MM-DD HH:MM:SS` fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch seconds, integer or fractional.
    Seconds(f64),
    /// Wall-clock string.
    Text(String),
}

impl RawTimestamp {
    /// Normalize a wire timestamp to canonical epoch milliseconds.
    ///
    /// Total: any missing or unparseable value falls back to `now` from the
    /// supplied clock, so one malformed record never aborts an ingestion
    /// cycle. The fallback is logged at debug level.
    pub fn normalize(raw: Option<&RawTimestamp>, clock: &dyn TimeSource) -> Timestamp {
        match raw {
            Some(RawTimestamp::Seconds(secs)) if secs.is_finite() => (secs * 1000.0) as Timestamp,
            Some(RawTimestamp::Text(text)) => match parse_text_timestamp(text) {
                Some(ms) => ms,
                None => {
                    log::debug!("unparseable timestamp {:?}, substituting current time", text);
                    clock.now()
                }
            },
            Some(RawTimestamp::Seconds(_)) | None => {
                log::debug!("missing or non-finite timestamp, substituting current time");
                clock.now()
            }
        }
    }
}

fn parse_text_timestamp(text: &str) -> Option<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    // Older records used a space separator without a zone; treat those as UTC.
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Format a canonical timestamp as an ISO-8601/RFC 3339 string in UTC.
///
/// Used by the CSV report builder; falls back to the raw millisecond count
/// for timestamps outside chrono's representable range.
pub fn format_iso8601(ts: Timestamp) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ts) {
        Some(dt) => dt.to_rfc3339(),
        None => ts.to_string(),
    }
}

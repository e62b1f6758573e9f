//! Backend Connectors for AccelMon Telemetry Stores
//!
//! ## Overview
//!
//! Concrete implementations of the `accelmon-core` [`TelemetryStore`] trait
//! for real backends. The core crate stays transport-free; everything that
//! opens a socket lives here.
//!
//! Currently one connector is provided:
//!
//! - [`http::HttpStore`]: speaks the Firebase-style REST/JSON dialect
//!   (collection endpoints addressed as `<path>.json`, keyed-object query
//!   responses, `orderBy`/`limitToLast` query parameters). Works against
//!   Firebase Realtime Database and compatible stores.
//!
//! ## Design
//!
//! Connectors are blocking. The pipeline runs them from its own poller
//! thread, so an async runtime would buy nothing here but a dependency. All
//! transient failures surface as [`accelmon_core::StoreError`] values; the
//! pipeline decides what degrades and what is fatal.
//!
//! [`TelemetryStore`]: accelmon_core::TelemetryStore

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod http;

pub use http::{AuthMethod, HttpConfig, HttpError, HttpStore};

/// Connection statistics common to all connectors.
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Requests completed successfully.
    pub requests_ok: u64,
    /// Requests that failed after exhausting retries.
    pub requests_failed: u64,
    /// Total request body bytes sent.
    pub bytes_sent: u64,
    /// Retry attempts performed.
    pub retries: u32,
    /// Last error message, for diagnostics.
    pub last_error: Option<String>,
}

//! Core telemetry engine for AccelMon
//!
//! Real-time accelerometer monitoring: a polling ingestion pipeline with
//! high-water-mark deduplication, a bounded newest-first buffer, subscriber
//! fan-out, a hysteresis alarm engine, per-axis statistics, and CSV report
//! generation. Backends plug in through the [`store::TelemetryStore`] trait;
//! forecasting lives in the companion `accelmon-forecast` crate.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use accelmon_core::{IngestionPipeline, MemoryStore, SystemClock};
//!
//! let store = Arc::new(MemoryStore::new());
//! let pipeline = IngestionPipeline::new(store, Arc::new(SystemClock));
//!
//! let sub = pipeline.subscribe(|snapshot| {
//!     if let Some(latest) = snapshot.first() {
//!         println!("x={} y={} z={}", latest.x, latest.y, latest.z);
//!     }
//! });
//!
//! pipeline.start_polling(Duration::from_secs(1));
//! # drop(sub);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod alarm;
pub mod buffer;
pub mod config;
pub mod pipeline;
pub mod reading;
pub mod report;
pub mod stats;
pub mod store;
pub mod subscribers;
pub mod time;

// Public API
pub use alarm::{Alarm, AlarmEngine, AlarmNotifier, Direction, LogNotifier, Severity, ThresholdSet};
pub use buffer::RollingBuffer;
pub use config::{MonitorConfig, PredictionMethod, TimeRange};
pub use pipeline::{IngestionPipeline, Subscription};
pub use reading::{Axis, RawRecord, Reading};
pub use report::{generate_csv_report, generate_report_data, ReportData, TimeWindow};
pub use stats::{compute_statistics, Statistics};
pub use store::{MemoryStore, StoreError, TelemetryStore};
pub use time::{FixedClock, SystemClock, TimeSource, Timestamp};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

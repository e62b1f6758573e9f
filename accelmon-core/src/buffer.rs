//! Rolling telemetry buffer with high-water-mark deduplication
//!
//! ## Overview
//!
//! The pipeline keeps a bounded, newest-first window of readings. Each poll
//! returns the newest tail of the backend stream, which overlaps heavily with
//! what was fetched last time; the buffer's job is to admit only records it
//! has not seen before and keep the window sorted and bounded.
//!
//! ## Design Rationale
//!
//! Deduplication is by high-water mark rather than by id set. The mark is the
//! newest timestamp ever admitted; a fetched record is new exactly when its
//! timestamp is strictly greater. This makes the merge O(fetch) with no
//! per-record lookup structure, at the cost of dropping distinct records that
//! share a timestamp with the mark. Sensor cadence is ~1 Hz with millisecond
//! stamps, so ties are collisions in practice, not data.
//!
//! Snapshots are `Arc<Vec<Reading>>` and the buffer is replaced wholesale on
//! merge, never mutated in place. A subscriber holding a snapshot keeps a
//! consistent view regardless of what the pipeline does afterwards.
//!
//! ```text
//! buffer [t=5, t=4, t=3]  hwm=5
//! fetch  [t=3, t=5, t=7]
//!             │
//!             ▼  admit strictly > hwm
//! admitted [t=7]
//! buffer [t=7, t=5, t=4, t=3]  hwm=7
//! ```

use std::sync::Arc;

use crate::reading::Reading;
use crate::time::Timestamp;

/// Bounded newest-first window of readings.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    snapshot: Arc<Vec<Reading>>,
    high_water_mark: Option<Timestamp>,
    capacity: usize,
}

impl RollingBuffer {
    /// Default window size. Roughly eight minutes of data at the default
    /// one-second cadence, well above what any consumer renders at once.
    pub const DEFAULT_CAPACITY: usize = 500;

    /// Buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Capacity 0 is clamped to 1 so the head, which the alarm engine
    /// evaluates, always exists once data has arrived.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshot: Arc::new(Vec::new()),
            high_water_mark: None,
            capacity: capacity.max(1),
        }
    }

    /// Current snapshot, newest first. Cheap to clone and hand out.
    pub fn snapshot(&self) -> Arc<Vec<Reading>> {
        Arc::clone(&self.snapshot)
    }

    /// Newest admitted timestamp, if any data has ever been admitted.
    pub fn high_water_mark(&self) -> Option<Timestamp> {
        self.high_water_mark
    }

    /// Number of buffered readings.
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// True until the first merge admits data.
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Merge a fetched batch, returning the number of admitted readings.
    ///
    /// Cold start (no mark yet) adopts the whole batch. Afterwards only
    /// records with timestamps strictly above the mark are admitted; they are
    /// sorted newest-first and prepended, the tail is truncated to capacity,
    /// and the mark advances to the newest admitted timestamp. Re-merging the
    /// same batch admits nothing, and the mark never moves backwards.
    pub fn merge(&mut self, fetched: Vec<Reading>) -> usize {
        let mut admitted: Vec<Reading> = match self.high_water_mark {
            None => fetched,
            Some(mark) => fetched
                .into_iter()
                .filter(|r| r.timestamp > mark)
                .collect(),
        };

        if admitted.is_empty() {
            return 0;
        }

        admitted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        // Newest admitted is at the front after the sort.
        self.high_water_mark = Some(admitted[0].timestamp);

        let mut next = admitted;
        let count = next.len();
        next.extend(self.snapshot.iter().cloned());
        next.truncate(self.capacity);
        self.snapshot = Arc::new(next);

        count
    }

    /// Drop all readings and reset the mark, so the next merge cold-starts.
    pub fn clear(&mut self) {
        self.snapshot = Arc::new(Vec::new());
        self.high_water_mark = None;
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

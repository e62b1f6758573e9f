//! Telemetry store abstraction
//!
//! ## Overview
//!
//! The ingestion pipeline never talks to a backend directly. It goes through
//! the [`TelemetryStore`] trait, which models the minimal surface the system
//! needs: a time-ordered bounded query, an append, a destructive clear, and
//! an optional push-style watch. Concrete backends live in the connectors
//! crate; this module only ships [`MemoryStore`], the in-process backend used
//! by tests and simulators.
//!
//! ## Wire conventions
//!
//! Stores traffic in [`RawRecord`]s with epoch-second timestamps. The
//! pipeline owns normalization to canonical milliseconds; a store must not
//! convert units itself.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::reading::RawRecord;

/// Errors crossing the store boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Network or I/O failure reaching the backend. Transient; the pipeline
    /// degrades the cycle rather than propagating this to subscribers.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend refused the operation (bad credentials, locked-down
    /// rules). Retrying without reconfiguration will not help.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Payload could not be decoded as telemetry records.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The store does not implement this operation (e.g. watch on a
    /// poll-only backend).
    #[error("operation not supported by this store")]
    Unsupported,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Callback invoked by watch-capable stores on every change.
pub type WatchCallback = Box<dyn Fn(Vec<RawRecord>) + Send + Sync>;

/// Handle keeping a watch registration alive.
///
/// Dropping the handle detaches the callback. Stores return this from
/// [`TelemetryStore::watch`] so the pipeline controls the subscription
/// lifetime without knowing the backend's internals.
pub struct WatchHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    /// Handle that runs `cancel` exactly once when dropped.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl core::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WatchHandle").finish_non_exhaustive()
    }
}

/// Backend boundary for telemetry records.
pub trait TelemetryStore: Send + Sync {
    /// Fetch up to `limit` records, ordered by wire timestamp ascending.
    ///
    /// The pipeline asks for the newest tail of the stream; stores that
    /// cannot order server-side may return records in any order and rely on
    /// the pipeline's merge to sort them.
    fn query(&self, limit: usize) -> StoreResult<Vec<RawRecord>>;

    /// Append one record.
    fn append(&self, record: &RawRecord) -> StoreResult<()>;

    /// Delete every record. Destructive and not undoable.
    fn clear(&self) -> StoreResult<()>;

    /// Register a push callback fired on every change.
    ///
    /// Default is [`StoreError::Unsupported`]; poll-only backends leave it
    /// that way.
    fn watch(&self, _callback: WatchCallback) -> StoreResult<WatchHandle> {
        Err(StoreError::Unsupported)
    }
}

/// In-memory store for tests and simulators.
///
/// Supports watch, so the pipeline's push path can be exercised without a
/// network. Clone shares the underlying storage.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    records: Vec<RawRecord>,
    watchers: Vec<Arc<WatcherSlot>>,
}

struct WatcherSlot {
    callback: WatchCallback,
    active: Mutex<bool>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with records without firing watchers.
    pub fn seed(&self, records: Vec<RawRecord>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.records = records;
    }

    fn notify_watchers(&self) {
        let (records, watchers) = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            (inner.records.clone(), inner.watchers.clone())
        };
        for watcher in watchers {
            let active = *watcher.active.lock().unwrap_or_else(|e| e.into_inner());
            if active {
                (watcher.callback)(records.clone());
            }
        }
    }
}

impl TelemetryStore for MemoryStore {
    fn query(&self, limit: usize) -> StoreResult<Vec<RawRecord>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let start = inner.records.len().saturating_sub(limit);
        Ok(inner.records[start..].to_vec())
    }

    fn append(&self, record: &RawRecord) -> StoreResult<()> {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.records.push(record.clone());
        }
        self.notify_watchers();
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.records.clear();
        }
        self.notify_watchers();
        Ok(())
    }

    fn watch(&self, callback: WatchCallback) -> StoreResult<WatchHandle> {
        let slot = Arc::new(WatcherSlot {
            callback,
            active: Mutex::new(true),
        });
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.watchers.push(slot.clone());
        }
        Ok(WatchHandle::new(move || {
            let mut active = slot.active.lock().unwrap_or_else(|e| e.into_inner());
            *active = false;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn query_returns_newest_tail() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append(&RawRecord::new(i as f64, 0.0, 0.0, i as f64)).unwrap();
        }

        let records = store.query(2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].x, Some(3.0));
        assert_eq!(records[1].x, Some(4.0));
    }

    #[test]
    fn query_with_large_limit_returns_everything() {
        let store = MemoryStore::new();
        store.append(&RawRecord::new(1.0, 0.0, 0.0, 1.0)).unwrap();

        assert_eq!(store.query(100).unwrap().len(), 1);
    }

    #[test]
    fn clear_empties_the_store() {
        let store = MemoryStore::new();
        store.append(&RawRecord::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        store.clear().unwrap();

        assert!(store.query(10).unwrap().is_empty());
    }

    #[test]
    fn watch_fires_on_append_until_handle_dropped() {
        let store = MemoryStore::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_cb = fired.clone();

        let handle = store
            .watch(Box::new(move |_records| {
                fired_in_cb.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        store.append(&RawRecord::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        drop(handle);
        store.append(&RawRecord::new(2.0, 0.0, 0.0, 2.0)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

//! Ingestion pipeline
//!
//! ## Overview
//!
//! Owns the rolling buffer, the high-water mark, and the subscriber set, and
//! drives them from a background poll loop against a [`TelemetryStore`].
//! Every cycle fetches the newest records, normalizes them, merges them
//! through the buffer's deduplicating merge, and hands the resulting
//! snapshot to every subscriber exactly once, whether or not anything new
//! arrived. A quiet period is observable, not an error.
//!
//! ```text
//! TelemetryStore ──query──▶ normalize ──merge──▶ RollingBuffer
//!                                                    │ snapshot
//!                                                    ▼
//!                                            SubscriberRegistry ──▶ consumers
//! ```
//!
//! ## Concurrency
//!
//! One poller thread per pipeline. Its sleep is a channel `recv_timeout`, so
//! `stop_polling` wakes it immediately instead of waiting out the interval.
//! Fetch cycles are serialized through a gate mutex; a push notification or
//! a manual fetch can never interleave with an in-flight cycle and corrupt
//! high-water-mark ordering. Poll mode and watch mode are mutually
//! exclusive, and watch pushes are coalesced to at most one processed
//! update per poll interval.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::buffer::RollingBuffer;
use crate::reading::RawRecord;
use crate::store::{StoreError, TelemetryStore, WatchHandle};
use crate::subscribers::{Snapshot, SubscriberFn, SubscriberId, SubscriberRegistry};
use crate::time::{TimeSource, Timestamp};

/// Records requested per fetch cycle.
pub const FETCH_LIMIT: usize = 20;

/// Floor on the poll interval, regardless of what was requested.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval used before the first explicit configuration.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

struct Poller {
    cancel: mpsc::Sender<()>,
    thread: JoinHandle<()>,
    interval: Duration,
}

struct WatchState {
    // Held for its Drop; detaches the store callback when replaced or cleared.
    _handle: WatchHandle,
    last_processed: Option<Timestamp>,
}

struct PipelineState {
    poll_interval: Duration,
    buffer: RollingBuffer,
    watch: Option<WatchState>,
}

struct PipelineInner {
    store: Arc<dyn TelemetryStore>,
    clock: Arc<dyn TimeSource>,
    state: Mutex<PipelineState>,
    // Serializes fetch cycles; see module docs.
    fetch_gate: Mutex<()>,
    poller: Mutex<Option<Poller>>,
    subscribers: SubscriberRegistry,
}

/// Telemetry ingestion pipeline.
///
/// Construct one per monitored source. Dropping the pipeline stops the
/// poller thread and any backend watch.
pub struct IngestionPipeline {
    inner: Arc<PipelineInner>,
}

impl IngestionPipeline {
    /// Pipeline over `store`, stamping fallback timestamps from `clock`.
    pub fn new(store: Arc<dyn TelemetryStore>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                store,
                clock,
                state: Mutex::new(PipelineState {
                    poll_interval: DEFAULT_POLL_INTERVAL,
                    buffer: RollingBuffer::new(),
                    watch: None,
                }),
                fetch_gate: Mutex::new(()),
                poller: Mutex::new(None),
                subscribers: SubscriberRegistry::new(),
            }),
        }
    }

    /// Pipeline with a non-default buffer capacity.
    pub fn with_buffer_capacity(
        store: Arc<dyn TelemetryStore>,
        clock: Arc<dyn TimeSource>,
        capacity: usize,
    ) -> Self {
        let pipeline = Self::new(store, clock);
        {
            let mut state = pipeline.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            state.buffer = RollingBuffer::with_capacity(capacity);
        }
        pipeline
    }

    /// Begin polling at `interval`.
    ///
    /// Idempotent for the same interval. A different interval restarts the
    /// timer. Requested intervals below the floor are clamped. The first
    /// fetch fires immediately on the poller thread. Starting the poller
    /// releases any active watch; the two modes never run together.
    pub fn start_polling(&self, interval: Duration) {
        self.inner.start_polling(interval);
    }

    /// Cancel the recurring fetch. Idempotent. An in-flight fetch finishes
    /// quietly and does not reschedule.
    pub fn stop_polling(&self) {
        self.inner.stop_polling();
    }

    /// Whether the poll timer is currently running.
    pub fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Reconfigure the poll cadence without touching subscribers.
    ///
    /// If the poller is running it restarts at the new interval; otherwise
    /// the interval takes effect on the next start.
    pub fn set_poll_interval(&self, interval: Duration) {
        let interval = interval.max(MIN_POLL_INTERVAL);
        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            state.poll_interval = interval;
        }
        if self.is_polling() {
            self.inner.start_polling(interval);
        }
    }

    /// Current poll interval.
    pub fn poll_interval(&self) -> Duration {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.poll_interval
    }

    /// Register a subscriber, returning a disposer handle.
    ///
    /// A late joiner with data already buffered receives the current
    /// snapshot immediately. The first subscriber starts polling at the
    /// configured interval (unless a watch is active); dropping the last
    /// subscription stops polling and releases any watch.
    pub fn subscribe(&self, callback: impl Fn(&Snapshot) + Send + Sync + 'static) -> Subscription {
        self.inner.clone().subscribe(Arc::new(callback))
    }

    /// Run one fetch cycle synchronously on the calling thread.
    ///
    /// The same path the poll timer takes; exposed so embedders and tests
    /// can drive ingestion without a timer.
    pub fn fetch_once(&self) {
        self.inner.fetch_cycle();
    }

    /// Delete all backend records and reset local state.
    ///
    /// On success subscribers are notified with an empty snapshot and the
    /// next fetch cold-starts. Backend failure is logged and reported as
    /// `false`; local state is untouched so no data is lost client-side.
    pub fn clear(&self) -> bool {
        match self.inner.store.clear() {
            Ok(()) => {
                // Wait out any in-flight fetch so records queried before the
                // backend clear cannot land after the local reset.
                let _gate = self
                    .inner
                    .fetch_gate
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                let snapshot = {
                    let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
                    state.buffer.clear();
                    state.buffer.snapshot()
                };
                self.inner.subscribers.notify_all(&snapshot);
                true
            }
            Err(e) => {
                log::error!("failed to clear telemetry store: {e}");
                false
            }
        }
    }

    /// Switch to push mode, if the store supports it.
    ///
    /// Stops the poll timer first. Pushed updates are processed at most once
    /// per poll interval; intervening pushes are coalesced away, which is
    /// safe because every push carries the full newest tail.
    pub fn start_watching(&self) -> Result<(), StoreError> {
        self.inner.stop_polling();

        let inner = Arc::downgrade(&self.inner);
        let handle = self.inner.store.watch(Box::new(move |records| {
            if let Some(inner) = inner.upgrade() {
                inner.handle_push(records);
            }
        }))?;

        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.watch = Some(WatchState {
            _handle: handle,
            last_processed: None,
        });
        log::info!("pipeline switched to watch mode");
        Ok(())
    }

    /// Release the backend watch, if any. Idempotent.
    pub fn stop_watching(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.watch.take().is_some() {
            log::info!("pipeline watch released");
        }
    }

    /// Current buffer snapshot, newest first.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.buffer.snapshot()
    }

    /// Newest admitted timestamp, if any.
    pub fn high_water_mark(&self) -> Option<Timestamp> {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.buffer.high_water_mark()
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.inner.stop_polling();
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.watch = None;
    }
}

impl PipelineInner {
    fn start_polling(self: &Arc<Self>, interval: Duration) {
        let interval = interval.max(MIN_POLL_INTERVAL);

        {
            let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = poller.as_ref() {
                if existing.interval == interval {
                    log::debug!("already polling every {:?}, ignoring", interval);
                    return;
                }
                // Different cadence: tear the old timer down first. Same
                // self-join hazard as stop_polling.
                if let Some(old) = poller.take() {
                    drop(old.cancel);
                    if old.thread.thread().id() != std::thread::current().id() {
                        let _ = old.thread.join();
                    }
                }
            }
        }

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.poll_interval = interval;
            state.watch = None;
        }

        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let inner = Arc::clone(self);
        let thread = std::thread::Builder::new()
            .name("accelmon-poller".into())
            .spawn(move || {
                log::info!("poller started, interval {:?}", interval);
                loop {
                    inner.fetch_cycle();
                    match cancel_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("poller stopped");
            })
            .unwrap_or_else(|e| panic!("failed to spawn poller thread: {e}"));

        let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        *poller = Some(Poller {
            cancel: cancel_tx,
            thread,
            interval,
        });
    }

    fn stop_polling(&self) {
        let taken = {
            let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
            poller.take()
        };
        if let Some(poller) = taken {
            drop(poller.cancel);
            // A subscriber callback may stop the pipeline from the poller
            // thread itself; joining there would deadlock. The dropped
            // sender already ends the loop after the current cycle.
            if poller.thread.thread().id() != std::thread::current().id() {
                let _ = poller.thread.join();
            }
        }
    }

    fn subscribe(self: Arc<Self>, callback: Arc<SubscriberFn>) -> Subscription {
        let was_empty = self.subscribers.is_empty();
        let id = self.subscribers.add(callback.clone());

        // Late joiners see current data without waiting for the next cycle.
        let snapshot = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.buffer.is_empty() {
                None
            } else {
                Some(state.buffer.snapshot())
            }
        };
        if let Some(snapshot) = snapshot {
            callback(&snapshot);
        }

        if was_empty {
            let watching = {
                let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                state.watch.is_some()
            };
            if !watching {
                let interval = {
                    let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                    state.poll_interval
                };
                self.start_polling(interval);
            }
        }

        Subscription {
            inner: self,
            id: Some(id),
        }
    }

    fn remove_subscriber(&self, id: SubscriberId) {
        self.subscribers.remove(id);
        if self.subscribers.is_empty() {
            self.stop_polling();
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.watch = None;
        }
    }

    /// One full fetch-normalize-merge-notify cycle.
    fn fetch_cycle(&self) {
        let _gate = self.fetch_gate.lock().unwrap_or_else(|e| e.into_inner());

        let records = match self.store.query(FETCH_LIMIT) {
            Ok(records) => records,
            Err(StoreError::PermissionDenied(reason)) => {
                log::warn!("store rejected query ({reason}); treating as empty cycle");
                Vec::new()
            }
            Err(e) => {
                log::warn!("fetch failed ({e}); treating as empty cycle");
                Vec::new()
            }
        };

        self.merge_and_notify(records);
    }

    /// Push-mode entry point, throttled to the poll interval.
    fn handle_push(&self, records: Vec<RawRecord>) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            // Read the interval before borrowing the watch state mutably.
            let interval_ms = state.poll_interval.as_millis() as i64;
            let Some(watch) = state.watch.as_mut() else {
                return;
            };
            let now = self.clock.now();
            if let Some(last) = watch.last_processed {
                if now - last < interval_ms {
                    log::debug!("coalescing push update inside throttle window");
                    return;
                }
            }
            watch.last_processed = Some(now);
        }

        let _gate = self.fetch_gate.lock().unwrap_or_else(|e| e.into_inner());
        let start = records.len().saturating_sub(FETCH_LIMIT);
        self.merge_and_notify(records[start..].to_vec());
    }

    fn merge_and_notify(&self, records: Vec<RawRecord>) {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let readings = records
                .iter()
                .enumerate()
                .map(|(seq, r)| r.normalize(self.clock.as_ref(), seq))
                .collect();
            let admitted = state.buffer.merge(readings);
            if admitted > 0 {
                log::debug!("admitted {admitted} new readings, buffer len {}", state.buffer.len());
            }
            state.buffer.snapshot()
        };

        // Always notify, even on a quiet cycle, so consumers can observe
        // liveness.
        self.subscribers.notify_all(&snapshot);
    }
}

/// Disposer handle returned by [`IngestionPipeline::subscribe`].
///
/// Unsubscribes on drop; `unsubscribe` is the explicit form.
pub struct Subscription {
    inner: Arc<PipelineInner>,
    id: Option<SubscriberId>,
}

impl Subscription {
    /// Remove the subscriber now instead of waiting for drop.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.inner.remove_subscriber(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

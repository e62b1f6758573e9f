//! Subscriber registry for buffer fan-out
//!
//! Consumers register a callback and get back an id; the pipeline notifies
//! every registered callback at most once per ingestion cycle with the
//! current buffer snapshot. A panicking callback is contained here so one
//! misbehaving consumer cannot take down the others or the poll loop.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::reading::Reading;

/// Snapshot handed to subscribers, newest first.
pub type Snapshot = Arc<Vec<Reading>>;

/// Subscriber callback. Runs on the pipeline's notification path, so it
/// should hand off heavy work rather than block.
pub type SubscriberFn = dyn Fn(&Snapshot) + Send + Sync;

/// Opaque registration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    subscribers: HashMap<u64, Arc<SubscriberFn>>,
    next_id: u64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, callback: Arc<SubscriberFn>) -> SubscriberId {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, callback);
        SubscriberId(id)
    }

    /// Returns true if the id was still registered.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.remove(&id.0).is_some()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver the snapshot to every subscriber, isolating panics.
    ///
    /// Callbacks run outside the registry lock so a subscriber may
    /// unsubscribe itself (or register another subscriber) from inside its
    /// own callback without deadlocking.
    pub fn notify_all(&self, snapshot: &Snapshot) {
        let callbacks: Vec<Arc<SubscriberFn>> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.subscribers.values().cloned().collect()
        };

        for callback in callbacks {
            let result = catch_unwind(AssertUnwindSafe(|| callback(snapshot)));
            if result.is_err() {
                log::error!("subscriber callback panicked; continuing with remaining subscribers");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn empty_snapshot() -> Snapshot {
        Arc::new(Vec::new())
    }

    #[test]
    fn notify_reaches_all_subscribers() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            registry.add(Arc::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        registry.notify_all(&empty_snapshot());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn removed_subscriber_is_not_notified() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_cb = count.clone();
        let id = registry.add(Arc::new(move |_| {
            count_cb.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(registry.remove(id));
        assert!(!registry.remove(id));

        registry.notify_all(&empty_snapshot());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        registry.add(Arc::new(|_| panic!("bad subscriber")));
        let count_cb = count.clone();
        registry.add(Arc::new(move |_| {
            count_cb.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify_all(&empty_snapshot());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_may_unsubscribe_itself() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot: Arc<Mutex<Option<SubscriberId>>> = Arc::new(Mutex::new(None));

        let registry_cb = registry.clone();
        let slot_cb = slot.clone();
        let id = registry.add(Arc::new(move |_| {
            if let Some(id) = slot_cb.lock().unwrap().take() {
                registry_cb.remove(id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        registry.notify_all(&empty_snapshot());
        assert!(registry.is_empty());
    }
}

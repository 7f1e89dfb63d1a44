//! Subscriber registry and notification fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use lattice_types::Series;
use parking_lot::Mutex;

use crate::error::HubError;
use crate::observable::SubscriptionId;
use crate::observer::StreamObserver;

struct RegistryEntry<T: Series> {
    id: SubscriptionId,
    observer: Weak<dyn StreamObserver<T>>,
}

/// Instance-scoped observer registry for one hub.
///
/// Observers are held weakly: dropping every strong handle to a
/// downstream hub detaches it from fan-out, and dead entries are
/// compacted whenever a snapshot is taken. Fan-out always iterates a
/// snapshot, never the live set, so a subscriber unsubscribing itself
/// mid-notification cannot corrupt the iteration.
pub(crate) struct ObserverRegistry<T: Series> {
    entries: Mutex<Vec<RegistryEntry<T>>>,
    next_id: AtomicU64,
}

impl<T: Series> ObserverRegistry<T> {
    pub(crate) fn new() -> Self {
        ObserverRegistry {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn StreamObserver<T>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push(RegistryEntry {
            id,
            observer: Arc::downgrade(&observer),
        });
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() < before
    }

    /// Live observers as a snapshot; compacts dead entries.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn StreamObserver<T>>> {
        let mut entries = self.entries.lock();
        entries.retain(|e| e.observer.strong_count() > 0);
        entries.iter().filter_map(|e| e.observer.upgrade()).collect()
    }

    /// Takes every live observer and clears the registry.
    pub(crate) fn drain(&self) -> Vec<Arc<dyn StreamObserver<T>>> {
        let entries = std::mem::take(&mut *self.entries.lock());
        entries.iter().filter_map(|e| e.observer.upgrade()).collect()
    }

    pub(crate) fn count(&self) -> usize {
        self.snapshot().len()
    }

    /// Largest warm-up requirement among current observers.
    pub(crate) fn max_observer_min(&self) -> usize {
        self.snapshot()
            .iter()
            .map(|o| o.min_cache_size())
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn notify_add(&self, item: &T, index: usize) -> Result<(), HubError> {
        for observer in self.snapshot() {
            observer.on_add(item, true, Some(index))?;
        }
        Ok(())
    }

    pub(crate) fn notify_rebuild(&self, from_timestamp_ns: i64) -> Result<(), HubError> {
        for observer in self.snapshot() {
            observer.on_rebuild(from_timestamp_ns)?;
        }
        Ok(())
    }

    pub(crate) fn notify_prune(&self, to_timestamp_ns: i64) -> Result<(), HubError> {
        for observer in self.snapshot() {
            observer.on_prune(to_timestamp_ns)?;
        }
        Ok(())
    }

    pub(crate) fn notify_error(&self, error: &HubError) {
        for observer in self.snapshot() {
            observer.on_error(error);
        }
    }
}

//! Shared, lockable result cache with duplicate and overflow bookkeeping.

use std::cell::RefCell;
use std::sync::Arc;

use lattice_types::Series;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::{HubError, OVERFLOW_THRESHOLD};

type Lock<T> = ReentrantMutex<RefCell<CacheCell<T>>>;
pub(crate) type CacheGuard<'a, T> = ReentrantMutexGuard<'a, RefCell<CacheCell<T>>>;

/// Lock-internal cache state.
///
/// Invariant: `items` is timestamp-non-decreasing at every point where no
/// in-flight mutation holds the cache lock.
pub(crate) struct CacheCell<T> {
    /// Timeline-ordered cached results.
    pub(crate) items: Vec<T>,
    /// Most recent arrival, for duplicate detection.
    pub(crate) last_arrival: Option<T>,
    /// Consecutive identical duplicates seen so far.
    pub(crate) overflow_count: u8,
    /// Set once the overflow threshold trips; cleared by fault reset.
    pub(crate) faulted: bool,
}

impl<T: Series> CacheCell<T> {
    /// Duplicate and overflow bookkeeping for a candidate arrival.
    ///
    /// Returns `true` when the candidate repeats the last arrival and must
    /// be suppressed. In forced-append mode duplicates are re-appended, but
    /// the overflow counter still advances so a circular chain still trips.
    ///
    /// # Errors
    /// Returns [`HubError::Overflow`] past the threshold; the hub is
    /// faulted until reset.
    pub(crate) fn check_overflow(&mut self, item: &T, forced: bool) -> Result<bool, HubError> {
        let Some(last) = &self.last_arrival else {
            // first arrival
            self.last_arrival = Some(item.clone());
            return Ok(false);
        };

        // progressive check: timestamp first, full equality only on match
        if item.timestamp_ns() == last.timestamp_ns() && item == last {
            self.overflow_count = self.overflow_count.saturating_add(1);

            if self.overflow_count > OVERFLOW_THRESHOLD {
                self.faulted = true;
                return Err(HubError::Overflow);
            }

            return Ok(!forced);
        }

        self.overflow_count = 0;
        self.last_arrival = Some(item.clone());
        Ok(false)
    }

    /// Appends a result; a successful append clears any stale fault state.
    pub(crate) fn push(&mut self, item: T) {
        self.items.push(item);
        self.faulted = false;
    }

    /// Evicts the oldest records down to `max` items.
    ///
    /// Returns the timestamp of the last evicted record (the prune
    /// boundary subscribers must also honor), or `None` when nothing was
    /// evicted.
    pub(crate) fn prune(&mut self, max: usize) -> Option<i64> {
        if self.items.len() <= max {
            return None;
        }

        let excess = self.items.len() - max;
        let boundary = self.items[excess - 1].timestamp_ns();
        self.items.drain(..excess);
        Some(boundary)
    }

    /// Removes every record with a timestamp at or after the boundary,
    /// then re-anchors duplicate detection on the remaining tail.
    pub(crate) fn truncate_from(&mut self, from_timestamp_ns: i64) {
        let keep = self
            .items
            .partition_point(|c| c.timestamp_ns() < from_timestamp_ns);
        self.items.truncate(keep);
        self.last_arrival = self.items.last().cloned();
    }

    /// Removes every record with a timestamp at or before the boundary.
    pub(crate) fn drop_through(&mut self, to_timestamp_ns: i64) {
        let cut = self
            .items
            .partition_point(|c| c.timestamp_ns() <= to_timestamp_ns);
        self.items.drain(..cut);
    }
}

/// Shared handle to a hub's timeline-ordered cache.
///
/// The outer re-entrant lock is the per-hub lock: the thread driving a
/// synchronous cascade may re-enter an upstream cache for reads on the
/// same call stack, while any other thread blocks until the in-flight
/// mutation (including its notification fan-out) completes.
pub struct CacheStore<T>(Arc<Lock<T>>);

impl<T> Clone for CacheStore<T> {
    fn clone(&self) -> Self {
        CacheStore(Arc::clone(&self.0))
    }
}

impl<T: Series> Default for CacheStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Series> CacheStore<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        CacheStore(Arc::new(ReentrantMutex::new(RefCell::new(CacheCell {
            items: Vec::new(),
            last_arrival: None,
            overflow_count: 0,
            faulted: false,
        }))))
    }

    /// Locks this cache for the duration of a compound operation.
    ///
    /// All `RefCell` borrows taken under the guard must be released before
    /// observers are notified, so that re-entrant reads from downstream
    /// hubs on the same call stack never conflict.
    pub(crate) fn lock(&self) -> CacheGuard<'_, T> {
        self.0.lock()
    }

    /// Runs `f` with shared access to the cached records (the live view).
    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let guard = self.0.lock();
        let cell = guard.borrow();
        f(&cell.items)
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read(<[T]>::len)
    }

    /// Checks if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read(<[T]>::is_empty)
    }

    /// Most recent cached record.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.read(|items| items.last().cloned())
    }

    pub(crate) fn is_faulted(&self) -> bool {
        let guard = self.0.lock();
        let cell = guard.borrow();
        cell.faulted
    }

    pub(crate) fn reset_fault(&self) {
        let guard = self.0.lock();
        let mut cell = guard.borrow_mut();
        cell.overflow_count = 0;
        cell.faulted = false;
    }
}

//! Standalone root provider for quote bars.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lattice_types::{Quote, Series, TIMESTAMP_MIN};

use crate::cache::CacheStore;
use crate::error::HubError;
use crate::index;
use crate::observable::{StreamObservable, SubscriptionId};
use crate::observer::StreamObserver;
use crate::registry::ObserverRegistry;

/// Default retention bound: effectively unbounded.
pub const DEFAULT_MAX_CACHE_SIZE: usize = usize::MAX;

/// Root of a hub graph: owns the quote timeline, has no upstream.
///
/// A root hub cannot rebuild itself from a provider; late arrivals are
/// spliced into its own cache in place and downstream hubs rebuild from
/// it. Arrivals older than the earliest retained quote are dropped,
/// because pruned history cannot be re-derived for subscribers.
pub struct QuoteHub {
    cache: CacheStore<Quote>,
    observers: ObserverRegistry<Quote>,
    max_cache_size: usize,
    min_cache_size: AtomicUsize,
}

enum RootAct {
    Append,
    Replace(usize),
    Splice(usize),
    Reject,
}

impl QuoteHub {
    /// Creates an unbounded root hub.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(QuoteHub {
            cache: CacheStore::new(),
            observers: ObserverRegistry::new(),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            min_cache_size: AtomicUsize::new(0),
        })
    }

    /// Creates a root hub retaining at most `max_cache_size` quotes.
    ///
    /// # Errors
    /// Returns [`HubError::InsufficientRetention`] for a zero bound.
    pub fn with_max_cache_size(max_cache_size: usize) -> Result<Arc<Self>, HubError> {
        if max_cache_size == 0 {
            return Err(HubError::InsufficientRetention {
                max: max_cache_size,
                min: 1,
            });
        }

        Ok(Arc::new(QuoteHub {
            cache: CacheStore::new(),
            observers: ObserverRegistry::new(),
            max_cache_size,
            min_cache_size: AtomicUsize::new(0),
        }))
    }

    // INGESTION SURFACE

    /// Adds a new or updated quote, treated as a potential late arrival.
    ///
    /// In order: appended. Same timestamp as a cached quote: replaced in
    /// place. Older than the tail but within retained history: spliced
    /// into position. Older than all retained history: dropped.
    ///
    /// # Errors
    /// Returns [`HubError::Overflow`] past the duplicate threshold, and
    /// propagates any fault raised downstream during fan-out.
    pub fn add(&self, quote: Quote) -> Result<(), HubError> {
        let _hub = self.cache.lock();

        if self.bookkeep_duplicate(&quote)? {
            return Ok(());
        }

        let act = {
            let guard = self.cache.lock();
            let cell = guard.borrow();
            let items = &cell.items;
            match items.last() {
                None => RootAct::Append,
                Some(last) if quote.timestamp_ns() > last.timestamp_ns() => RootAct::Append,
                Some(_) => match index::index_of_timestamp(items, quote.timestamp_ns()) {
                    Some(i) => RootAct::Replace(i),
                    None => match index::index_gte(items, quote.timestamp_ns()) {
                        // before the retained timeline
                        Some(0) | None => RootAct::Reject,
                        Some(i) => RootAct::Splice(i),
                    },
                },
            }
        };

        match act {
            RootAct::Append => {
                // evict to the retention bound before appending, so
                // subscriber caches stay position-aligned during fan-out
                let pruned_to = {
                    let guard = self.cache.lock();
                    let mut cell = guard.borrow_mut();
                    cell.prune(self.max_cache_size.saturating_sub(1))
                };
                if let Some(boundary) = pruned_to {
                    tracing::debug!(boundary, "quote hub pruned to retention bound");
                    self.observers.notify_prune(boundary)?;
                }

                let position = {
                    let guard = self.cache.lock();
                    let mut cell = guard.borrow_mut();
                    cell.push(quote);
                    cell.items.len() - 1
                };

                self.observers.notify_add(&quote, position)?;
                Ok(())
            }
            RootAct::Replace(position) => {
                let changed = {
                    let guard = self.cache.lock();
                    let mut cell = guard.borrow_mut();
                    if cell.items[position] == quote {
                        false
                    } else {
                        cell.items[position] = quote;
                        true
                    }
                };

                if changed {
                    self.observers.notify_rebuild(quote.timestamp_ns())?;
                }
                Ok(())
            }
            RootAct::Splice(position) => {
                {
                    let guard = self.cache.lock();
                    let mut cell = guard.borrow_mut();
                    cell.items.insert(position, quote);
                }
                self.observers.notify_rebuild(quote.timestamp_ns())
            }
            RootAct::Reject => {
                tracing::debug!(
                    timestamp_ns = quote.timestamp_ns(),
                    "dropping quote before retained timeline"
                );
                Ok(())
            }
        }
    }

    /// Adds a batch of quotes, sorted by timestamp first.
    ///
    /// # Errors
    /// Propagates the first fault raised by any single add.
    pub fn add_batch(&self, quotes: impl IntoIterator<Item = Quote>) -> Result<(), HubError> {
        let mut batch: Vec<Quote> = quotes.into_iter().collect();
        batch.sort_by_key(Series::timestamp_ns);

        for quote in batch {
            self.add(quote)?;
        }
        Ok(())
    }

    /// Late-arrival aware add (alias kept for surface parity with
    /// derived hubs).
    ///
    /// # Errors
    /// Same as [`QuoteHub::add`].
    pub fn insert(&self, quote: Quote) -> Result<(), HubError> {
        self.add(quote)
    }

    // REMOVE & REMOVE RANGE

    /// Deletes the cached quote at `index`; downstream hubs rebuild from
    /// its timestamp.
    ///
    /// # Errors
    /// Returns [`HubError::IndexOutOfRange`] beyond cache bounds.
    pub fn remove_at(&self, index: usize) -> Result<(), HubError> {
        let _hub = self.cache.lock();

        let removed_ts = {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            if index >= cell.items.len() {
                return Err(HubError::IndexOutOfRange {
                    index,
                    len: cell.items.len(),
                });
            }
            cell.items.remove(index).timestamp_ns()
        };

        self.observers.notify_rebuild(removed_ts)
    }

    /// Truncates the quote timeline at and after a point in time.
    ///
    /// # Errors
    /// Propagates downstream faults raised by the rebuild notification.
    pub fn remove_range_from(&self, from_timestamp_ns: i64, notify: bool) -> Result<(), HubError> {
        let _hub = self.cache.lock();

        {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            cell.truncate_from(from_timestamp_ns);
        }

        if notify {
            self.observers.notify_rebuild(from_timestamp_ns)?;
        }
        Ok(())
    }

    /// Truncates the quote timeline at and after an index position.
    ///
    /// # Errors
    /// Propagates downstream faults raised by the rebuild notification.
    pub fn remove_range_at(&self, from_index: usize, notify: bool) -> Result<(), HubError> {
        let from_ts = self.cache.read(|items| {
            if items.is_empty() || from_index >= items.len() {
                None
            } else if from_index == 0 {
                Some(TIMESTAMP_MIN)
            } else {
                Some(items[from_index].timestamp_ns())
            }
        });

        match from_ts {
            Some(ts) => self.remove_range_from(ts, notify),
            None => Ok(()), // nothing to do
        }
    }

    /// Standalone rebuild: there is no provider to replay from, so the
    /// quote timeline is preserved and observers re-derive from it.
    ///
    /// # Errors
    /// Propagates downstream faults raised by the rebuild notification.
    pub fn rebuild_from(&self, from_timestamp_ns: i64) -> Result<(), HubError> {
        let _hub = self.cache.lock();
        self.observers.notify_rebuild(from_timestamp_ns)
    }

    /// Full reset: clear fault state and have every subscriber re-derive.
    ///
    /// # Errors
    /// Propagates downstream faults raised by the rebuild notification.
    pub fn reinitialize(&self) -> Result<(), HubError> {
        self.reset_fault();
        self.rebuild_from(TIMESTAMP_MIN)
    }

    // DIAGNOSTICS & READ SURFACE

    /// Clears the fault flag and overflow counter.
    pub fn reset_fault(&self) {
        self.cache.reset_fault();
    }

    /// `true` once an overflow fault tripped and until it is reset.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.cache.is_faulted()
    }

    /// Runs `f` against the live, read-only view of the cached quotes.
    pub fn results<R>(&self, f: impl FnOnce(&[Quote]) -> R) -> R {
        self.cache.read(f)
    }

    /// Most recent cached quote.
    #[must_use]
    pub fn latest(&self) -> Option<Quote> {
        self.cache.latest()
    }

    /// Number of cached quotes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Checks if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Shared reference to the quote timeline for trusted readers.
    #[must_use]
    pub fn cache_handle(&self) -> CacheStore<Quote> {
        self.cache.clone()
    }

    /// Largest warm-up requirement among subscribers.
    #[must_use]
    pub fn min_cache_size(&self) -> usize {
        self.min_cache_size.load(Ordering::Relaxed)
    }

    /// Configured retention bound.
    #[must_use]
    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.count()
    }

    /// Checks if any observer is registered.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Short display label.
    #[must_use]
    pub fn label(&self) -> String {
        format!("QUOTES: {} items", self.len())
    }

    fn bookkeep_duplicate(&self, quote: &Quote) -> Result<bool, HubError> {
        let checked = {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            cell.check_overflow(quote, false)
        };

        match checked {
            Err(error) => {
                tracing::error!(%error, "quote hub overflow fault");
                self.observers.notify_error(&error);
                Err(error)
            }
            Ok(suppress) => Ok(suppress),
        }
    }
}

impl StreamObservable<Quote> for QuoteHub {
    fn subscribe(&self, observer: Arc<dyn StreamObserver<Quote>>) -> SubscriptionId {
        let id = self.observers.subscribe(observer);
        self.refresh_min_cache_size();
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.observers.unsubscribe(id);
        if removed {
            self.refresh_min_cache_size();
        }
        removed
    }

    fn observer_count(&self) -> usize {
        QuoteHub::observer_count(self)
    }

    fn end_transmission(&self) {
        tracing::debug!("quote hub ending transmission");
        for observer in self.observers.drain() {
            observer.on_completed();
        }
        self.min_cache_size.store(0, Ordering::Relaxed);
    }

    fn cache_handle(&self) -> CacheStore<Quote> {
        QuoteHub::cache_handle(self)
    }

    fn min_cache_size(&self) -> usize {
        QuoteHub::min_cache_size(self)
    }

    fn refresh_min_cache_size(&self) {
        // the root has no warm-up of its own and no provider to notify
        self.min_cache_size
            .store(self.observers.max_observer_min(), Ordering::Relaxed);
    }

    fn max_cache_size(&self) -> usize {
        QuoteHub::max_cache_size(self)
    }

    fn is_faulted(&self) -> bool {
        QuoteHub::is_faulted(self)
    }

    fn label(&self) -> String {
        QuoteHub::label(self)
    }
}

impl fmt::Display for QuoteHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", QuoteHub::label(self))
    }
}

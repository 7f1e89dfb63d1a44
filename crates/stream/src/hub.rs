//! Stream hub core: cache lifecycle, Act classification, rebuild cascade.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use lattice_types::{Series, TIMESTAMP_MIN};
use parking_lot::Mutex;

use crate::cache::CacheStore;
use crate::error::HubError;
use crate::index;
use crate::observable::{StreamObservable, SubscriptionId};
use crate::observer::StreamObserver;
use crate::registry::ObserverRegistry;

/// Caching instruction decided for each incoming candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Act {
    /// Append to the end of the cache.
    Add,
    /// Late arrival or mutated history: recompute from its timestamp.
    Rebuild,
}

/// Read context handed to a conversion hook.
///
/// Both slices are borrowed under the hub locks for the duration of one
/// hook invocation; hooks must not call back into either hub.
pub struct KernelCtx<'a, TIn, TOut> {
    /// The provider's cached records (replay source).
    pub provider: &'a [TIn],
    /// This hub's own cached results so far.
    pub cache: &'a [TOut],
}

/// Per-indicator conversion hook.
///
/// One shared cache/notify/rebuild engine is reused by every indicator;
/// the kernel contributes the one abstract conversion and, when the
/// indicator carries forward-only running state (running sums, smoothing
/// seeds, window trackers), the matching rewind.
pub trait HubKernel<TIn: Series, TOut: Series>: Send + 'static {
    /// Short display label, e.g. `"EMA(14)"`.
    fn label(&self) -> String;

    /// Warm-up requirement: cached history needed before results are
    /// calculable. Feeds the retention negotiation up the chain.
    fn warmup_periods(&self) -> usize {
        0
    }

    /// Converts one provider record into this hub's output candidate and
    /// the cache position it corresponds to.
    ///
    /// # Errors
    /// Returns [`HubError::HistoryMismatch`] when the record cannot be
    /// located in the provider cache without an index hint.
    fn to_result(
        &mut self,
        item: &TIn,
        index_hint: Option<usize>,
        ctx: KernelCtx<'_, TIn, TOut>,
    ) -> Result<(TOut, usize), HubError>;

    /// Rewinds internal running state to a point in time, before history
    /// at or after it is discarded. Default: no state, nothing to do.
    fn rollback(&mut self, timestamp_ns: i64, ctx: KernelCtx<'_, TIn, TOut>) {
        let _ = (timestamp_ns, ctx);
    }
}

/// A node in the computation graph: observer of its provider, observable
/// to its subscribers, owner of a timeline-ordered result cache.
///
/// Mutations and their notification fan-out run under the per-hub
/// re-entrant lock; a single hub must not be driven concurrently from two
/// threads (caller discipline), while independent subtrees may be.
pub struct StreamHub<TIn: Series, TOut: Series, K: HubKernel<TIn, TOut>> {
    provider: Arc<dyn StreamObservable<TIn>>,
    provider_cache: CacheStore<TIn>,
    cache: CacheStore<TOut>,
    observers: ObserverRegistry<TOut>,
    kernel: Mutex<K>,
    name: String,
    warmup: usize,
    max_cache_size: usize,
    min_cache_size: AtomicUsize,
    rebuilding: AtomicBool,
    forced_append: bool,
    subscription: Mutex<Option<SubscriptionId>>,
    weak_self: Weak<Self>,
}

impl<TIn, TOut, K> StreamHub<TIn, TOut, K>
where
    TIn: Series,
    TOut: Series,
    K: HubKernel<TIn, TOut>,
{
    /// Creates a hub bound to `provider`, rebuilds it from the provider's
    /// existing cache, and subscribes it.
    ///
    /// # Errors
    /// Returns [`HubError::InsufficientRetention`] when the inherited
    /// `max_cache_size` cannot hold the kernel's warm-up window.
    pub fn create<P>(provider: &Arc<P>, kernel: K) -> Result<Arc<Self>, HubError>
    where
        P: StreamObservable<TIn> + 'static,
    {
        Self::create_with(provider, kernel, false)
    }

    /// Creates a hub in forced-append mode: duplicate suppression and the
    /// late-arrival rebuild analysis are bypassed, for hubs that
    /// legitimately emit equal-timestamp records (brick-style outputs).
    ///
    /// # Errors
    /// Returns [`HubError::InsufficientRetention`] when the inherited
    /// `max_cache_size` cannot hold the kernel's warm-up window.
    pub fn create_with<P>(
        provider: &Arc<P>,
        kernel: K,
        forced_append: bool,
    ) -> Result<Arc<Self>, HubError>
    where
        P: StreamObservable<TIn> + 'static,
    {
        let provider: Arc<dyn StreamObservable<TIn>> = provider.clone();
        let max_cache_size = provider.max_cache_size();
        let warmup = kernel.warmup_periods();

        if max_cache_size < warmup {
            return Err(HubError::InsufficientRetention {
                max: max_cache_size,
                min: warmup,
            });
        }

        let name = kernel.label();
        let hub = Arc::new_cyclic(|weak| StreamHub {
            provider_cache: provider.cache_handle(),
            provider,
            cache: CacheStore::new(),
            observers: ObserverRegistry::new(),
            kernel: Mutex::new(kernel),
            name,
            warmup,
            max_cache_size,
            min_cache_size: AtomicUsize::new(warmup),
            rebuilding: AtomicBool::new(false),
            forced_append,
            subscription: Mutex::new(None),
            weak_self: weak.clone(),
        });

        hub.reinitialize()?;
        Ok(hub)
    }

    // INGESTION SURFACE

    /// Adds a new provider-equivalent record to the stream.
    ///
    /// # Errors
    /// Returns [`HubError::Overflow`] past the duplicate threshold, and
    /// propagates any fault raised downstream during fan-out.
    pub fn add(&self, item: TIn) -> Result<(), HubError> {
        self.ingest(&item, true, None)
    }

    /// Adds a batch of records, sorted by timestamp first.
    ///
    /// # Errors
    /// Propagates the first fault raised by any single add.
    pub fn add_batch(&self, items: impl IntoIterator<Item = TIn>) -> Result<(), HubError> {
        let mut batch: Vec<TIn> = items.into_iter().collect();
        batch.sort_by_key(Series::timestamp_ns);

        for item in batch {
            self.ingest(&item, true, None)?;
        }
        Ok(())
    }

    /// Inserts a record without rebuilding this hub, then rebuilds its
    /// observers.
    ///
    /// Only appropriate when results at newer timestamps are not affected
    /// by the insertion of the older record.
    ///
    /// # Errors
    /// Propagates conversion failures and downstream faults.
    pub fn insert(&self, item: TIn) -> Result<(), HubError> {
        let _hub = self.cache.lock();

        let (result, position) = self.convert(&item, None)?;

        if position == 0 {
            // normal add
            return self.append_cache(result, true);
        }

        let suppress = self.bookkeep_duplicate(&result)?;
        if suppress {
            return Ok(());
        }

        {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            let at = position.min(cell.items.len());
            cell.items.insert(at, result.clone());
        }

        // observers re-derive; no self-rebuild
        self.observers.notify_rebuild(result.timestamp_ns())
    }

    // REMOVE & REMOVE RANGE

    /// Deletes the cached result at `index`.
    ///
    /// Always followed by a rebuild notification at the removed record's
    /// timestamp: downstream caches keyed by position must shift too.
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

    /// Truncates the cache at and after a point in time.
    ///
    /// Rewinds the kernel's running state first, because forward-only
    /// state must be rewound, not just have its output truncated.
    ///
    /// # Errors
    /// Propagates downstream faults raised by the rebuild notification.
    pub fn remove_range_from(&self, from_timestamp_ns: i64, notify: bool) -> Result<(), HubError> {
        let _hub = self.cache.lock();

        self.rollback_state(from_timestamp_ns);
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

    /// Truncates the cache at and after an index position.
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

    // REBUILD & REINITIALIZE

    /// Rebuilds the whole cache from the provider.
    ///
    /// # Errors
    /// Propagates conversion failures and downstream faults.
    pub fn rebuild(&self) -> Result<(), HubError> {
        self.rebuild_from(TIMESTAMP_MIN)
    }

    /// Recovery path: truncates from the timestamp, replays every
    /// remaining provider record with notifications suppressed, then
    /// emits one rebuild notification.
    ///
    /// # Errors
    /// Propagates conversion failures and downstream faults.
    pub fn rebuild_from(&self, from_timestamp_ns: i64) -> Result<(), HubError> {
        let _hub = self.cache.lock();

        tracing::debug!(hub = %self.name, from_timestamp_ns, "rebuilding cache");

        // rewind state, then truncate
        self.rollback_state(from_timestamp_ns);
        {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            cell.truncate_from(from_timestamp_ns);
        }

        // replay the provider tail; the re-entrancy flag keeps the replay
        // from classifying its own appends as nested rebuilds
        self.rebuilding.store(true, Ordering::Relaxed);
        let replayed = self.provider_cache.read(|provider| {
            let Some(start) = index::index_gte(provider, from_timestamp_ns) else {
                return Ok(());
            };
            for (i, item) in provider.iter().enumerate().skip(start) {
                let (result, _) = self.convert_with(provider, item, Some(i))?;
                self.append_cache(result, false)?;
            }
            Ok(())
        });
        self.rebuilding.store(false, Ordering::Relaxed);
        replayed?;

        self.observers.notify_rebuild(from_timestamp_ns)
    }

    /// Rebuilds from the timestamp at an index position.
    ///
    /// # Errors
    /// Returns [`HubError::IndexOutOfRange`] beyond cache bounds.
    pub fn rebuild_from_index(&self, from_index: usize) -> Result<(), HubError> {
        let from_ts = self.cache.read(|items| {
            if from_index == 0 || items.is_empty() {
                Ok(TIMESTAMP_MIN)
            } else if from_index >= items.len() {
                Err(HubError::IndexOutOfRange {
                    index: from_index,
                    len: items.len(),
                })
            } else {
                Ok(items[from_index].timestamp_ns())
            }
        })?;

        self.rebuild_from(from_ts)
    }

    /// Full reset: unsubscribe, clear fault state, rebuild, resubscribe.
    ///
    /// # Errors
    /// Propagates conversion failures and downstream faults.
    pub fn reinitialize(&self) -> Result<(), HubError> {
        self.unsubscribe();
        self.reset_fault();
        self.rebuild()?;

        if let Some(me) = self.weak_self.upgrade() {
            let observer: Arc<dyn StreamObserver<TIn>> = me;
            *self.subscription.lock() = Some(self.provider.subscribe(observer));
        }
        Ok(())
    }

    /// Detaches this hub from its provider. Idempotent; safe against the
    /// provider's own teardown completing concurrently.
    pub fn unsubscribe(&self) -> bool {
        let taken = self.subscription.lock().take();
        match taken {
            Some(id) => self.provider.unsubscribe(id),
            None => false,
        }
    }

    // DIAGNOSTICS & READ SURFACE

    /// Clears the fault flag and overflow counter after the caller has
    /// resolved the condition.
    pub fn reset_fault(&self) {
        self.cache.reset_fault();
    }

    /// `true` once an overflow fault tripped and until it is reset.
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.cache.is_faulted()
    }

    /// Runs `f` against the live, read-only view of the cached results.
    pub fn results<R>(&self, f: impl FnOnce(&[TOut]) -> R) -> R {
        self.cache.read(f)
    }

    /// Most recent cached result.
    #[must_use]
    pub fn latest(&self) -> Option<TOut> {
        self.cache.latest()
    }

    /// Number of cached results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Checks if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Shared reference to this hub's cache for trusted readers.
    #[must_use]
    pub fn cache_handle(&self) -> CacheStore<TOut> {
        self.cache.clone()
    }

    /// Largest warm-up requirement among this hub and its subscribers.
    #[must_use]
    pub fn min_cache_size(&self) -> usize {
        self.min_cache_size.load(Ordering::Relaxed)
    }

    /// Bound on retained history, inherited from the root provider.
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

    /// Short display label, e.g. `"EMA(14)"`.
    #[must_use]
    pub fn label(&self) -> String {
        self.name.clone()
    }

    // CORE ALGORITHM

    /// Converts and caches one provider record (the shared ingestion
    /// protocol behind `add`, fan-out delivery, and replay).
    fn ingest(&self, item: &TIn, notify: bool, index_hint: Option<usize>) -> Result<(), HubError> {
        let _hub = self.cache.lock();
        let (result, _) = self.convert(item, index_hint)?;
        self.append_cache(result, notify)
    }

    fn convert(&self, item: &TIn, index_hint: Option<usize>) -> Result<(TOut, usize), HubError> {
        self.provider_cache
            .read(|provider| self.convert_with(provider, item, index_hint))
    }

    fn convert_with(
        &self,
        provider: &[TIn],
        item: &TIn,
        index_hint: Option<usize>,
    ) -> Result<(TOut, usize), HubError> {
        self.cache.read(|cache| {
            self.kernel
                .lock()
                .to_result(item, index_hint, KernelCtx { provider, cache })
        })
    }

    fn rollback_state(&self, timestamp_ns: i64) {
        self.provider_cache.read(|provider| {
            self.cache.read(|cache| {
                self.kernel
                    .lock()
                    .rollback(timestamp_ns, KernelCtx { provider, cache });
            });
        });
    }

    /// Duplicate/overflow bookkeeping; fans the terminal fault out before
    /// returning it to the driving caller.
    fn bookkeep_duplicate(&self, result: &TOut) -> Result<bool, HubError> {
        let checked = {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            cell.check_overflow(result, self.forced_append)
        };

        match checked {
            Err(error) => {
                tracing::error!(hub = %self.name, %error, "overflow fault");
                self.observers.notify_error(&error);
                Err(error)
            }
            Ok(suppress) => Ok(suppress),
        }
    }

    /// Performs the appropriate caching action after analysis: add if
    /// new, ignore if duplicate, rebuild if late arrival.
    fn append_cache(&self, result: TOut, notify: bool) -> Result<(), HubError> {
        let _hub = self.cache.lock();

        if self.bookkeep_duplicate(&result)? {
            return Ok(());
        }

        // consider timeline
        let act = if self.forced_append
            || self.rebuilding.load(Ordering::Relaxed)
            || self.cache.read(|items| {
                items
                    .last()
                    .is_none_or(|last| result.timestamp_ns() > last.timestamp_ns())
            }) {
            Act::Add
        } else {
            Act::Rebuild
        };

        match act {
            Act::Add => self.commit(result, notify),
            Act::Rebuild => self.rebuild_from(result.timestamp_ns()),
        }
    }

    fn commit(&self, item: TOut, notify: bool) -> Result<(), HubError> {
        let _hub = self.cache.lock();

        // evict to the retention bound before appending, so subscriber
        // caches stay position-aligned with this one throughout fan-out
        let pruned_to = {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            cell.prune(self.max_cache_size.saturating_sub(1))
        };
        if let Some(boundary) = pruned_to {
            tracing::debug!(hub = %self.name, boundary, "pruned cache to retention bound");
            self.observers.notify_prune(boundary)?;
        }

        let position = {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            cell.push(item.clone());
            cell.items.len() - 1
        };

        // borrows are released; the hub lock stays held across fan-out
        if notify {
            self.observers.notify_add(&item, position)?;
        }
        Ok(())
    }

    fn handle_completed(&self) {
        self.unsubscribe();
        // cascade teardown through the subtree
        self.end_transmission();
    }

    fn renegotiate_min_cache_size(&self) {
        let negotiated = self.warmup.max(self.observers.max_observer_min());
        let previous = self.min_cache_size.swap(negotiated, Ordering::Relaxed);
        if previous != negotiated {
            self.provider.refresh_min_cache_size();
        }
    }
}

impl<TIn, TOut, K> StreamObservable<TOut> for StreamHub<TIn, TOut, K>
where
    TIn: Series,
    TOut: Series,
    K: HubKernel<TIn, TOut>,
{
    fn subscribe(&self, observer: Arc<dyn StreamObserver<TOut>>) -> SubscriptionId {
        let id = self.observers.subscribe(observer);
        self.renegotiate_min_cache_size();
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.observers.unsubscribe(id);
        if removed {
            self.renegotiate_min_cache_size();
        }
        removed
    }

    fn observer_count(&self) -> usize {
        StreamHub::observer_count(self)
    }

    fn end_transmission(&self) {
        tracing::debug!(hub = %self.name, "ending transmission");
        for observer in self.observers.drain() {
            observer.on_completed();
        }
        self.min_cache_size.store(self.warmup, Ordering::Relaxed);
    }

    fn cache_handle(&self) -> CacheStore<TOut> {
        StreamHub::cache_handle(self)
    }

    fn min_cache_size(&self) -> usize {
        StreamHub::min_cache_size(self)
    }

    fn refresh_min_cache_size(&self) {
        self.renegotiate_min_cache_size();
    }

    fn max_cache_size(&self) -> usize {
        StreamHub::max_cache_size(self)
    }

    fn is_faulted(&self) -> bool {
        StreamHub::is_faulted(self)
    }

    fn label(&self) -> String {
        StreamHub::label(self)
    }
}

impl<TIn, TOut, K> StreamObserver<TIn> for StreamHub<TIn, TOut, K>
where
    TIn: Series,
    TOut: Series,
    K: HubKernel<TIn, TOut>,
{
    fn on_add(&self, item: &TIn, notify: bool, index_hint: Option<usize>) -> Result<(), HubError> {
        self.ingest(item, notify, index_hint)
    }

    fn on_rebuild(&self, from_timestamp_ns: i64) -> Result<(), HubError> {
        self.rebuild_from(from_timestamp_ns)
    }

    fn on_prune(&self, to_timestamp_ns: i64) -> Result<(), HubError> {
        let _hub = self.cache.lock();
        {
            let guard = self.cache.lock();
            let mut cell = guard.borrow_mut();
            cell.drop_through(to_timestamp_ns);
        }
        self.observers.notify_prune(to_timestamp_ns)
    }

    fn on_error(&self, error: &HubError) {
        self.observers.notify_error(error);
    }

    fn on_completed(&self) {
        self.handle_completed();
    }

    fn min_cache_size(&self) -> usize {
        StreamHub::min_cache_size(self)
    }
}

impl<TIn, TOut, K> fmt::Display for StreamHub<TIn, TOut, K>
where
    TIn: Series,
    TOut: Series,
    K: HubKernel<TIn, TOut>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl<TIn, TOut, K> fmt::Debug for StreamHub<TIn, TOut, K>
where
    TIn: Series,
    TOut: Series,
    K: HubKernel<TIn, TOut>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHub")
            .field("name", &self.name)
            .finish()
    }
}

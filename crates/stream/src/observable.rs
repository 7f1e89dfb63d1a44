//! Observable side of a stream hub.

use std::sync::Arc;

use lattice_types::Series;

use crate::cache::CacheStore;
use crate::observer::StreamObserver;

/// Identifies one subscription on one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// A provider of timeline-ordered stream data.
///
/// Implemented by every hub towards its subscribers; subscribers hold the
/// strong reference to their provider, while the provider only keeps weak
/// observer references.
pub trait StreamObservable<T: Series>: Send + Sync {
    /// Registers an observer; returns its unsubscribe token.
    fn subscribe(&self, observer: Arc<dyn StreamObserver<T>>) -> SubscriptionId;

    /// Removes a subscription. Returns `false` when the token is unknown.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Number of currently registered observers.
    fn observer_count(&self) -> usize;

    /// Checks if any observer is registered.
    fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Unsubscribes every observer (cascading teardown) and resets the
    /// retention requirement to this hub's own baseline.
    fn end_transmission(&self);

    /// Shared reference to this hub's cache, for trusted internal readers
    /// (e.g. a downstream hub replaying from its provider).
    fn cache_handle(&self) -> CacheStore<T>;

    /// Largest warm-up requirement among this hub and all subscribers.
    ///
    /// Advisory retention pressure: owners should keep `max_cache_size`
    /// at or above this value to avoid pruning history a downstream hub
    /// still needs for correct recomputation.
    fn min_cache_size(&self) -> usize;

    /// Re-negotiates the retention requirement after subscription changes
    /// and propagates the new value upstream when it moved.
    fn refresh_min_cache_size(&self);

    /// Bound on retained history, inherited from the root provider.
    fn max_cache_size(&self) -> usize;

    /// `true` once an overflow fault tripped and until it is reset.
    fn is_faulted(&self) -> bool;

    /// Short display label, e.g. `"EMA(14)"`.
    fn label(&self) -> String;
}

//! Observer side of a stream hub subscription.

use lattice_types::Series;

use crate::error::HubError;

/// A subscriber to a stream of timeline-ordered records.
///
/// Every hub implements this against its provider's item type. All
/// notifications are delivered synchronously on the caller's stack;
/// recoverable conditions are handled internally and non-recoverable
/// ones are returned as errors to whoever drove the mutation.
pub trait StreamObserver<T: Series>: Send + Sync {
    /// Ingests one new provider record.
    ///
    /// The default hub behavior converts the record through the
    /// indicator's conversion hook and feeds the result to its own cache.
    /// `notify` is disabled during bulk operations such as rebuild.
    ///
    /// # Errors
    /// Propagates overflow faults and invariant violations.
    fn on_add(&self, item: &T, notify: bool, index_hint: Option<usize>) -> Result<(), HubError>;

    /// Rebuilds this node from a point in time after upstream history
    /// changed behind that point.
    ///
    /// # Errors
    /// Propagates overflow faults and invariant violations.
    fn on_rebuild(&self, from_timestamp_ns: i64) -> Result<(), HubError>;

    /// Drops cached results at or before the boundary after upstream
    /// eviction, so no stale reference to evicted history survives.
    ///
    /// # Errors
    /// Propagates faults raised while re-notifying downstream.
    fn on_prune(&self, to_timestamp_ns: i64) -> Result<(), HubError>;

    /// Cascades a terminal provider fault to this node's own subscribers.
    ///
    /// The same error is simultaneously returned, up the driving call
    /// stack, to the caller of the originating mutation.
    fn on_error(&self, error: &HubError);

    /// Provider ended transmission; detach and cascade.
    fn on_completed(&self);

    /// Warm-up requirement negotiated up the subscription chain.
    fn min_cache_size(&self) -> usize;
}

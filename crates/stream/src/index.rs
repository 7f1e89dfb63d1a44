//! Binary-search helpers over timestamp-ordered caches.
//!
//! All lookups are O(log n) with a linear scan only across runs of equal
//! timestamps; rebuild triggers these on the hot path for every late
//! arrival.

use lattice_types::Series;

use crate::error::HubError;

/// Finds the exact cache position of `item` by identity.
///
/// Binary-searches on timestamp, then disambiguates among duplicate
/// timestamps by full value equality, biased towards the latest duplicate
/// (brick-style outputs share timestamps).
///
/// # Errors
/// Returns [`HubError::HistoryMismatch`] when no matching record exists;
/// callers that treat absence as normal use `.ok()`.
pub fn index_of_item<T: Series>(cache: &[T], item: &T) -> Result<usize, HubError> {
    let ts = item.timestamp_ns();
    let start = cache.partition_point(|c| c.timestamp_ns() < ts);
    let end = cache.partition_point(|c| c.timestamp_ns() <= ts);

    (start..end)
        .rev()
        .find(|&i| cache[i] == *item)
        .ok_or(HubError::HistoryMismatch)
}

/// Finds the cache position of a timestamp.
///
/// Only use this when looking for a point in time without a matching
/// record for context; [`index_of_item`] is usually more appropriate.
/// With duplicate timestamps, returns the earliest position.
#[must_use]
pub fn index_of_timestamp<T: Series>(cache: &[T], timestamp_ns: i64) -> Option<usize> {
    let i = cache.partition_point(|c| c.timestamp_ns() < timestamp_ns);
    (i < cache.len() && cache[i].timestamp_ns() == timestamp_ns).then_some(i)
}

/// Finds the first cache position with a timestamp at or after `timestamp_ns`.
///
/// This locates the provider replay starting point during rebuild.
/// Returns `None` when every cached record is older.
#[must_use]
pub fn index_gte<T: Series>(cache: &[T], timestamp_ns: i64) -> Option<usize> {
    let i = cache.partition_point(|c| c.timestamp_ns() < timestamp_ns);
    (i < cache.len()).then_some(i)
}

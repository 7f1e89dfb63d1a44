//! Aggregate view over heterogeneous hubs.

use std::ops::Index;
use std::sync::Arc;

use lattice_types::Series;

use crate::hub::{HubKernel, StreamHub};
use crate::quote_hub::QuoteHub;

/// Type-erased capability of a hub: the narrow marker surface that
/// aggregation code depends on, separate from the strongly-typed per-hub
/// interface.
pub trait HubView: Send + Sync {
    /// Short display label.
    fn label(&self) -> String;

    /// Number of cached results.
    fn results_len(&self) -> usize;

    /// Last reusable scalar, or `NaN` for empty or non-scalar hubs.
    fn last_value(&self) -> f64;

    /// Timestamped scalar snapshot of the cache, `NaN` where a record
    /// has no single representative value.
    fn results_view(&self) -> Vec<(i64, f64)>;

    /// `true` once an overflow fault tripped and until it is reset.
    fn is_faulted(&self) -> bool;
}

impl<TIn, TOut, K> HubView for StreamHub<TIn, TOut, K>
where
    TIn: Series,
    TOut: Series,
    K: HubKernel<TIn, TOut>,
{
    fn label(&self) -> String {
        StreamHub::label(self)
    }

    fn results_len(&self) -> usize {
        self.len()
    }

    fn last_value(&self) -> f64 {
        self.latest()
            .and_then(|r| r.scalar())
            .unwrap_or(f64::NAN)
    }

    fn results_view(&self) -> Vec<(i64, f64)> {
        self.results(|r| {
            r.iter()
                .map(|x| (x.timestamp_ns(), x.scalar().unwrap_or(f64::NAN)))
                .collect()
        })
    }

    fn is_faulted(&self) -> bool {
        StreamHub::is_faulted(self)
    }
}

impl HubView for QuoteHub {
    fn label(&self) -> String {
        QuoteHub::label(self)
    }

    fn results_len(&self) -> usize {
        self.len()
    }

    fn last_value(&self) -> f64 {
        self.latest()
            .and_then(|q| q.scalar())
            .unwrap_or(f64::NAN)
    }

    fn results_view(&self) -> Vec<(i64, f64)> {
        self.results(|r| {
            r.iter()
                .map(|q| (q.timestamp_ns(), q.scalar().unwrap_or(f64::NAN)))
                .collect()
        })
    }

    fn is_faulted(&self) -> bool {
        QuoteHub::is_faulted(self)
    }
}

/// A thin aggregate over multiple heterogeneous hubs for batched
/// result-count and latest-value retrieval. Holds references, not copies.
#[derive(Default)]
pub struct HubCollection {
    hubs: Vec<Arc<dyn HubView>>,
}

impl HubCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        HubCollection { hubs: Vec::new() }
    }

    /// Appends a hub reference.
    pub fn push(&mut self, hub: Arc<dyn HubView>) {
        self.hubs.push(hub);
    }

    /// Number of hubs in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    /// Checks if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }

    /// Hub reference at `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<dyn HubView>> {
        self.hubs.get(index)
    }

    /// Cached result count per hub, in collection order.
    #[must_use]
    pub fn results_len(&self) -> Vec<usize> {
        self.hubs.iter().map(|h| h.results_len()).collect()
    }

    /// Timestamped scalar snapshot per hub, in collection order.
    #[must_use]
    pub fn results(&self) -> Vec<Vec<(i64, f64)>> {
        self.hubs.iter().map(|h| h.results_view()).collect()
    }

    /// Last reusable scalar per hub (`NaN` for empty or non-scalar hubs),
    /// in collection order.
    #[must_use]
    pub fn last_values(&self) -> Vec<f64> {
        self.hubs.iter().map(|h| h.last_value()).collect()
    }

    /// Display labels per hub, in collection order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.hubs.iter().map(|h| h.label()).collect()
    }
}

impl FromIterator<Arc<dyn HubView>> for HubCollection {
    fn from_iter<I: IntoIterator<Item = Arc<dyn HubView>>>(iter: I) -> Self {
        HubCollection {
            hubs: iter.into_iter().collect(),
        }
    }
}

impl Index<usize> for HubCollection {
    type Output = Arc<dyn HubView>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.hubs[index]
    }
}

//! Lattice Stream
//!
//! Incremental streaming computation engine for the Lattice indicator
//! system. A hub graph is a DAG of nodes, each simultaneously a
//! subscriber to one upstream data source and a publisher to zero or
//! more downstream subscribers, each maintaining a timeline-ordered
//! cache of computed results.
//!
//! # Features
//! - Hub core with Act classification (append, duplicate, late-arrival
//!   rebuild) and bounded-cost recovery
//! - Synchronous push fan-out with negotiated minimum retention
//! - Binary-search timeline index utilities
//! - Rolling-window extremum trackers for hook implementations
//! - Type-erased aggregate view over heterogeneous hubs

#![deny(clippy::all)]

pub mod cache;
pub mod collection;
pub mod error;
pub mod hub;
pub mod index;
pub mod observable;
pub mod observer;
pub mod quote_hub;
pub(crate) mod registry;
pub mod rolling;

// Re-export main types
pub use cache::CacheStore;
pub use collection::{HubCollection, HubView};
pub use error::{HubError, OVERFLOW_THRESHOLD};
pub use hub::{Act, HubKernel, KernelCtx, StreamHub};
pub use observable::{StreamObservable, SubscriptionId};
pub use observer::StreamObserver;
pub use quote_hub::{QuoteHub, DEFAULT_MAX_CACHE_SIZE};
pub use rolling::{RollingWindowMax, RollingWindowMin};

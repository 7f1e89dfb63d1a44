use std::sync::Arc;

use lattice_stream::{HubCollection, HubView, QuoteHub};
use lattice_types::Series;

mod common;
use common::{echo_hub, quote_series, total_hub, EchoHub, EchoResult};

// MIN CACHE SIZE NEGOTIATION

#[test]
fn test_min_cache_size_initialized_to_zero() {
    let root = QuoteHub::with_max_cache_size(100).unwrap();
    assert_eq!(root.min_cache_size(), 0);
}

#[test]
fn test_min_cache_size_propagates_from_subscriber() {
    let root = QuoteHub::with_max_cache_size(100).unwrap();
    let echo = echo_hub(&root, 20);

    assert_eq!(echo.min_cache_size(), 20);
    assert_eq!(root.min_cache_size(), 20);
}

#[test]
fn test_min_cache_size_tracks_maximum_of_subscribers() {
    let root = QuoteHub::with_max_cache_size(200).unwrap();
    let _echo10 = echo_hub(&root, 10);
    let echo50 = echo_hub(&root, 50);
    let _echo20 = echo_hub(&root, 20);

    assert_eq!(root.min_cache_size(), 50);

    // re-evaluated once the largest requirement unsubscribes
    echo50.unsubscribe();
    assert_eq!(root.min_cache_size(), 20);
}

#[test]
fn test_min_cache_size_zero_when_all_unsubscribed() {
    let root = QuoteHub::with_max_cache_size(200).unwrap();
    let echo = echo_hub(&root, 20);
    assert_eq!(root.min_cache_size(), 20);

    echo.unsubscribe();
    assert_eq!(root.min_cache_size(), 0);
}

#[test]
fn test_min_cache_size_propagates_through_chain() {
    let root = QuoteHub::new();
    let echo1 = echo_hub(&root, 5);
    assert_eq!(root.min_cache_size(), 5);

    // a deeper requirement flows through intermediate hubs to the root
    let echo2 = echo_hub(&echo1, 12);
    assert_eq!(echo2.min_cache_size(), 12);
    assert_eq!(echo1.min_cache_size(), 12);
    assert_eq!(root.min_cache_size(), 12);

    echo2.unsubscribe();
    assert_eq!(echo1.min_cache_size(), 5);
    assert_eq!(root.min_cache_size(), 5);
}

// HUB COLLECTION

#[test]
fn test_hub_collection_defaults_empty() {
    let hubs = HubCollection::new();
    assert!(hubs.is_empty());
    assert!(hubs.last_values().is_empty());
}

#[test]
fn test_hub_collection_aggregates_mixed_hub_types() {
    let root = QuoteHub::new();
    let echo = echo_hub(&root, 0);
    let (total, _) = total_hub(&root);

    for q in quote_series(4) {
        root.add(q).unwrap();
    }

    let hubs: HubCollection = [
        root.clone() as Arc<dyn HubView>,
        echo.clone() as Arc<dyn HubView>,
        total.clone() as Arc<dyn HubView>,
    ]
    .into_iter()
    .collect();

    assert_eq!(hubs.len(), 3);
    assert_eq!(root.observer_count(), 2);
    assert_eq!(hubs.results_len(), vec![4, 4, 4]);

    // last reusable scalar per hub
    let close = quote_series(4)[3].close;
    let expected_total: f64 = quote_series(4).iter().map(|q| q.close).sum();
    let values = hubs.last_values();
    assert!((values[0] - close).abs() < 1e-12);
    assert!((values[1] - close).abs() < 1e-12);
    assert!((values[2] - expected_total).abs() < 1e-12);

    assert_eq!(hubs[1].label(), "ECHO(0)");
    assert!(!hubs[0].is_faulted());

    // type-erased per-hub snapshots
    let views = hubs.results();
    assert_eq!(views.len(), 3);
    assert_eq!(views[0].len(), 4);
    assert!((views[2][3].1 - expected_total).abs() < 1e-12);
}

#[test]
fn test_hub_collection_empty_hub_reports_nan() {
    let root = QuoteHub::new();
    let mut hubs = HubCollection::new();
    hubs.push(root as Arc<dyn HubView>);

    assert!(hubs.last_values()[0].is_nan());
    assert_eq!(hubs.results_len(), vec![0]);
}

// CHAIN DEPTH SAFETY

/// A linear chain of 500 subscribers fed 10,000 root items, then
/// truncated at the midpoint: completes without stack failure, and every
/// node reports the same item count and tail timestamp.
#[test]
fn test_chain_depth_500_with_midpoint_truncation() {
    // run on a thread with a standard 8 MiB main stack; libtest worker
    // threads default to a smaller stack than production callers get
    std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(chain_depth_500_body)
        .unwrap()
        .join()
        .unwrap();
}

fn chain_depth_500_body() {
    const CHAIN: usize = 500;
    const ITEMS: usize = 10_000;

    let root = QuoteHub::new();
    let first = echo_hub(&root, 0);
    let mut chain: Vec<Arc<EchoHub<EchoResult>>> = Vec::with_capacity(CHAIN - 1);

    let mut tail: Arc<EchoHub<EchoResult>> = echo_hub(&first, 0);
    chain.push(tail.clone());
    for _ in 2..CHAIN {
        tail = echo_hub(&tail, 0);
        chain.push(tail.clone());
    }

    let quotes = quote_series(ITEMS);
    for q in &quotes {
        root.add(*q).unwrap();
    }

    assert_eq!(first.len(), ITEMS);
    for hub in &chain {
        assert_eq!(hub.len(), ITEMS);
    }

    // truncate at the midpoint of the timeline
    let midpoint = quotes[ITEMS / 2].timestamp_ns();
    root.remove_range_from(midpoint, true).unwrap();

    let expected_tail_ts = quotes[ITEMS / 2 - 1].timestamp_ns();
    assert_eq!(root.len(), ITEMS / 2);
    assert_eq!(root.latest().unwrap().timestamp_ns(), expected_tail_ts);

    assert_eq!(first.len(), ITEMS / 2);
    for hub in &chain {
        assert_eq!(hub.len(), ITEMS / 2);
        assert_eq!(hub.latest().unwrap().timestamp_ns, expected_tail_ts);
    }
}

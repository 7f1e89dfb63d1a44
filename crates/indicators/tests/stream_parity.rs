//! Streaming results must match batch reference computations, including
//! after late arrivals, revisions, and deletions.

use std::sync::Arc;

use lattice_indicators::{donchian_hub, ema_hub, sma_hub, DonchianHub, EmaHub, SmaHub};
use lattice_stream::QuoteHub;
use lattice_types::Quote;

const STEP_NS: i64 = 60_000_000_000;

fn sample_quotes(n: usize) -> Vec<Quote> {
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.7).sin() * 2.0;
            Quote {
                timestamp_ns: i as i64 * STEP_NS,
                open: close,
                high: close + (i % 5) as f64 * 0.2,
                low: close - (i % 3) as f64 * 0.2,
                close,
                volume: 100.0,
            }
        })
        .collect()
}

fn sma_reference(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            (i + 1 >= periods).then(|| {
                values[i + 1 - periods..=i].iter().sum::<f64>() / periods as f64
            })
        })
        .collect()
}

fn ema_reference(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    let k = 2.0 / (periods as f64 + 1.0);
    let mut out = vec![None; values.len()];
    let mut prev: Option<f64> = None;

    for i in 0..values.len() {
        if i + 1 < periods {
            continue;
        }
        let ema = match prev {
            Some(p) => k.mul_add(values[i], (1.0 - k) * p),
            None => values[i + 1 - periods..=i].iter().sum::<f64>() / periods as f64,
        };
        out[i] = Some(ema);
        prev = Some(ema);
    }
    out
}

fn donchian_reference(quotes: &[Quote], periods: usize) -> Vec<(Option<f64>, Option<f64>)> {
    (0..quotes.len())
        .map(|i| {
            if i < periods {
                (None, None)
            } else {
                let window = &quotes[i - periods..i];
                let upper = window.iter().map(|q| q.high).fold(f64::MIN, f64::max);
                let lower = window.iter().map(|q| q.low).fold(f64::MAX, f64::min);
                (Some(upper), Some(lower))
            }
        })
        .collect()
}

struct Graph {
    root: Arc<QuoteHub>,
    sma: Arc<SmaHub<Quote>>,
    ema: Arc<EmaHub<Quote>>,
    sma_of_ema: Arc<SmaHub<lattice_indicators::EmaResult>>,
    donchian: Arc<DonchianHub<Quote>>,
}

fn build_graph() -> Graph {
    let root = QuoteHub::new();
    let sma = sma_hub(&root, 3).unwrap();
    let ema = ema_hub(&root, 5).unwrap();
    let sma_of_ema = sma_hub(&ema, 4).unwrap();
    let donchian = donchian_hub(&root, 4).unwrap();
    Graph {
        root,
        sma,
        ema,
        sma_of_ema,
        donchian,
    }
}

fn graph_snapshot(
    graph: &Graph,
) -> (
    Vec<Option<f64>>,
    Vec<Option<f64>>,
    Vec<Option<f64>>,
    Vec<(Option<f64>, Option<f64>)>,
) {
    (
        graph.sma.results(|r| r.iter().map(|x| x.sma).collect()),
        graph.ema.results(|r| r.iter().map(|x| x.ema).collect()),
        graph.sma_of_ema.results(|r| r.iter().map(|x| x.sma).collect()),
        graph
            .donchian
            .results(|r| r.iter().map(|x| (x.upper, x.lower)).collect()),
    )
}

#[test]
fn test_sma_stream_matches_batch_reference() {
    let quotes = sample_quotes(30);
    let root = QuoteHub::new();
    let sma = sma_hub(&root, 5).unwrap();

    root.add_batch(quotes.iter().copied()).unwrap();

    let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
    let expected = sma_reference(&closes, 5);
    let actual: Vec<Option<f64>> = sma.results(|r| r.iter().map(|x| x.sma).collect());

    for (a, e) in actual.iter().zip(&expected) {
        match (a, e) {
            (Some(a), Some(e)) => assert!((a - e).abs() < 1e-10),
            (None, None) => {}
            other => panic!("warm-up mismatch: {other:?}"),
        }
    }
}

#[test]
fn test_ema_stream_matches_batch_reference() {
    let quotes = sample_quotes(40);
    let root = QuoteHub::new();
    let ema = ema_hub(&root, 7).unwrap();

    root.add_batch(quotes.iter().copied()).unwrap();

    let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
    let expected = ema_reference(&closes, 7);
    let actual: Vec<Option<f64>> = ema.results(|r| r.iter().map(|x| x.ema).collect());

    for (a, e) in actual.iter().zip(&expected) {
        match (a, e) {
            (Some(a), Some(e)) => assert!((a - e).abs() < 1e-10),
            (None, None) => {}
            other => panic!("warm-up mismatch: {other:?}"),
        }
    }
}

#[test]
fn test_donchian_stream_matches_naive_scan() {
    let quotes = sample_quotes(30);
    let root = QuoteHub::new();
    let donchian = donchian_hub(&root, 6).unwrap();

    root.add_batch(quotes.iter().copied()).unwrap();

    let expected = donchian_reference(&quotes, 6);
    let actual: Vec<(Option<f64>, Option<f64>)> =
        donchian.results(|r| r.iter().map(|x| (x.upper, x.lower)).collect());

    assert_eq!(actual, expected);
}

#[test]
fn test_late_arrival_equals_full_history_across_graph() {
    let quotes = sample_quotes(30);
    let omitted = quotes[13];

    let live = build_graph();
    for (i, q) in quotes.iter().enumerate() {
        if i != 13 {
            live.root.add(*q).unwrap();
        }
    }
    live.root.insert(omitted).unwrap();

    let fresh = build_graph();
    fresh.root.add_batch(quotes.iter().copied()).unwrap();

    assert_eq!(graph_snapshot(&live), graph_snapshot(&fresh));
}

#[test]
fn test_deletion_equals_reduced_history_across_graph() {
    let quotes = sample_quotes(25);

    let live = build_graph();
    live.root.add_batch(quotes.iter().copied()).unwrap();
    live.root.remove_at(9).unwrap();

    let mut remaining = quotes;
    remaining.remove(9);
    let fresh = build_graph();
    fresh.root.add_batch(remaining.iter().copied()).unwrap();

    assert_eq!(live.root.len(), 24);
    assert_eq!(live.sma.len(), 24);
    assert_eq!(graph_snapshot(&live), graph_snapshot(&fresh));
}

#[test]
fn test_pruned_root_keeps_indicator_tail_consistent() {
    let quotes = sample_quotes(60);
    let root = QuoteHub::with_max_cache_size(40).unwrap();
    let sma = sma_hub(&root, 5).unwrap();

    for q in &quotes {
        root.add(*q).unwrap();
    }

    let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
    let expected = sma_reference(&closes, 5);

    assert_eq!(sma.len(), 40);
    let actual: Vec<Option<f64>> = sma.results(|r| r.iter().map(|x| x.sma).collect());
    for (a, e) in actual.iter().zip(&expected[20..]) {
        match (a, e) {
            (Some(a), Some(e)) => assert!((a - e).abs() < 1e-10),
            (None, None) => {}
            other => panic!("tail mismatch: {other:?}"),
        }
    }
}

#[test]
fn test_indicator_warmup_feeds_retention_negotiation() {
    let root = QuoteHub::with_max_cache_size(200).unwrap();
    assert_eq!(root.min_cache_size(), 0);

    let sma = sma_hub(&root, 20).unwrap();
    assert_eq!(sma.min_cache_size(), 20);
    assert_eq!(root.min_cache_size(), 20);

    let _ema = ema_hub(&root, 50).unwrap();
    assert_eq!(root.min_cache_size(), 50);
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lattice_stream::{index, HubError, HubKernel, KernelCtx, StreamHub, StreamObservable};
use lattice_types::{Quote, Reusable, Series};

pub const STEP_NS: i64 = 60_000_000_000; // one minute

pub fn quote(timestamp_ns: i64, close: f64) -> Quote {
    Quote {
        timestamp_ns,
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 100.0,
    }
}

/// `n` one-minute quotes with drifting closes.
pub fn quote_series(n: usize) -> Vec<Quote> {
    (0..n)
        .map(|i| quote(i as i64 * STEP_NS, 100.0 + (i as f64) * 0.25))
        .collect()
}

/// Pass-through value record used by engine-level tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoResult {
    pub timestamp_ns: i64,
    pub value: f64,
}

impl Series for EchoResult {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn scalar(&self) -> Option<f64> {
        Some(self.value)
    }
}

impl Reusable for EchoResult {
    fn value(&self) -> f64 {
        self.value
    }
}

/// Copies the provider value through unchanged; configurable warm-up so
/// retention negotiation can be exercised without a real indicator.
pub struct EchoKernel {
    pub warmup: usize,
}

impl<TIn: Reusable> HubKernel<TIn, EchoResult> for EchoKernel {
    fn label(&self) -> String {
        format!("ECHO({})", self.warmup)
    }

    fn warmup_periods(&self) -> usize {
        self.warmup
    }

    fn to_result(
        &mut self,
        item: &TIn,
        index_hint: Option<usize>,
        ctx: KernelCtx<'_, TIn, EchoResult>,
    ) -> Result<(EchoResult, usize), HubError> {
        let i = match index_hint {
            Some(i) => i,
            None => index::index_of_item(ctx.provider, item)?,
        };
        Ok((
            EchoResult {
                timestamp_ns: item.timestamp_ns(),
                value: item.value(),
            },
            i,
        ))
    }
}

pub type EchoHub<TIn> = StreamHub<TIn, EchoResult, EchoKernel>;

pub fn echo_hub<TIn, P>(provider: &Arc<P>, warmup: usize) -> Arc<EchoHub<TIn>>
where
    TIn: Reusable,
    P: StreamObservable<TIn> + 'static,
{
    StreamHub::create(provider, EchoKernel { warmup }).expect("echo hub creation")
}

/// Running total of provider values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalResult {
    pub timestamp_ns: i64,
    pub total: f64,
}

impl Series for TotalResult {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn scalar(&self) -> Option<f64> {
        Some(self.total)
    }
}

impl Reusable for TotalResult {
    fn value(&self) -> f64 {
        self.total
    }
}

/// Kernel with forward-only running state (a running sum): the state must
/// be rewound through the rollback hook whenever history is discarded.
/// Rollback invocations are counted for assertions.
pub struct CumulativeKernel {
    running: f64,
    pub rollbacks: Arc<AtomicUsize>,
}

impl CumulativeKernel {
    pub fn new() -> Self {
        CumulativeKernel {
            running: 0.0,
            rollbacks: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl<TIn: Reusable> HubKernel<TIn, TotalResult> for CumulativeKernel {
    fn label(&self) -> String {
        "TOTAL".to_string()
    }

    fn to_result(
        &mut self,
        item: &TIn,
        index_hint: Option<usize>,
        ctx: KernelCtx<'_, TIn, TotalResult>,
    ) -> Result<(TotalResult, usize), HubError> {
        let i = match index_hint {
            Some(i) => i,
            None => index::index_of_item(ctx.provider, item)?,
        };

        // backfill from the cached prior when an out-of-order edit landed
        // before this position (duplicate conversions must stay idempotent)
        let prior = if i > 0 {
            ctx.cache.get(i - 1).map_or(0.0, |r| r.total)
        } else {
            0.0
        };
        self.running = prior + item.value();

        Ok((
            TotalResult {
                timestamp_ns: item.timestamp_ns(),
                total: self.running,
            },
            i,
        ))
    }

    fn rollback(&mut self, timestamp_ns: i64, ctx: KernelCtx<'_, TIn, TotalResult>) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        self.running = match index::index_gte(ctx.provider, timestamp_ns) {
            Some(0) => 0.0,
            Some(i) => ctx.cache.get(i - 1).map_or(0.0, |r| r.total),
            None => ctx.cache.last().map_or(0.0, |r| r.total),
        };
    }
}

pub type TotalHub<TIn> = StreamHub<TIn, TotalResult, CumulativeKernel>;

pub fn total_hub<TIn, P>(provider: &Arc<P>) -> (Arc<TotalHub<TIn>>, Arc<AtomicUsize>)
where
    TIn: Reusable,
    P: StreamObservable<TIn> + 'static,
{
    let kernel = CumulativeKernel::new();
    let rollbacks = kernel.rollbacks.clone();
    let hub = StreamHub::create(provider, kernel).expect("total hub creation");
    (hub, rollbacks)
}

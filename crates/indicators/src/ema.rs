//! Exponential Moving Average streaming hub.

use std::sync::Arc;

use lattice_stream::{index, HubError, HubKernel, KernelCtx, StreamHub, StreamObservable};
use lattice_types::{Reusable, Series};

use crate::error::IndicatorError;

/// One EMA output record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaResult {
    /// Unix epoch nanoseconds UTC, inherited from the source record.
    pub timestamp_ns: i64,
    /// Smoothed value; `None` during warm-up.
    pub ema: Option<f64>,
}

impl Series for EmaResult {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn scalar(&self) -> Option<f64> {
        self.ema
    }
}

impl Reusable for EmaResult {
    fn value(&self) -> f64 {
        self.ema.unwrap_or(f64::NAN)
    }
}

/// Conversion hook with forward-only running state: the previous smoothed
/// value carries across increments and must be rewound when history at or
/// after a point in time is discarded.
pub struct EmaKernel {
    periods: usize,
    k: f64,
    last_ema: f64,
}

impl EmaKernel {
    /// Creates the kernel after validating parameters.
    ///
    /// # Errors
    /// Returns [`IndicatorError::InvalidParams`] when `periods` is zero.
    pub fn new(periods: usize) -> Result<Self, IndicatorError> {
        if periods == 0 {
            return Err(IndicatorError::invalid_params(
                "EMA lookback periods must be greater than 0",
            ));
        }
        Ok(EmaKernel {
            periods,
            k: 2.0 / (periods as f64 + 1.0),
            last_ema: f64::NAN,
        })
    }

    fn increment(&mut self, value: f64) -> f64 {
        self.last_ema = self.k.mul_add(value, (1.0 - self.k) * self.last_ema);
        self.last_ema
    }

    fn initialize<TIn: Reusable>(&mut self, provider: &[TIn], i: usize) -> f64 {
        let window = &provider[i + 1 - self.periods..=i];
        let sum: f64 = window.iter().map(Reusable::value).sum();
        self.last_ema = sum / self.periods as f64;
        self.last_ema
    }
}

impl<TIn: Reusable> HubKernel<TIn, EmaResult> for EmaKernel {
    fn label(&self) -> String {
        format!("EMA({})", self.periods)
    }

    fn warmup_periods(&self) -> usize {
        self.periods
    }

    fn to_result(
        &mut self,
        item: &TIn,
        index_hint: Option<usize>,
        ctx: KernelCtx<'_, TIn, EmaResult>,
    ) -> Result<(EmaResult, usize), HubError> {
        let i = match index_hint {
            Some(i) => i,
            None => index::index_of_item(ctx.provider, item)?,
        };

        let ema = if i + 1 < self.periods {
            // warmup periods are never calculable
            None
        } else {
            let prior = (i > 0)
                .then(|| ctx.cache.get(i - 1).and_then(|r| r.ema))
                .flatten();

            match prior {
                Some(prev) => {
                    // if an out-of-order edit landed before this position,
                    // backfill the running state from the cached prior
                    if !self.last_ema.is_finite() || prev != self.last_ema {
                        self.last_ema = prev;
                    }
                    Some(self.increment(item.value()))
                }
                // re/initialize as SMA
                None => Some(self.initialize(ctx.provider, i)),
            }
            // chained inputs can be NaN inside their own warm-up; those
            // outputs stay empty until the window is fully calculable
            .filter(|v| v.is_finite())
        };

        Ok((
            EmaResult {
                timestamp_ns: item.timestamp_ns(),
                ema,
            },
            i,
        ))
    }

    fn rollback(&mut self, timestamp_ns: i64, ctx: KernelCtx<'_, TIn, EmaResult>) {
        let position = index::index_gte(ctx.provider, timestamp_ns);
        self.last_ema = match position {
            Some(i) if i > self.periods => ctx
                .cache
                .get(i - 1)
                .and_then(|r| r.ema)
                .unwrap_or(f64::NAN),
            _ => f64::NAN,
        };
    }
}

/// Streaming EMA hub over any reusable provider.
pub type EmaHub<TIn> = StreamHub<TIn, EmaResult, EmaKernel>;

/// Creates an EMA hub subscribed to `provider`.
///
/// # Errors
/// Returns [`IndicatorError::InvalidParams`] for a zero lookback and
/// propagates engine faults raised during the initial rebuild.
pub fn ema_hub<TIn, P>(provider: &Arc<P>, periods: usize) -> Result<Arc<EmaHub<TIn>>, IndicatorError>
where
    TIn: Reusable,
    P: StreamObservable<TIn> + 'static,
{
    let kernel = EmaKernel::new(periods)?;
    Ok(StreamHub::create(provider, kernel)?)
}

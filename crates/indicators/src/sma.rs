//! Simple Moving Average streaming hub.

use std::sync::Arc;

use lattice_stream::{index, HubError, HubKernel, KernelCtx, StreamHub, StreamObservable};
use lattice_types::{Reusable, Series};

use crate::error::IndicatorError;

/// One SMA output record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmaResult {
    /// Unix epoch nanoseconds UTC, inherited from the source record.
    pub timestamp_ns: i64,
    /// Windowed mean; `None` during warm-up.
    pub sma: Option<f64>,
}

impl Series for SmaResult {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn scalar(&self) -> Option<f64> {
        self.sma
    }
}

impl Reusable for SmaResult {
    fn value(&self) -> f64 {
        self.sma.unwrap_or(f64::NAN)
    }
}

/// Conversion hook: windowed mean over the provider cache. Stateless, so
/// no rollback is needed; truncating the output is sufficient.
pub struct SmaKernel {
    periods: usize,
}

impl SmaKernel {
    /// Creates the kernel after validating parameters.
    ///
    /// # Errors
    /// Returns [`IndicatorError::InvalidParams`] when `periods` is zero.
    pub fn new(periods: usize) -> Result<Self, IndicatorError> {
        if periods == 0 {
            return Err(IndicatorError::invalid_params(
                "SMA lookback periods must be greater than 0",
            ));
        }
        Ok(SmaKernel { periods })
    }
}

impl<TIn: Reusable> HubKernel<TIn, SmaResult> for SmaKernel {
    fn label(&self) -> String {
        format!("SMA({})", self.periods)
    }

    fn warmup_periods(&self) -> usize {
        self.periods
    }

    fn to_result(
        &mut self,
        item: &TIn,
        index_hint: Option<usize>,
        ctx: KernelCtx<'_, TIn, SmaResult>,
    ) -> Result<(SmaResult, usize), HubError> {
        let i = match index_hint {
            Some(i) => i,
            None => index::index_of_item(ctx.provider, item)?,
        };

        let sma = if i + 1 >= self.periods {
            let window = &ctx.provider[i + 1 - self.periods..=i];
            let sum: f64 = window.iter().map(Reusable::value).sum();
            // chained inputs can be NaN inside their own warm-up
            Some(sum / self.periods as f64).filter(|v| v.is_finite())
        } else {
            // warmup periods are never calculable
            None
        };

        Ok((
            SmaResult {
                timestamp_ns: item.timestamp_ns(),
                sma,
            },
            i,
        ))
    }
}

/// Streaming SMA hub over any reusable provider.
pub type SmaHub<TIn> = StreamHub<TIn, SmaResult, SmaKernel>;

/// Creates an SMA hub subscribed to `provider`.
///
/// # Errors
/// Returns [`IndicatorError::InvalidParams`] for a zero lookback and
/// propagates engine faults raised during the initial rebuild.
pub fn sma_hub<TIn, P>(provider: &Arc<P>, periods: usize) -> Result<Arc<SmaHub<TIn>>, IndicatorError>
where
    TIn: Reusable,
    P: StreamObservable<TIn> + 'static,
{
    let kernel = SmaKernel::new(periods)?;
    Ok(StreamHub::create(provider, kernel)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_stream::QuoteHub;
    use lattice_types::Quote;

    fn quote(timestamp_ns: i64, close: f64) -> Quote {
        Quote {
            timestamp_ns,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn test_sma_rejects_zero_periods() {
        let quotes = QuoteHub::new();
        let err = sma_hub(&quotes, 0).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidParams(_)));
    }

    #[test]
    fn test_sma_basic() {
        let quotes = QuoteHub::new();
        let sma = sma_hub(&quotes, 3).unwrap();

        for (i, close) in [1.0, 2.0, 3.0, 4.0, 5.0].into_iter().enumerate() {
            quotes.add(quote(i as i64, close)).unwrap();
        }

        sma.results(|r| {
            assert_eq!(r.len(), 5);
            assert_eq!(r[0].sma, None);
            assert_eq!(r[1].sma, None);
            assert!((r[2].sma.unwrap() - 2.0).abs() < 1e-10);
            assert!((r[3].sma.unwrap() - 3.0).abs() < 1e-10);
            assert!((r[4].sma.unwrap() - 4.0).abs() < 1e-10);
        });
    }

    #[test]
    fn test_sma_initial_rebuild_from_existing_history() {
        let quotes = QuoteHub::new();
        for i in 0..5 {
            quotes.add(quote(i, f64::from(i as i32) + 1.0)).unwrap();
        }

        // hub created after the fact derives the same results
        let sma = sma_hub(&quotes, 3).unwrap();
        sma.results(|r| {
            assert_eq!(r.len(), 5);
            assert!((r[4].sma.unwrap() - 4.0).abs() < 1e-10);
        });
    }

    #[test]
    fn test_sma_label() {
        let quotes = QuoteHub::new();
        let sma = sma_hub(&quotes, 20).unwrap();
        assert_eq!(sma.label(), "SMA(20)");
    }
}

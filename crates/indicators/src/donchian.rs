//! Donchian channel streaming hub.

use std::sync::Arc;

use lattice_stream::{
    index, HubError, HubKernel, KernelCtx, RollingWindowMax, RollingWindowMin, StreamHub,
    StreamObservable,
};
use lattice_types::{QuoteSeries, Series};

use crate::error::IndicatorError;

/// One Donchian channel output record. Multi-band: not reusable as a
/// chain input and reports no scalar to aggregate views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DonchianResult {
    /// Unix epoch nanoseconds UTC, inherited from the source bar.
    pub timestamp_ns: i64,
    /// Highest high of the lookback window; `None` during warm-up.
    pub upper: Option<f64>,
    /// Lowest low of the lookback window; `None` during warm-up.
    pub lower: Option<f64>,
    /// Midline between the bands; `None` during warm-up.
    pub center: Option<f64>,
}

impl Series for DonchianResult {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }
}

/// Conversion hook over full bars, tracking windowed extrema with the
/// rolling max/min trackers as running state.
///
/// The trackers are positioned for one provider index at a time; any
/// out-of-order request (late arrival, replay, insert) repositions them
/// from the provider cache before computing.
pub struct DonchianKernel {
    periods: usize,
    highs: RollingWindowMax,
    lows: RollingWindowMin,
    /// Provider index the trackers are currently positioned for.
    next_index: usize,
}

impl DonchianKernel {
    /// Creates the kernel after validating parameters.
    ///
    /// # Errors
    /// Returns [`IndicatorError::InvalidParams`] when `periods` is zero.
    pub fn new(periods: usize) -> Result<Self, IndicatorError> {
        if periods == 0 {
            return Err(IndicatorError::invalid_params(
                "Donchian lookback periods must be greater than 0",
            ));
        }
        Ok(DonchianKernel {
            periods,
            highs: RollingWindowMax::new(periods),
            lows: RollingWindowMin::new(periods),
            next_index: 0,
        })
    }

    /// Rebuilds both trackers so they hold the lookback window preceding
    /// provider index `i`.
    fn reposition<TIn: QuoteSeries>(&mut self, provider: &[TIn], i: usize) -> Result<(), HubError> {
        self.highs.clear();
        self.lows.clear();

        let start = i.saturating_sub(self.periods);
        for bar in &provider[start..i] {
            self.highs.push(bar.high())?;
            self.lows.push(bar.low());
        }
        self.next_index = i;
        Ok(())
    }
}

impl<TIn: QuoteSeries> HubKernel<TIn, DonchianResult> for DonchianKernel {
    fn label(&self) -> String {
        format!("DONCHIAN({})", self.periods)
    }

    fn warmup_periods(&self) -> usize {
        self.periods
    }

    fn to_result(
        &mut self,
        item: &TIn,
        index_hint: Option<usize>,
        ctx: KernelCtx<'_, TIn, DonchianResult>,
    ) -> Result<(DonchianResult, usize), HubError> {
        let i = match index_hint {
            Some(i) => i,
            None => index::index_of_item(ctx.provider, item)?,
        };

        if i != self.next_index {
            self.reposition(ctx.provider, i)?;
        }

        // bands cover the `periods` bars before the current one
        let (upper, lower) = if i >= self.periods {
            (self.highs.max(), self.lows.min())
        } else {
            (None, None)
        };
        let center = upper.zip(lower).map(|(u, l)| (u + l) / 2.0);

        // advance the window over the current bar for the next call
        self.highs.push(item.high())?;
        self.lows.push(item.low());
        self.next_index = i + 1;

        Ok((
            DonchianResult {
                timestamp_ns: item.timestamp_ns(),
                upper,
                lower,
                center,
            },
            i,
        ))
    }

    fn rollback(&mut self, timestamp_ns: i64, ctx: KernelCtx<'_, TIn, DonchianResult>) {
        let position =
            index::index_gte(ctx.provider, timestamp_ns).unwrap_or(ctx.provider.len());
        if let Err(error) = self.reposition(ctx.provider, position) {
            // only reachable with NaN highs in source bars
            tracing::warn!(%error, "donchian tracker rollback skipped");
        }
    }
}

/// Streaming Donchian channel hub over any full-bar provider.
pub type DonchianHub<TIn> = StreamHub<TIn, DonchianResult, DonchianKernel>;

/// Creates a Donchian channel hub subscribed to `provider`.
///
/// # Errors
/// Returns [`IndicatorError::InvalidParams`] for a zero lookback and
/// propagates engine faults raised during the initial rebuild.
pub fn donchian_hub<TIn, P>(
    provider: &Arc<P>,
    periods: usize,
) -> Result<Arc<DonchianHub<TIn>>, IndicatorError>
where
    TIn: QuoteSeries,
    P: StreamObservable<TIn> + 'static,
{
    let kernel = DonchianKernel::new(periods)?;
    Ok(StreamHub::create(provider, kernel)?)
}

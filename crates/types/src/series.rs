//! Series traits for timeline-ordered cache records.

/// Sentinel for "before all history" (rebuild-from-origin boundary).
pub const TIMESTAMP_MIN: i64 = i64::MIN;

/// A cacheable time-series record.
///
/// Two records are the same record iff their timestamps and all fields
/// match; the timestamp alone is not a unique key (duplicate timestamps
/// are permitted, e.g. brick-based outputs).
pub trait Series: Clone + PartialEq + Send + Sync + 'static {
    /// Unix epoch nanoseconds UTC of the record.
    fn timestamp_ns(&self) -> i64;

    /// Last reusable scalar for type-erased aggregate views.
    ///
    /// Returns `None` when the type has no single representative value
    /// (e.g. multi-band results) or the value is not yet calculable.
    fn scalar(&self) -> Option<f64> {
        None
    }
}

/// A series record with a single chainable value.
///
/// Chained hubs (an EMA of an EMA, an SMA of quote closes) consume any
/// `Reusable` input. The value is `f64::NAN` during warm-up periods.
pub trait Reusable: Series {
    /// Chainable scalar value.
    fn value(&self) -> f64;
}

/// A series record carrying a full OHLCV bar.
///
/// Needed by hubs that look at more than one price component
/// (e.g. channel indicators reading highs and lows).
pub trait QuoteSeries: Series {
    /// Open price.
    fn open(&self) -> f64;
    /// High price.
    fn high(&self) -> f64;
    /// Low price.
    fn low(&self) -> f64;
    /// Close price.
    fn close(&self) -> f64;
    /// Volume.
    fn volume(&self) -> f64;
}

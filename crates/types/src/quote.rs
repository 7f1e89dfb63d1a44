use crate::series::{QuoteSeries, Reusable, Series};

/// Repräsentiert einen OHLCV-Quote-Balken.
/// `timestamp_ns` ist die **Open-Time** (nicht Close-Time)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quote {
    /// Unix epoch nanoseconds UTC (Open-Time)
    pub timestamp_ns: i64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

impl Series for Quote {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn scalar(&self) -> Option<f64> {
        Some(self.close)
    }
}

impl Reusable for Quote {
    fn value(&self) -> f64 {
        self.close
    }
}

impl QuoteSeries for Quote {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

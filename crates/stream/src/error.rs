//! Stream hub error types.

use thiserror::Error;

/// Consecutive identical duplicates tolerated before a hub faults.
pub const OVERFLOW_THRESHOLD: u8 = 100;

/// Errors that can occur during stream hub operations.
#[derive(Debug, Clone, Error)]
pub enum HubError {
    /// A repeated stream update exceeded the overflow threshold.
    ///
    /// Terminal: the provider is considered dead until
    /// [`reset_fault`](crate::hub::StreamHub::reset_fault) is called.
    #[error(
        "a repeated stream update exceeded the {threshold} attempt threshold; \
         check and remove circular chains or check your stream provider (provider terminated)",
        threshold = OVERFLOW_THRESHOLD
    )]
    Overflow,

    /// Indexed cache access beyond bounds
    #[error("cache index {index} is out of range (cache length {len})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Cache length at the time of access.
        len: usize,
    },

    /// Configured retention is smaller than the warm-up requirement
    #[error("max cache size {max} is below the minimum warm-up requirement {min}")]
    InsufficientRetention {
        /// Configured maximum cache size.
        max: usize,
        /// Required minimum cache size.
        min: usize,
    },

    /// An exact-match search failed to find a record that should exist
    #[error("matching source history not found")]
    HistoryMismatch,

    /// Not-a-number input where a ranked value is required
    #[error("not-a-number values cannot be ranked in a max window")]
    NanValue,
}

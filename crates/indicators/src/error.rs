//! Indicator error types.

use lattice_stream::HubError;
use thiserror::Error;

/// Errors that can occur while constructing or running indicator hubs.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// Invalid parameters for the indicator
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Engine-level fault surfaced through an indicator hub
    #[error(transparent)]
    Hub(#[from] HubError),
}

impl IndicatorError {
    /// Creates an `InvalidParams` error with a message.
    #[must_use]
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        IndicatorError::InvalidParams(msg.into())
    }
}

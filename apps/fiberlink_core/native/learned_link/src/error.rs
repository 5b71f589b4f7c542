//! Link error types

use fiber_channel::ChannelError;
use thiserror::Error;

/// Result type for training and evaluation
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors that abandon a training run
#[derive(Error, Debug)]
pub enum LinkError {
    /// NaN/Inf, log(0) or a zero-range rescale
    #[error("Numeric instability: {0}")]
    NumericInstability(String),

    /// Batch or parameter dimensions do not line up
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Rejected before training starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LinkError {
    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        LinkError::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }
}

//! Channel error types

use thiserror::Error;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors raised while shaping or propagating a symbol batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Batch does not have the (real, imaginary) row layout
    #[error("Batch shape mismatch: expected {expected} rows, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Channel or power parameter out of range
    #[error("Invalid channel parameter: {0}")]
    InvalidParameter(String),

    /// NaN/Inf or a zero-energy batch
    #[error("Numeric instability: {0}")]
    NumericInstability(String),
}

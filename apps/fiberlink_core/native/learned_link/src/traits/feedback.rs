//! FeedbackLink trait - Receiver → transmitter reward path
//!
//! Carries the preprocessed per-sample losses back to the transmitter.
//! Knows nothing about how the losses were produced.

use crate::error::LinkResult;

/// Reward feedback channel
///
/// Implementations decide how much precision survives the trip. Input and
/// output values both lie in [0, 1].
pub trait FeedbackLink: Send + Sync {
    /// Bits spent per reward sample (0 for an ideal link)
    fn bits_per_sample(&self) -> u32;

    /// Deliver a reward batch to the transmitter side
    fn transmit(&self, rewards: &[f64]) -> LinkResult<Vec<f64>>;
}

//! Ideal feedback: rewards arrive with full precision

use crate::error::LinkResult;
use crate::traits::FeedbackLink;

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFeedback;

impl FeedbackLink for DirectFeedback {
    fn bits_per_sample(&self) -> u32 {
        0
    }

    fn transmit(&self, rewards: &[f64]) -> LinkResult<Vec<f64>> {
        Ok(rewards.to_vec())
    }
}

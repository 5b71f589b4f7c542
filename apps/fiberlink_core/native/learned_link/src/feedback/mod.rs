//! Feedback link implementations

mod direct;
mod quantized;

pub use direct::DirectFeedback;
pub use quantized::QuantizedFeedback;

use crate::error::LinkResult;
use crate::traits::FeedbackLink;

/// Pick the feedback link for a bit budget; 0 means unquantized
pub fn feedback_for_bits(num_bits: u32) -> LinkResult<Box<dyn FeedbackLink>> {
    if num_bits == 0 {
        Ok(Box::new(DirectFeedback))
    } else {
        Ok(Box::new(QuantizedFeedback::new(num_bits)?))
    }
}

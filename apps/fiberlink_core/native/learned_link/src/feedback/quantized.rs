//! Rate-limited feedback through the uniform codec

use crate::codec::QuantizationCodec;
use crate::error::{LinkError, LinkResult};
use crate::traits::FeedbackLink;

/// Each reward is sent as a `b`-bit index and reconstructed at the
/// interval midpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedFeedback {
    codec: QuantizationCodec,
}

impl QuantizedFeedback {
    pub fn new(num_bits: u32) -> LinkResult<Self> {
        Ok(Self {
            codec: QuantizationCodec::new(num_bits)?,
        })
    }

    pub fn codec(&self) -> &QuantizationCodec {
        &self.codec
    }
}

impl FeedbackLink for QuantizedFeedback {
    fn bits_per_sample(&self) -> u32 {
        self.codec.num_bits()
    }

    fn transmit(&self, rewards: &[f64]) -> LinkResult<Vec<f64>> {
        if let Some(bad) = rewards.iter().find(|r| !r.is_finite()) {
            return Err(LinkError::NumericInstability(format!(
                "cannot quantize reward {}",
                bad
            )));
        }
        self.codec.round_trip(rewards)
    }
}

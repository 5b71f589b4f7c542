//! Transmitter network: one-hot message → 2-D symbol

use fiber_channel::{normalize, normalize_backward, Normalized};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{ForwardTrace, Gradients, NetworkParams, OutputActivation};
use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};

/// Transmitter weights: `M → NN_T → … → 2`, linear output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransmitterParams(NetworkParams);

/// A transmitter forward pass followed by batch normalization
#[derive(Debug, Clone)]
pub struct TransmitterForward {
    trace: ForwardTrace,
    normalized: Normalized,
}

impl TransmitterForward {
    /// Unit-average-energy symbols, `2 × N`
    pub fn symbols(&self) -> &Array2<f64> {
        &self.normalized.symbols
    }
}

impl TransmitterParams {
    pub fn new(config: &LinkConfig) -> LinkResult<Self> {
        NetworkParams::xavier(&config.transmitter_widths(), config.weight_seed).map(Self)
    }

    pub fn from_network(network: NetworkParams, m: usize) -> LinkResult<Self> {
        if network.input_width() != m {
            return Err(LinkError::shape("transmitter input width", m, network.input_width()));
        }
        if network.output_width() != 2 {
            return Err(LinkError::shape("transmitter output width", 2, network.output_width()));
        }
        Ok(Self(network))
    }

    pub fn network(&self) -> &NetworkParams {
        &self.0
    }

    pub fn network_mut(&mut self) -> &mut NetworkParams {
        &mut self.0
    }

    /// Raw `2 × N` symbols for an `M × N` one-hot batch
    pub fn encode(&self, messages: ArrayView2<f64>) -> LinkResult<Array2<f64>> {
        Ok(self.0.forward(messages, OutputActivation::Linear)?.output)
    }

    /// Encode and normalize, keeping what the backward pass needs
    pub fn encode_normalized(&self, messages: ArrayView2<f64>) -> LinkResult<TransmitterForward> {
        let trace = self.0.forward(messages, OutputActivation::Linear)?;
        let normalized = normalize(trace.output.view())?;
        Ok(TransmitterForward { trace, normalized })
    }

    /// Gradients from `∂J/∂(normalized symbols)`.
    ///
    /// The gradient passes through the batch normalization and the network
    /// only; nothing downstream of the normalized symbols is involved.
    pub fn gradients(
        &self,
        forward: &TransmitterForward,
        symbol_grad: ArrayView2<f64>,
    ) -> LinkResult<Gradients> {
        if symbol_grad.dim() != forward.symbols().dim() {
            return Err(LinkError::shape(
                "symbol gradient columns",
                forward.symbols().ncols(),
                symbol_grad.ncols(),
            ));
        }
        let raw_grad = normalize_backward(symbol_grad, &forward.normalized);
        self.0.backward(&forward.trace, raw_grad)
    }
}

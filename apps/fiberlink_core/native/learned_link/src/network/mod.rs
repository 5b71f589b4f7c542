//! Feed-forward networks with explicit back-propagation
//!
//! Both networks share one shape: ReLU hidden layers followed by an output
//! layer whose activation depends on the role (linear for the transmitter,
//! softmax for the receiver). Forward passes keep a [`ForwardTrace`] so the
//! caller can run [`NetworkParams::backward`] eagerly on the same batch.

mod dense;
mod receiver;
mod transmitter;

pub use dense::DenseLayer;
pub use receiver::{cross_entropy, cross_entropy_logit_grad, softmax_columns, ReceiverParams};
pub use transmitter::{TransmitterForward, TransmitterParams};

use ndarray::{Array2, ArrayView2, Axis, Zip};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};

/// Output-layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputActivation {
    Linear,
    Softmax,
}

/// Ordered (weight, bias) pairs forming a strict width chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNetwork")]
pub struct NetworkParams {
    pub layers: Vec<DenseLayer>,
}

/// Deserialized layers before the width chain is checked
#[derive(Deserialize)]
struct RawNetwork {
    layers: Vec<DenseLayer>,
}

impl TryFrom<RawNetwork> for NetworkParams {
    type Error = LinkError;

    fn try_from(raw: RawNetwork) -> LinkResult<Self> {
        Self::from_layers(raw.layers)
    }
}

/// Gradients have the same layout as the parameters they belong to
pub type Gradients = NetworkParams;

/// Intermediate values of one forward pass
#[derive(Debug, Clone)]
pub struct ForwardTrace {
    /// Input to each layer
    inputs: Vec<Array2<f64>>,
    /// `W·a + b` of each layer
    pre_activations: Vec<Array2<f64>>,
    /// Activated network output
    pub output: Array2<f64>,
}

impl ForwardTrace {
    /// Pre-activation of the last layer (logits for the receiver)
    pub fn logits(&self) -> &Array2<f64> {
        // A network always has at least one layer
        &self.pre_activations[self.pre_activations.len() - 1]
    }
}

impl NetworkParams {
    /// Xavier-initialised network for `widths = [in, hidden…, out]`
    pub fn xavier(widths: &[usize], seed: u64) -> LinkResult<Self> {
        if widths.len() < 2 || widths.iter().any(|&w| w == 0) {
            return Err(LinkError::Configuration(format!(
                "invalid layer widths {:?}",
                widths
            )));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let layers = widths
            .windows(2)
            .map(|pair| DenseLayer::xavier(pair[0], pair[1], &mut rng))
            .collect();
        Ok(Self { layers })
    }

    /// Build from explicit layers, checking the width chain
    pub fn from_layers(layers: Vec<DenseLayer>) -> LinkResult<Self> {
        if layers.is_empty() {
            return Err(LinkError::Configuration("network has no layers".into()));
        }
        for layer in &layers {
            if layer.bias.dim() != (layer.outputs(), 1) {
                return Err(LinkError::shape("bias rows", layer.outputs(), layer.bias.nrows()));
            }
        }
        for pair in layers.windows(2) {
            if pair[0].outputs() != pair[1].inputs() {
                return Err(LinkError::shape(
                    "layer width chain",
                    pair[0].outputs(),
                    pair[1].inputs(),
                ));
            }
        }
        Ok(Self { layers })
    }

    pub fn zeros_like(&self) -> Self {
        Self {
            layers: self
                .layers
                .iter()
                .map(|l| DenseLayer::zeros(l.inputs(), l.outputs()))
                .collect(),
        }
    }

    /// Zero for a network without layers
    pub fn input_width(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::inputs)
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::outputs)
    }

    /// `[in, hidden…, out]`
    pub fn widths(&self) -> Vec<usize> {
        let mut widths = vec![self.input_width()];
        widths.extend(self.layers.iter().map(DenseLayer::outputs));
        widths
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(DenseLayer::parameter_count).sum()
    }

    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(DenseLayer::is_finite)
    }

    /// Same layer count and matrix shapes
    pub fn same_shape(&self, other: &NetworkParams) -> bool {
        self.layers.len() == other.layers.len()
            && self.layers.iter().zip(&other.layers).all(|(a, b)| {
                a.weight.dim() == b.weight.dim() && a.bias.dim() == b.bias.dim()
            })
    }

    fn last_layer(&self) -> LinkResult<usize> {
        self.layers
            .len()
            .checked_sub(1)
            .ok_or_else(|| LinkError::Configuration("network has no layers".into()))
    }

    /// Forward pass over a batch of column vectors
    pub fn forward(
        &self,
        input: ArrayView2<f64>,
        activation: OutputActivation,
    ) -> LinkResult<ForwardTrace> {
        let last = self.last_layer()?;
        if input.nrows() != self.input_width() {
            return Err(LinkError::shape("network input rows", self.input_width(), input.nrows()));
        }

        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut current = input.to_owned();

        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.affine(current.view());
            let next = if i < last {
                z.mapv(|v| v.max(0.0))
            } else {
                match activation {
                    OutputActivation::Linear => z.clone(),
                    OutputActivation::Softmax => softmax_columns(z.view()),
                }
            };
            inputs.push(current);
            pre_activations.push(z);
            current = next;
        }

        if current.iter().any(|v| !v.is_finite()) {
            return Err(LinkError::NumericInstability(
                "network output contains NaN or Inf".into(),
            ));
        }

        Ok(ForwardTrace {
            inputs,
            pre_activations,
            output: current,
        })
    }

    /// Back-propagate a gradient w.r.t. the last pre-activation
    pub fn backward(&self, trace: &ForwardTrace, output_grad: Array2<f64>) -> LinkResult<Gradients> {
        let last = self.last_layer()?;
        if trace.pre_activations.len() != self.layers.len() {
            return Err(LinkError::shape(
                "forward trace layers",
                self.layers.len(),
                trace.pre_activations.len(),
            ));
        }
        let expected = trace.pre_activations[last].dim();
        if output_grad.dim() != expected {
            return Err(LinkError::shape(
                "output gradient columns",
                expected.1,
                output_grad.ncols(),
            ));
        }

        let mut grads = self.zeros_like();
        let mut delta = output_grad;

        for i in (0..self.layers.len()).rev() {
            grads.layers[i].weight = delta.dot(&trace.inputs[i].t());
            grads.layers[i].bias = delta.sum_axis(Axis(1)).insert_axis(Axis(1));

            if i > 0 {
                let mut upstream = self.layers[i].weight.t().dot(&delta);
                // ReLU derivative, zero at the kink
                Zip::from(&mut upstream)
                    .and(&trace.pre_activations[i - 1])
                    .for_each(|g, &z| {
                        if z <= 0.0 {
                            *g = 0.0;
                        }
                    });
                delta = upstream;
            }
        }

        if !grads.is_finite() {
            return Err(LinkError::NumericInstability(
                "gradient contains NaN or Inf".into(),
            ));
        }
        Ok(grads)
    }
}

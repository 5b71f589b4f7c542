//! Fully connected layer: `z = W·a + b`

use ndarray::{Array2, ArrayView2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One (weight, bias) pair. `weight` is `out × in`, `bias` is `out × 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

impl DenseLayer {
    /// Glorot/Xavier uniform initialisation.
    ///
    /// The bias is drawn as an `out × 1` matrix with its own fan.
    pub fn xavier(inputs: usize, outputs: usize, rng: &mut ChaCha8Rng) -> Self {
        Self {
            weight: glorot_uniform(outputs, inputs, rng),
            bias: glorot_uniform(outputs, 1, rng),
        }
    }

    pub fn zeros(inputs: usize, outputs: usize) -> Self {
        Self {
            weight: Array2::zeros((outputs, inputs)),
            bias: Array2::zeros((outputs, 1)),
        }
    }

    #[inline]
    pub fn inputs(&self) -> usize {
        self.weight.ncols()
    }

    #[inline]
    pub fn outputs(&self) -> usize {
        self.weight.nrows()
    }

    /// Pre-activation for a batch of column vectors
    pub fn affine(&self, input: ArrayView2<f64>) -> Array2<f64> {
        self.weight.dot(&input) + &self.bias
    }

    pub fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    pub fn is_finite(&self) -> bool {
        self.weight.iter().chain(self.bias.iter()).all(|x| x.is_finite())
    }
}

fn glorot_uniform(rows: usize, cols: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    Array2::from_shape_simple_fn((rows, cols), || rng.gen_range(-limit..limit))
}

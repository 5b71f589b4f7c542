//! Receiver network: received symbol → distribution over messages

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use super::{Gradients, NetworkParams, OutputActivation};
use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::message::{labels_to_messages, Message};

/// Added inside every logarithm of a probability
pub const LOG_EPSILON: f64 = 1e-9;

/// Receiver weights: `2 → NN_R → … → M`, softmax output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiverParams(NetworkParams);

impl ReceiverParams {
    pub fn new(config: &LinkConfig) -> LinkResult<Self> {
        NetworkParams::xavier(&config.receiver_widths(), config.weight_seed).map(Self)
    }

    pub fn from_network(network: NetworkParams, m: usize) -> LinkResult<Self> {
        if network.input_width() != 2 {
            return Err(LinkError::shape("receiver input width", 2, network.input_width()));
        }
        if network.output_width() != m {
            return Err(LinkError::shape("receiver output width", m, network.output_width()));
        }
        Ok(Self(network))
    }

    pub fn network(&self) -> &NetworkParams {
        &self.0
    }

    pub fn network_mut(&mut self) -> &mut NetworkParams {
        &mut self.0
    }

    /// Column-stochastic `M × N` probabilities for a `2 × N` batch
    pub fn decode(&self, symbols: ArrayView2<f64>) -> LinkResult<Array2<f64>> {
        Ok(self.0.forward(symbols, OutputActivation::Softmax)?.output)
    }

    /// Arg-max decision per received symbol
    pub fn classify(&self, symbols: ArrayView2<f64>) -> LinkResult<Vec<Message>> {
        Ok(labels_to_messages(self.decode(symbols)?.view()))
    }

    /// Cross-entropy against `labels` and its gradient
    pub fn loss_and_gradients(
        &self,
        symbols: ArrayView2<f64>,
        labels: ArrayView2<f64>,
    ) -> LinkResult<(f64, Gradients)> {
        let trace = self.0.forward(symbols, OutputActivation::Softmax)?;
        let loss = cross_entropy(trace.output.view(), labels)?;
        let logit_grad = cross_entropy_logit_grad(trace.output.view(), labels)?;
        let grads = self.0.backward(&trace, logit_grad)?;
        Ok((loss, grads))
    }

    /// `-Σ_m labels · ln(p + ε)` per column. Used as the opaque feedback
    /// value; nothing is differentiated through it.
    pub fn per_sample_loss(
        &self,
        symbols: ArrayView2<f64>,
        labels: ArrayView2<f64>,
    ) -> LinkResult<Array1<f64>> {
        let probs = self.decode(symbols)?;
        per_sample_cross_entropy(probs.view(), labels)
    }
}

/// Column-wise softmax, shifted by the column maximum
pub fn softmax_columns(logits: ArrayView2<f64>) -> Array2<f64> {
    let mut out = logits.to_owned();
    for mut column in out.columns_mut() {
        let max = column.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        column.mapv_inplace(|z| (z - max).exp());
        let sum = column.sum();
        column.mapv_inplace(|e| e / sum);
    }
    out
}

fn check_label_shape(probs: &ArrayView2<f64>, labels: &ArrayView2<f64>) -> LinkResult<()> {
    if probs.nrows() != labels.nrows() {
        return Err(LinkError::shape("label rows", probs.nrows(), labels.nrows()));
    }
    if probs.ncols() != labels.ncols() {
        return Err(LinkError::shape("label columns", probs.ncols(), labels.ncols()));
    }
    if probs.ncols() == 0 {
        return Err(LinkError::shape("label columns", 1, 0));
    }
    Ok(())
}

pub(crate) fn per_sample_cross_entropy(
    probs: ArrayView2<f64>,
    labels: ArrayView2<f64>,
) -> LinkResult<Array1<f64>> {
    check_label_shape(&probs, &labels)?;
    let log_probs = probs.mapv(|p| (p + LOG_EPSILON).ln());
    Ok(-(&log_probs * &labels).sum_axis(Axis(0)))
}

/// Mean cross-entropy over the batch
pub fn cross_entropy(probs: ArrayView2<f64>, labels: ArrayView2<f64>) -> LinkResult<f64> {
    let per_sample = per_sample_cross_entropy(probs, labels)?;
    let loss = per_sample.mean().unwrap_or(0.0);
    if !loss.is_finite() {
        return Err(LinkError::NumericInstability(format!(
            "cross-entropy is {}",
            loss
        )));
    }
    Ok(loss)
}

/// Gradient of [`cross_entropy`] w.r.t. the softmax logits.
///
/// The ε inside the log is kept, so this is exact rather than the usual
/// `p − labels` shortcut.
pub fn cross_entropy_logit_grad(
    probs: ArrayView2<f64>,
    labels: ArrayView2<f64>,
) -> LinkResult<Array2<f64>> {
    check_label_shape(&probs, &labels)?;
    let n = probs.ncols() as f64;

    // ∂L/∂p
    let mut grad_p = Array2::zeros(probs.dim());
    Zip::from(&mut grad_p)
        .and(&probs)
        .and(&labels)
        .for_each(|g, &p, &y| *g = -y / ((p + LOG_EPSILON) * n));

    // Softmax Jacobian per column: dz = p ⊙ (g − Σ p·g)
    let mut grad_z = Array2::zeros(probs.dim());
    for ((mut dz, p), g) in grad_z
        .columns_mut()
        .into_iter()
        .zip(probs.columns())
        .zip(grad_p.columns())
    {
        let dot = p.dot(&g);
        Zip::from(&mut dz)
            .and(&p)
            .and(&g)
            .for_each(|d, &pi, &gi| *d = pi * (gi - dot));
    }
    Ok(grad_z)
}

//! Policy-gradient reward model
//!
//! The transmitter output `μ` is the mean of an isotropic Gaussian policy.
//! The symbol actually sent is one sample `a` of that policy. The receiver
//! scores `a` after the channel with a per-sample cross-entropy, which
//! comes back to the transmitter as a plain number. The transmitter then
//! minimizes the REINFORCE surrogate
//!
//! ```text
//! J(μ) = mean_n( r_n · ln π(a_n | μ_n) )
//! ```
//!
//! where `r_n` is held constant. Minimizing `J` lowers the density of
//! high-loss actions, which descends the expected loss without any
//! gradient from the channel or the receiver.

use fiber_channel::NoiseGenerator;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::f64::consts::PI;
use tracing::warn;

use crate::error::{LinkError, LinkResult};

/// Upper percentile at which per-sample losses are clamped
pub const REWARD_CLIP_PERCENTILE: f64 = 0.95;

/// Isotropic Gaussian exploration policy
///
/// Density, matching the reference experiment:
/// `π(a | μ) = exp(−‖a − μ‖² / σ²) / (π σ²)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianPolicy {
    sigma_pi: f64,
}

impl GaussianPolicy {
    pub fn new(sigma_pi: f64) -> LinkResult<Self> {
        if !(sigma_pi.is_finite() && sigma_pi > 0.0) {
            return Err(LinkError::Configuration(format!(
                "policy std must be positive, got {}",
                sigma_pi
            )));
        }
        Ok(Self { sigma_pi })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma_pi
    }

    fn variance(&self) -> f64 {
        self.sigma_pi * self.sigma_pi
    }

    /// Draw one action per column: `a = μ + N(0, σ²)` on both components
    pub fn explore(&self, mean: ArrayView2<f64>, noise: &mut NoiseGenerator) -> Array2<f64> {
        let mut action = mean.to_owned();
        noise.perturb(action.iter_mut(), self.sigma_pi);
        action
    }

    fn squared_distance(
        action: &ArrayView2<f64>,
        mean: &ArrayView2<f64>,
    ) -> LinkResult<Array1<f64>> {
        if action.dim() != mean.dim() {
            return Err(LinkError::shape("policy action columns", mean.ncols(), action.ncols()));
        }
        let diff = action - mean;
        Ok(diff.mapv(|d| d * d).sum_axis(Axis(0)))
    }

    /// `π(a | μ)` per column
    pub fn density(&self, action: ArrayView2<f64>, mean: ArrayView2<f64>) -> LinkResult<Array1<f64>> {
        let var = self.variance();
        Ok(Self::squared_distance(&action, &mean)?.mapv(|d2| (-d2 / var).exp() / (PI * var)))
    }

    /// `ln π(a | μ)` per column, computed without forming the density
    pub fn log_density(
        &self,
        action: ArrayView2<f64>,
        mean: ArrayView2<f64>,
    ) -> LinkResult<Array1<f64>> {
        let var = self.variance();
        let log_norm = (PI * var).ln();
        Ok(Self::squared_distance(&action, &mean)?.mapv(|d2| -d2 / var - log_norm))
    }

    /// `∂ ln π / ∂μ = 2 (a − μ) / σ²`
    pub fn log_density_grad_mean(
        &self,
        action: ArrayView2<f64>,
        mean: ArrayView2<f64>,
    ) -> LinkResult<Array2<f64>> {
        if action.dim() != mean.dim() {
            return Err(LinkError::shape("policy action columns", mean.ncols(), action.ncols()));
        }
        let scale = 2.0 / self.variance();
        Ok((&action - &mean) * scale)
    }

    /// Value of the surrogate `mean(r · ln π)`
    pub fn surrogate(
        &self,
        rewards: ArrayView1<f64>,
        action: ArrayView2<f64>,
        mean: ArrayView2<f64>,
    ) -> LinkResult<f64> {
        let log_pi = self.log_density(action, mean)?;
        check_reward_len(rewards.len(), log_pi.len())?;
        Ok((&rewards * &log_pi).mean().unwrap_or(0.0))
    }

    /// `∂J/∂μ` with the rewards held constant
    pub fn surrogate_grad_mean(
        &self,
        rewards: ArrayView1<f64>,
        action: ArrayView2<f64>,
        mean: ArrayView2<f64>,
    ) -> LinkResult<Array2<f64>> {
        let mut grad = self.log_density_grad_mean(action, mean)?;
        check_reward_len(rewards.len(), grad.ncols())?;
        let n = grad.ncols() as f64;
        for (mut column, &r) in grad.columns_mut().into_iter().zip(rewards.iter()) {
            column *= r / n;
        }
        Ok(grad)
    }
}

fn check_reward_len(rewards: usize, samples: usize) -> LinkResult<()> {
    if rewards != samples {
        return Err(LinkError::shape("reward batch length", samples, rewards));
    }
    Ok(())
}

/// Linear-interpolated percentile of a sorted slice, `p01` in [0, 1]
pub fn percentile(sorted: &[f64], p01: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let p = p01.clamp(0.0, 1.0);
    let n = sorted.len();
    let idx = p * (n.saturating_sub(1) as f64);
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = idx - (lo as f64);
    sorted[lo] * (1.0 - w) + sorted[hi] * w
}

fn check_finite(values: &[f64], what: &str) -> LinkResult<()> {
    if values.is_empty() {
        return Err(LinkError::shape("reward batch length", 1, 0));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(LinkError::NumericInstability(format!("{} contains {}", what, bad)));
    }
    Ok(())
}

/// Clamp every value above the `p01` percentile to that percentile
pub fn clip_at_percentile(values: &[f64], p01: f64) -> LinkResult<Vec<f64>> {
    check_finite(values, "loss batch")?;
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let ceiling = percentile(&sorted, p01);
    Ok(values.iter().map(|&v| v.min(ceiling)).collect())
}

/// Affine map of the batch onto [0, 1]. A batch with no spread cannot be
/// rescaled and is reported instead of producing NaN.
pub fn min_max_rescale(values: &[f64]) -> LinkResult<Vec<f64>> {
    check_finite(values, "reward batch")?;
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !(range > 0.0) {
        warn!(min, max, samples = values.len(), "reward batch has zero range");
        return Err(LinkError::NumericInstability(format!(
            "cannot rescale {} rewards with zero range (all {})",
            values.len(),
            min
        )));
    }
    Ok(values.iter().map(|&v| (v - min) / range).collect())
}

/// Per-sample losses → rewards in [0, 1]: clip at the 95th percentile,
/// then min-max rescale.
pub fn preprocess_rewards(losses: &[f64]) -> LinkResult<Vec<f64>> {
    let clipped = clip_at_percentile(losses, REWARD_CLIP_PERCENTILE)?;
    min_max_rescale(&clipped)
}

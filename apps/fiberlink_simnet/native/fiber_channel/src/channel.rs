//! Split-step nonlinear fiber channel
//!
//! The link is cut into `K` equal segments. Each segment applies the Kerr
//! self-phase rotation for its share of the length, then adds complex AWGN:
//!
//! ```text
//! θ   = γ · L · (xr² + xi²) / K
//! xr' = xr·cos θ − xi·sin θ + n_r
//! xi' = xr·sin θ + xi·cos θ + n_i
//! ```
//!
//! Segments are applied one after another. The rotation of segment `k`
//! depends on the power *after* the noise of segment `k−1`, so the recursion
//! cannot be collapsed into one rotation.

use ndarray::{Array2, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ChannelError, ChannelResult};
use crate::noise::NoiseGenerator;
use crate::power::{check_iq_rows, dbm_to_watts};

/// Physical fiber parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiberParams {
    /// Nonlinearity coefficient γ (1/W/km)
    pub gamma: f64,
    /// Total link length L (km)
    pub length: f64,
    /// Number of split-step segments K
    pub segments: usize,
    /// Total accumulated noise power over the link (dBm)
    pub noise_power_dbm: f64,
}

impl Default for FiberParams {
    fn default() -> Self {
        Self {
            gamma: 1.27,
            length: 2000.0,
            segments: 20,
            noise_power_dbm: -21.3,
        }
    }
}

impl FiberParams {
    pub fn validate(&self) -> ChannelResult<()> {
        if self.segments == 0 {
            return Err(ChannelError::InvalidParameter(
                "fiber needs at least one segment".into(),
            ));
        }
        if !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(ChannelError::InvalidParameter(format!(
                "gamma must be finite and non-negative, got {}",
                self.gamma
            )));
        }
        if !self.length.is_finite() || self.length < 0.0 {
            return Err(ChannelError::InvalidParameter(format!(
                "length must be finite and non-negative, got {}",
                self.length
            )));
        }
        if !self.noise_power_dbm.is_finite() {
            return Err(ChannelError::InvalidParameter(format!(
                "noise power must be finite, got {} dBm",
                self.noise_power_dbm
            )));
        }
        Ok(())
    }

    /// Per-segment, per-component noise standard deviation.
    ///
    /// The total noise power is split evenly over `K` segments and over
    /// the two quadratures.
    pub fn segment_noise_std(&self) -> f64 {
        (dbm_to_watts(self.noise_power_dbm) / self.segments as f64).sqrt()
            / std::f64::consts::SQRT_2
    }

    /// Rotation per segment per Watt of instantaneous power
    fn phase_per_watt(&self) -> f64 {
        self.gamma * self.length / self.segments as f64
    }
}

/// Channel state for telemetry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelState {
    pub symbols_processed: u64,
    pub calls: u64,
}

/// Nonlinear fiber channel with its own noise stream
#[derive(Debug, Clone)]
pub struct FiberChannel {
    params: FiberParams,
    noise: NoiseGenerator,
    symbols_processed: u64,
    calls: u64,
}

impl FiberChannel {
    pub fn new(params: FiberParams, seed: u64) -> ChannelResult<Self> {
        params.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let noise = NoiseGenerator::new(&mut rng);
        Ok(Self::with_noise(params, noise))
    }

    /// Channel whose noise is drawn from OS entropy
    pub fn unseeded(params: FiberParams) -> ChannelResult<Self> {
        params.validate()?;
        Ok(Self::with_noise(params, NoiseGenerator::from_entropy()))
    }

    fn with_noise(params: FiberParams, noise: NoiseGenerator) -> Self {
        Self {
            params,
            noise,
            symbols_processed: 0,
            calls: 0,
        }
    }

    pub fn params(&self) -> &FiberParams {
        &self.params
    }

    /// Propagate with the noise level implied by [`FiberParams`]
    pub fn transmit(&mut self, batch: ArrayView2<f64>) -> ChannelResult<Array2<f64>> {
        let noise_std = self.params.segment_noise_std();
        self.propagate(noise_std, batch)
    }

    /// Propagate a `2 × N` batch through all `K` segments.
    ///
    /// `noise_std` is the per-segment, per-component standard deviation.
    /// Fresh noise is drawn for every segment and every call.
    pub fn propagate(
        &mut self,
        noise_std: f64,
        batch: ArrayView2<f64>,
    ) -> ChannelResult<Array2<f64>> {
        check_iq_rows(&batch)?;
        if !noise_std.is_finite() || noise_std < 0.0 {
            return Err(ChannelError::InvalidParameter(format!(
                "noise std must be finite and non-negative, got {}",
                noise_std
            )));
        }

        let phase_per_watt = self.params.phase_per_watt();
        let mut output = batch.to_owned();

        for _segment in 0..self.params.segments {
            for mut column in output.columns_mut() {
                let xr = column[0];
                let xi = column[1];

                let theta = phase_per_watt * (xr * xr + xi * xi);
                let (sin, cos) = theta.sin_cos();

                column[0] = xr * cos - xi * sin + self.noise.next_sample(noise_std);
                column[1] = xr * sin + xi * cos + self.noise.next_sample(noise_std);
            }
        }

        if output.iter().any(|x| !x.is_finite()) {
            return Err(ChannelError::NumericInstability(
                "fiber output contains NaN or Inf".into(),
            ));
        }

        self.symbols_processed += batch.ncols() as u64;
        self.calls += 1;
        trace!(
            symbols = batch.ncols(),
            segments = self.params.segments,
            noise_std,
            "fiber propagation"
        );

        Ok(output)
    }

    /// Get current channel state for telemetry
    pub fn get_state(&self) -> ChannelState {
        ChannelState {
            symbols_processed: self.symbols_processed,
            calls: self.calls,
        }
    }
}

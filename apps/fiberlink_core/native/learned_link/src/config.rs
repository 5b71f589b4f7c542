//! Run configuration
//!
//! Every knob of a training run lives in [`LinkConfig`]. Defaults reproduce
//! the feedback-quantization experiment at -5 dBm launch power.

use std::fs;
use std::path::Path;

use fiber_channel::FiberParams;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};
use crate::network::NetworkParams;

/// Largest codec resolution accepted for the feedback link
pub const MAX_FEEDBACK_BITS: u32 = 16;

/// Hyperparameters for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Alphabet size M
    pub m: usize,
    /// Launch power (dBm)
    pub p_in_dbm: f64,
    pub lr_receiver: f64,
    pub lr_transmitter: f64,
    /// Exploration standard deviation of the Gaussian policy
    pub sigma_pi: f64,
    pub tx_layers: usize,
    pub rx_layers: usize,
    /// Transmitter hidden width
    pub nn_t: usize,
    /// Receiver hidden width
    pub nn_r: usize,
    pub fiber: FiberParams,
    /// Outer alternations of receiver/transmitter updates
    pub main_loops: usize,
    /// Sweeps over the alphabet per receiver mini-batch
    pub batch_r: usize,
    /// Sweeps over the alphabet per transmitter batch
    pub batch_t: usize,
    pub tran_loops: usize,
    pub rec_loops: usize,
    /// Feedback resolution; 0 sends the reward unquantized
    pub num_bits: u32,
    /// Extra rounds run on the final outer iteration
    pub fine_tune_rounds: usize,
    /// Sweeps per batch during fine tuning
    pub fine_tune_batch: usize,
    /// Monte-Carlo sweeps over the alphabet for SER
    pub eval_sweeps: usize,
    /// Sweeps propagated per evaluation chunk
    pub eval_chunk_sweeps: usize,
    pub weight_seed: u64,
    /// Seed for channel and exploration noise; `None` draws from OS entropy
    pub noise_seed: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            m: 16,
            p_in_dbm: -5.0,
            lr_receiver: 0.008,
            lr_transmitter: 0.001,
            sigma_pi: 0.001_f64.sqrt(),
            tx_layers: 3,
            rx_layers: 3,
            nn_t: 30,
            nn_r: 50,
            fiber: FiberParams::default(),
            main_loops: 4000,
            batch_r: 64,
            batch_t: 64,
            tran_loops: 20,
            rec_loops: 30,
            num_bits: 0,
            fine_tune_rounds: 10,
            fine_tune_batch: 640,
            eval_sweeps: 100_000,
            eval_chunk_sweeps: 5_000,
            weight_seed: 1,
            noise_seed: None,
        }
    }
}

impl LinkConfig {
    /// Settings of the SER-versus-launch-power experiment
    pub fn power_sweep_preset() -> Self {
        Self {
            sigma_pi: 0.0005_f64.sqrt(),
            fine_tune_rounds: 1,
            ..Self::default()
        }
    }

    pub fn with_num_bits(mut self, num_bits: u32) -> Self {
        self.num_bits = num_bits;
        self
    }

    pub fn with_power(mut self, p_in_dbm: f64) -> Self {
        self.p_in_dbm = p_in_dbm;
        self
    }

    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = Some(seed);
        self
    }

    /// Load a JSON config; missing fields fall back to defaults
    pub fn from_json_file(path: &Path) -> LinkResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: LinkConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Widths of the transmitter: M → NN_T → … → 2
    pub fn transmitter_widths(&self) -> Vec<usize> {
        layer_widths(self.m, self.nn_t, 2, self.tx_layers)
    }

    /// Widths of the receiver: 2 → NN_R → … → M
    pub fn receiver_widths(&self) -> Vec<usize> {
        layer_widths(2, self.nn_r, self.m, self.rx_layers)
    }

    /// Both networks must have exactly the layer widths this config describes
    pub(crate) fn check_network_widths(
        &self,
        transmitter: &NetworkParams,
        receiver: &NetworkParams,
    ) -> LinkResult<()> {
        for (role, actual, expected) in [
            ("transmitter", transmitter.widths(), self.transmitter_widths()),
            ("receiver", receiver.widths(), self.receiver_widths()),
        ] {
            if actual != expected {
                return Err(LinkError::Configuration(format!(
                    "{} widths {:?} do not match configuration {:?}",
                    role, actual, expected
                )));
            }
        }
        Ok(())
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> LinkResult<()> {
        fn fail<T>(msg: String) -> LinkResult<T> {
            Err(LinkError::Configuration(msg))
        }

        if self.m < 2 {
            return fail(format!("alphabet size must be at least 2, got {}", self.m));
        }
        if self.tx_layers < 2 || self.rx_layers < 2 {
            return fail(format!(
                "networks need at least 2 layers, got tx={} rx={}",
                self.tx_layers, self.rx_layers
            ));
        }
        if self.nn_t == 0 || self.nn_r == 0 {
            return fail(format!(
                "hidden widths must be positive, got NN_T={} NN_R={}",
                self.nn_t, self.nn_r
            ));
        }
        for (name, lr) in [
            ("lr_receiver", self.lr_receiver),
            ("lr_transmitter", self.lr_transmitter),
        ] {
            if !(lr.is_finite() && lr > 0.0) {
                return fail(format!("{} must be positive, got {}", name, lr));
            }
        }
        if !(self.sigma_pi.is_finite() && self.sigma_pi > 0.0) {
            return fail(format!(
                "sigma_pi must be positive for a Gaussian policy, got {}",
                self.sigma_pi
            ));
        }
        if !self.p_in_dbm.is_finite() {
            return fail(format!("launch power must be finite, got {}", self.p_in_dbm));
        }
        for (name, size) in [
            ("batch_r", self.batch_r),
            ("batch_t", self.batch_t),
            ("tran_loops", self.tran_loops),
            ("rec_loops", self.rec_loops),
            ("eval_sweeps", self.eval_sweeps),
            ("eval_chunk_sweeps", self.eval_chunk_sweeps),
        ] {
            if size == 0 {
                return fail(format!("{} must be positive", name));
            }
        }
        if self.fine_tune_rounds > 0 && self.fine_tune_batch == 0 {
            return fail("fine_tune_batch must be positive when fine tuning".into());
        }
        if self.num_bits > MAX_FEEDBACK_BITS {
            return fail(format!(
                "num_bits must be at most {}, got {}",
                MAX_FEEDBACK_BITS, self.num_bits
            ));
        }
        self.fiber
            .validate()
            .map_err(|e| LinkError::Configuration(e.to_string()))?;
        Ok(())
    }
}

fn layer_widths(input: usize, hidden: usize, output: usize, layers: usize) -> Vec<usize> {
    let mut widths = Vec::with_capacity(layers + 1);
    widths.push(input);
    widths.extend(std::iter::repeat(hidden).take(layers.saturating_sub(1)));
    widths.push(output);
    widths
}

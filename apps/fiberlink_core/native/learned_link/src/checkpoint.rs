//! Trained-parameter checkpoints
//!
//! One JSON document per run holding both networks and the configuration
//! that produced them. Power sweeps keep one checkpoint per launch power:
//!
//! ```text
//! <root>/FIBER_NN_parameters_-5dB/best_validation.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::network::{ReceiverParams, TransmitterParams};
use crate::report::atomic_write;

pub const CHECKPOINT_FILE: &str = "best_validation.json";

/// Directory for the checkpoint trained at `p_in_dbm`
pub fn checkpoint_dir_for_power(root: &Path, p_in_dbm: f64) -> PathBuf {
    let whole = p_in_dbm.abs().trunc() as i64;
    let name = if p_in_dbm < 0.0 {
        format!("FIBER_NN_parameters_-{}dB", whole)
    } else {
        format!("FIBER_NN_parameters_{}dB", whole)
    };
    root.join(name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub config: LinkConfig,
    pub transmitter: TransmitterParams,
    pub receiver: ReceiverParams,
    /// SER measured right after training, if evaluated
    pub ser: Option<f64>,
}

impl Checkpoint {
    pub fn save(&self, path: &Path) -> LinkResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &data)?;
        info!(path = %path.display(), ser = ?self.ser, "checkpoint saved");
        Ok(())
    }

    /// Save under the per-power directory layout and return the file path
    pub fn save_for_power(&self, root: &Path) -> LinkResult<PathBuf> {
        let path = checkpoint_dir_for_power(root, self.config.p_in_dbm).join(CHECKPOINT_FILE);
        self.save(&path)?;
        Ok(path)
    }

    /// Load and check that both networks fit the stored configuration
    pub fn load(path: &Path) -> LinkResult<Self> {
        let data = fs::read(path)?;
        let checkpoint: Checkpoint = serde_json::from_slice(&data)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    fn validate(&self) -> LinkResult<()> {
        self.config.validate()?;
        let tx = self.transmitter.network();
        let rx = self.receiver.network();
        self.config.check_network_widths(tx, rx)?;
        if !(tx.is_finite() && rx.is_finite()) {
            return Err(LinkError::NumericInstability(
                "checkpoint contains non-finite weights".into(),
            ));
        }
        Ok(())
    }
}

//! Fiber channel physics for FiberLink SimNet
//!
//! Implements a split-step model of a nonlinear optical fiber: Kerr
//! self-phase rotation proportional to instantaneous power, with AWGN
//! injected after every segment. Also provides the batch-level average
//! power constraint applied before launch.

pub mod channel;
pub mod error;
pub mod noise;
pub mod power;

pub use channel::{ChannelState, FiberChannel, FiberParams};
pub use error::{ChannelError, ChannelResult};
pub use noise::NoiseGenerator;
pub use power::{
    apply_power, average_energy, dbm_to_watts, normalize, normalize_backward, watts_to_dbm,
    Normalized,
};

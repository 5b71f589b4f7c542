//! Learned Link - end-to-end autoencoder over a nonlinear fiber
//!
//! A transmitter network maps one of `M` messages to a 2-D symbol, the
//! fiber rotates and perturbs it, and a receiver network classifies what
//! arrives. The fiber is treated as a black box: the receiver is trained
//! by ordinary supervised learning while the transmitter learns by policy
//! gradient from a per-sample loss sent back over a (possibly quantized)
//! feedback link.
//!
//! Channel physics live in the `fiber_channel` crate.

pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod error;
pub mod feedback;
pub mod message;
pub mod network;
pub mod optimizer;
pub mod policy;
pub mod report;
pub mod traits;
pub mod trainer;

#[cfg(feature = "nif")]
pub mod nif;

// Re-export core types for convenience
pub use checkpoint::{checkpoint_dir_for_power, Checkpoint, CHECKPOINT_FILE};
pub use codec::QuantizationCodec;
pub use config::{LinkConfig, MAX_FEEDBACK_BITS};
pub use error::{LinkError, LinkResult};
pub use feedback::{feedback_for_bits, DirectFeedback, QuantizedFeedback};
pub use message::Message;
pub use network::{NetworkParams, ReceiverParams, TransmitterParams};
pub use optimizer::Adam;
pub use policy::{preprocess_rewards, GaussianPolicy};
pub use report::{write_ser_file, SerSummary};
pub use traits::FeedbackLink;
pub use trainer::{
    compute_ser, compute_ser_realizations, sweep_input_power, SweepPoint, Trainer,
    TrainingPhase, TrainingReport,
};

#[cfg(feature = "nif")]
fn on_load(env: rustler::Env, _info: rustler::Term) -> bool {
    let _ = rustler::resource!(nif::LinkResource, env);
    true
}

#[cfg(feature = "nif")]
rustler::init!(
    "Elixir.FiberLinkCore.LearnedLink",
    [
        nif::link_new,
        nif::link_train,
        nif::link_ser,
        nif::link_constellation,
        nif::link_checkpoint,
        nif::compute_ser,
    ],
    load = on_load
);

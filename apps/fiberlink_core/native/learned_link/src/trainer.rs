//! Training orchestrator
//!
//! Alternates supervised receiver updates with policy-gradient transmitter
//! updates, fine-tunes on the last outer iteration with larger batches,
//! then estimates the symbol error rate by Monte Carlo.
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐        ┌────────────┐   ┌────────────┐   ┌──────┐
//! │ ReceiverUpd. │──▶│ TransmitterUpd. │─ × N ─▶│ FineTuning │──▶│ Evaluation │──▶│ Done │
//! └──────────────┘   └─────────────────┘        └────────────┘   └────────────┘   └──────┘
//! ```
//!
//! The channel is never differentiated: the receiver trains on channel
//! output it sees as plain data, and the transmitter learns from the
//! per-sample loss the receiver reports over the feedback link.

use std::path::Path;

use fiber_channel::{apply_power, ChannelState, FiberChannel, NoiseGenerator};
use ndarray::{s, Array1, Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::checkpoint::Checkpoint;
use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::feedback::feedback_for_bits;
use crate::message::{check_whole_sweeps, message_sweeps, one_hot_labels, tile_columns, Message};
use crate::network::{ReceiverParams, TransmitterParams};
use crate::optimizer::Adam;
use crate::policy::{preprocess_rewards, GaussianPolicy};
use crate::traits::FeedbackLink;

/// Outer iterations between progress logs
const PROGRESS_INTERVAL: usize = 1000;

// ============================================================================
// Phase & report
// ============================================================================

/// Where the orchestrator currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingPhase {
    Initialized,
    ReceiverUpdate { iteration: usize },
    TransmitterUpdate { iteration: usize },
    FineTuning { round: usize },
    /// Trained and ready to evaluate, or evaluating
    Evaluation,
    Done,
}

/// Loss history of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Completed outer iterations
    pub iterations: usize,
    /// Last receiver cross-entropy of each outer iteration
    pub receiver_loss: Vec<f64>,
    /// Last transmitter surrogate value of each outer iteration
    pub transmitter_objective: Vec<f64>,
    pub ser: Option<f64>,
}

/// SER at one launch power
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub p_in_dbm: f64,
    pub ser: f64,
}

// ============================================================================
// Trainer
// ============================================================================

/// Owns both networks, their optimizers, the channel and the feedback link
pub struct Trainer {
    config: LinkConfig,
    transmitter: TransmitterParams,
    receiver: ReceiverParams,
    tx_optimizer: Adam,
    rx_optimizer: Adam,
    channel: FiberChannel,
    exploration: NoiseGenerator,
    policy: GaussianPolicy,
    feedback: Box<dyn FeedbackLink>,
    phase: TrainingPhase,
    report: TrainingReport,
}

impl Trainer {
    /// Fresh Xavier-initialized networks
    pub fn new(config: LinkConfig) -> LinkResult<Self> {
        config.validate()?;
        let transmitter = TransmitterParams::new(&config)?;
        let receiver = ReceiverParams::new(&config)?;
        Self::with_params(config, transmitter, receiver)
    }

    /// Start from existing networks
    pub fn with_params(
        config: LinkConfig,
        transmitter: TransmitterParams,
        receiver: ReceiverParams,
    ) -> LinkResult<Self> {
        config.validate()?;
        let transmitter = TransmitterParams::from_network(transmitter.network().clone(), config.m)?;
        let receiver = ReceiverParams::from_network(receiver.network().clone(), config.m)?;
        config.check_network_widths(transmitter.network(), receiver.network())?;

        let feedback = feedback_for_bits(config.num_bits)?;
        let policy = GaussianPolicy::new(config.sigma_pi)?;

        // Channel and exploration share one seeded stream when reproducible
        let (channel, exploration) = match config.noise_seed {
            Some(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let channel_seed: u64 = rng.gen();
                (
                    FiberChannel::new(config.fiber.clone(), channel_seed)?,
                    NoiseGenerator::new(&mut rng),
                )
            }
            None => (
                FiberChannel::unseeded(config.fiber.clone())?,
                NoiseGenerator::from_entropy(),
            ),
        };

        let tx_optimizer = Adam::new(transmitter.network(), config.lr_transmitter);
        let rx_optimizer = Adam::new(receiver.network(), config.lr_receiver);

        Ok(Self {
            config,
            transmitter,
            receiver,
            tx_optimizer,
            rx_optimizer,
            channel,
            exploration,
            policy,
            feedback,
            phase: TrainingPhase::Initialized,
            report: TrainingReport::default(),
        })
    }

    pub fn from_checkpoint(checkpoint: Checkpoint) -> LinkResult<Self> {
        let mut trainer =
            Self::with_params(checkpoint.config, checkpoint.transmitter, checkpoint.receiver)?;
        trainer.report.ser = checkpoint.ser;
        Ok(trainer)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            config: self.config.clone(),
            transmitter: self.transmitter.clone(),
            receiver: self.receiver.clone(),
            ser: self.report.ser,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn transmitter(&self) -> &TransmitterParams {
        &self.transmitter
    }

    pub fn receiver(&self) -> &ReceiverParams {
        &self.receiver
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.get_state()
    }

    /// Normalized symbol for each message, `2 × M`, column j = message j+1
    pub fn constellation(&self) -> LinkResult<Array2<f64>> {
        let sweep = one_hot_labels(self.config.m);
        Ok(self.transmitter.encode_normalized(sweep.view())?.symbols().clone())
    }

    fn launch(&self, symbols: ArrayView2<f64>) -> LinkResult<Array2<f64>> {
        Ok(apply_power(symbols, self.config.p_in_dbm)?)
    }

    // ========================================================================
    // Phases
    // ========================================================================

    /// One channel pass over `rec_loops × sweeps` sweeps, then `rec_loops`
    /// Adam steps on consecutive slices of that fixed output.
    ///
    /// Returns the cross-entropy of the last slice.
    pub fn receiver_phase(&mut self, sweeps: usize) -> LinkResult<f64> {
        let m = self.config.m;
        let loops = self.config.rec_loops;
        let labels = message_sweeps(m, loops * sweeps)?;

        let forward = self.transmitter.encode_normalized(labels.view())?;
        let launched = self.launch(forward.symbols().view())?;
        let received = self.channel.transmit(launched.view())?;

        let received_sweeps = check_whole_sweeps(received.ncols(), m)?;
        if received_sweeps != loops * sweeps {
            return Err(LinkError::shape(
                "receiver training sweeps",
                loops * sweeps,
                received_sweeps,
            ));
        }

        let slice_width = sweeps * m;
        let mut loss = f64::NAN;
        for k in 0..loops {
            let cols = s![.., k * slice_width..(k + 1) * slice_width];
            let (batch_loss, grads) = self
                .receiver
                .loss_and_gradients(received.slice(cols), labels.slice(cols))?;
            self.rx_optimizer.step(self.receiver.network_mut(), &grads)?;
            loss = batch_loss;
        }
        debug!(loss, sweeps, "receiver phase");
        Ok(loss)
    }

    /// One REINFORCE update from a fresh exploration batch of `sweeps` sweeps.
    ///
    /// Returns the surrogate value before the step.
    pub fn transmitter_step(&mut self, sweeps: usize) -> LinkResult<f64> {
        let labels = message_sweeps(self.config.m, sweeps)?;
        let forward = self.transmitter.encode_normalized(labels.view())?;
        let mean = forward.symbols().view();

        let action = self.policy.explore(mean, &mut self.exploration);
        let launched = self.launch(action.view())?;
        let received = self.channel.transmit(launched.view())?;

        // Scalar feedback only; no gradient crosses the channel
        let losses = self.receiver.per_sample_loss(received.view(), labels.view())?;
        let rewards = preprocess_rewards(&losses.to_vec())?;
        let rewards = Array1::from(self.feedback.transmit(&rewards)?);

        let objective = self.policy.surrogate(rewards.view(), action.view(), mean)?;
        let symbol_grad = self
            .policy
            .surrogate_grad_mean(rewards.view(), action.view(), mean)?;
        let grads = self.transmitter.gradients(&forward, symbol_grad.view())?;
        self.tx_optimizer.step(self.transmitter.network_mut(), &grads)?;
        Ok(objective)
    }

    /// `tran_loops` transmitter steps; returns the last surrogate value
    pub fn transmitter_phase(&mut self, sweeps: usize) -> LinkResult<f64> {
        let mut objective = f64::NAN;
        for _ in 0..self.config.tran_loops {
            objective = self.transmitter_step(sweeps)?;
        }
        debug!(objective, sweeps, "transmitter phase");
        Ok(objective)
    }

    fn outer_iteration(&mut self, iteration: usize) -> LinkResult<()> {
        self.phase = TrainingPhase::ReceiverUpdate { iteration };
        let rx_loss = self.receiver_phase(self.config.batch_r)?;

        self.phase = TrainingPhase::TransmitterUpdate { iteration };
        let tx_objective = self.transmitter_phase(self.config.batch_t)?;

        self.report.iterations += 1;
        self.report.receiver_loss.push(rx_loss);
        self.report.transmitter_objective.push(tx_objective);
        Ok(())
    }

    /// Extra alternations at the larger fine-tuning batch size
    pub fn fine_tune(&mut self) -> LinkResult<()> {
        let batch = self.config.fine_tune_batch;
        for round in 0..self.config.fine_tune_rounds {
            self.phase = TrainingPhase::FineTuning { round };
            let tx_objective = self.transmitter_phase(batch)?;
            let rx_loss = self.receiver_phase(batch)?;
            debug!(round, rx_loss, tx_objective, "fine tuning round");
        }
        Ok(())
    }

    /// Run every outer iteration, then fine-tune
    pub fn train(&mut self) -> LinkResult<&TrainingReport> {
        info!(
            m = self.config.m,
            p_in_dbm = self.config.p_in_dbm,
            snr_db = self.config.p_in_dbm - self.config.fiber.noise_power_dbm,
            num_bits = self.config.num_bits,
            main_loops = self.config.main_loops,
            "training started"
        );

        for iteration in 0..self.config.main_loops {
            if iteration % PROGRESS_INTERVAL == 0 {
                info!(iteration, "training progress");
            }
            self.outer_iteration(iteration)?;
        }
        if self.config.main_loops > 0 {
            self.fine_tune()?;
        }

        self.phase = TrainingPhase::Evaluation;
        info!(
            iterations = self.report.iterations,
            receiver_loss = ?self.report.receiver_loss.last(),
            "training finished"
        );
        Ok(&self.report)
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Monte-Carlo SER over `sweeps` full sweeps of the alphabet.
    ///
    /// Sweeps are propagated in chunks of `eval_chunk_sweeps`. Every chunk
    /// holds whole sweeps, so each sees the same normalized constellation a
    /// single batch would.
    pub fn evaluate(&mut self, sweeps: usize) -> LinkResult<f64> {
        if sweeps == 0 {
            return Err(LinkError::Configuration(
                "evaluation needs at least one sweep".into(),
            ));
        }
        self.phase = TrainingPhase::Evaluation;

        let m = self.config.m;
        let constellation = self.constellation()?;
        let launched = self.launch(constellation.view())?;

        let mut errors = 0usize;
        let mut remaining = sweeps;
        while remaining > 0 {
            let chunk = remaining.min(self.config.eval_chunk_sweeps);
            let batch = tile_columns(launched.view(), chunk)?;
            let received = self.channel.transmit(batch.view())?;
            let decided = self.receiver.classify(received.view())?;
            errors += count_symbol_errors(&decided, m);
            remaining -= chunk;
        }

        let total = sweeps * m;
        let ser = errors as f64 / total as f64;
        self.report.ser = Some(ser);
        self.phase = TrainingPhase::Done;
        info!(ser, errors, symbols = total, "evaluation finished");
        Ok(ser)
    }
}

/// Decisions for a tiled batch, where column `i` carries message `i mod m`
fn count_symbol_errors(decided: &[Message], m: usize) -> usize {
    decided
        .iter()
        .enumerate()
        .filter(|(i, msg)| msg.index() != i % m)
        .count()
}

// ============================================================================
// Drivers
// ============================================================================

/// Train a fresh link with `num_bits` of feedback and return its SER
pub fn compute_ser(config: &LinkConfig, num_bits: u32) -> LinkResult<f64> {
    let config = config.clone().with_num_bits(num_bits);
    let sweeps = config.eval_sweeps;
    let mut trainer = Trainer::new(config)?;
    trainer.train()?;
    trainer.evaluate(sweeps)
}

/// `realizations` independent runs of [`compute_ser`].
///
/// With a noise seed, realization `i` uses `seed + i`.
pub fn compute_ser_realizations(
    config: &LinkConfig,
    num_bits: u32,
    realizations: usize,
) -> LinkResult<Vec<f64>> {
    let mut sers = Vec::with_capacity(realizations);
    for i in 0..realizations {
        info!(realization = i, num_bits, "starting realization");
        let run = match config.noise_seed {
            Some(seed) => config.clone().with_noise_seed(seed.wrapping_add(i as u64)),
            None => config.clone(),
        };
        sers.push(compute_ser(&run, num_bits)?);
    }
    Ok(sers)
}

/// Train and evaluate one link per launch power.
///
/// With `checkpoint_root`, each trained pair is saved under its power's
/// directory as soon as it is evaluated.
pub fn sweep_input_power(
    config: &LinkConfig,
    powers: &[f64],
    checkpoint_root: Option<&Path>,
) -> LinkResult<Vec<SweepPoint>> {
    let mut points = Vec::with_capacity(powers.len());
    for &p_in_dbm in powers {
        let run = config.clone().with_power(p_in_dbm);
        let sweeps = run.eval_sweeps;
        let mut trainer = Trainer::new(run)?;
        trainer.train()?;
        let ser = trainer.evaluate(sweeps)?;
        if let Some(root) = checkpoint_root {
            trainer.checkpoint().save_for_power(root)?;
        }
        info!(p_in_dbm, ser, "sweep point finished");
        points.push(SweepPoint { p_in_dbm, ser });
    }
    Ok(points)
}

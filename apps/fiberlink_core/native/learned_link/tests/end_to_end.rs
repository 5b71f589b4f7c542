//! End-to-end link scenarios

use fiber_channel::FiberParams;
use learned_link::network::DenseLayer;
use learned_link::{
    compute_ser, compute_ser_realizations, sweep_input_power, Checkpoint, LinkConfig,
    NetworkParams, ReceiverParams, Trainer, TransmitterParams, CHECKPOINT_FILE,
};
use ndarray::Array2;
use tempfile::tempdir;

fn small_config() -> LinkConfig {
    LinkConfig {
        nn_t: 8,
        nn_r: 16,
        main_loops: 2,
        batch_r: 2,
        batch_t: 2,
        rec_loops: 3,
        tran_loops: 2,
        fine_tune_rounds: 1,
        fine_tune_batch: 4,
        eval_sweeps: 40,
        eval_chunk_sweeps: 16,
        noise_seed: Some(5),
        ..LinkConfig::default()
    }
}

/// Transmitter that places message j on the j-th point of square 16-QAM
fn qam16_transmitter() -> TransmitterParams {
    let levels = [-3.0, -1.0, 1.0, 3.0];
    let mut output = DenseLayer::zeros(16, 2);
    for j in 0..16 {
        output.weight[[0, j]] = levels[j % 4];
        output.weight[[1, j]] = levels[j / 4];
    }
    let mut hidden = Vec::new();
    for _ in 0..2 {
        let mut layer = DenseLayer::zeros(16, 16);
        layer.weight = Array2::eye(16);
        hidden.push(layer);
    }
    hidden.push(output);
    TransmitterParams::from_network(NetworkParams::from_layers(hidden).unwrap(), 16).unwrap()
}

/// Seeded run on the default nonlinear fiber, long enough for the
/// transmitter to learn a usable constellation
fn joint_training_config(num_bits: u32) -> LinkConfig {
    LinkConfig {
        main_loops: 300,
        batch_r: 16,
        batch_t: 16,
        rec_loops: 10,
        tran_loops: 10,
        fine_tune_rounds: 1,
        fine_tune_batch: 64,
        eval_sweeps: 1000,
        eval_chunk_sweeps: 500,
        noise_seed: Some(21),
        ..LinkConfig::default()
    }
    .with_num_bits(num_bits)
}

/// Same receiver updates as a full run, transmitter left at initialization
fn receiver_only_ser(config: &LinkConfig) -> f64 {
    let mut trainer = Trainer::new(config.clone()).unwrap();
    for _ in 0..config.main_loops {
        trainer.receiver_phase(config.batch_r).unwrap();
    }
    for _ in 0..config.fine_tune_rounds {
        trainer.receiver_phase(config.fine_tune_batch).unwrap();
    }
    trainer.evaluate(config.eval_sweeps).unwrap()
}

fn assert_joint_training_beats_receiver_only(num_bits: u32) {
    let config = joint_training_config(num_bits);
    assert_eq!(config.fiber.gamma, FiberParams::default().gamma);

    let mut trainer = Trainer::new(config.clone()).unwrap();
    trainer.train().unwrap();
    let trained = trainer.evaluate(config.eval_sweeps).unwrap();
    let baseline = receiver_only_ser(&config);

    assert!(trained < 0.2, "{}-bit trained SER {}", num_bits, trained);
    assert!(
        trained < baseline,
        "{}-bit trained SER {} vs receiver-only {}",
        num_bits,
        trained,
        baseline
    );
}

#[test]
fn test_joint_training_beats_receiver_only() {
    assert_joint_training_beats_receiver_only(0);
}

#[test]
fn test_joint_training_with_quantized_feedback() {
    assert_joint_training_beats_receiver_only(3);
}

#[test]
fn test_untrained_link_guesses() {
    let config = LinkConfig {
        main_loops: 0,
        eval_sweeps: 2000,
        eval_chunk_sweeps: 500,
        noise_seed: Some(1),
        ..LinkConfig::default()
    };
    let ser = compute_ser(&config, 0).unwrap();
    assert!((ser - 15.0 / 16.0).abs() < 0.07, "untrained SER {}", ser);
}

#[test]
fn test_pretrained_noiseless_link_recovers_messages() {
    let config = LinkConfig {
        nn_t: 16,
        p_in_dbm: 30.0,
        fiber: FiberParams {
            gamma: 0.0,
            noise_power_dbm: -300.0,
            ..FiberParams::default()
        },
        batch_r: 4,
        rec_loops: 30,
        noise_seed: Some(2),
        ..LinkConfig::default()
    };
    let receiver = ReceiverParams::new(&config).unwrap();
    let mut trainer = Trainer::with_params(config, qam16_transmitter(), receiver).unwrap();

    for _ in 0..100 {
        trainer.receiver_phase(4).unwrap();
    }

    let ser = trainer.evaluate(200).unwrap();
    assert!(ser <= 0.01, "pretrained SER {}", ser);
}

#[test]
fn test_quantized_realizations() {
    let sers = compute_ser_realizations(&small_config(), 3, 2).unwrap();
    assert_eq!(sers.len(), 2);
    assert!(sers.iter().all(|s| (0.0..=1.0).contains(s)));
}

#[test]
fn test_power_sweep_writes_checkpoints() {
    let dir = tempdir().unwrap();
    let points = sweep_input_power(&small_config(), &[-2.0, 0.0], Some(dir.path())).unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].p_in_dbm, -2.0);
    for (dirname, p) in [("FIBER_NN_parameters_-2dB", -2.0), ("FIBER_NN_parameters_0dB", 0.0)] {
        let path = dir.path().join(dirname).join(CHECKPOINT_FILE);
        let ckpt = Checkpoint::load(&path).unwrap();
        assert_eq!(ckpt.config.p_in_dbm, p);
        assert!(ckpt.ser.is_some());
    }
}

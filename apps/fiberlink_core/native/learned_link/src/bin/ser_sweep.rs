//! `ser_sweep` - train learned links and record their symbol error rate
//!
//! # Usage
//!
//! ```bash
//! ser_sweep bits --num-bits 3 --realizations 10
//! ser_sweep power --from -15 --to 0 --checkpoints BLER_NN_Parameters_no_quantization
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use learned_link::{
    compute_ser_realizations, sweep_input_power, write_ser_file, LinkConfig, SerSummary,
};

#[derive(Parser, Debug)]
#[command(
    name = "ser_sweep",
    version,
    about = "SER of a learned fiber link trained over a feedback channel",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options shared by every sweep
#[derive(Args, Debug)]
struct RunArgs {
    /// JSON configuration; missing keys take their defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the number of outer training iterations
    #[arg(long)]
    main_loops: Option<usize>,

    /// Seed channel and exploration noise
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of evaluation sweeps
    #[arg(long)]
    eval_sweeps: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// SER against the feedback quantization resolution
    Bits {
        #[command(flatten)]
        run: RunArgs,

        /// Bits per fed-back loss; 0 sends it unquantized
        #[arg(long, default_value_t = 3)]
        num_bits: u32,

        /// Independent training runs
        #[arg(long, default_value_t = 10)]
        realizations: usize,

        #[arg(short, long, default_value = "SER.txt")]
        output: PathBuf,
    },

    /// SER against launch power, with unquantized feedback
    Power {
        #[command(flatten)]
        run: RunArgs,

        /// First launch power (dBm)
        #[arg(long, default_value_t = -15, allow_negative_numbers = true)]
        from: i32,

        /// Last launch power (dBm), inclusive
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        to: i32,

        #[arg(short, long, default_value = "SER_no_quantization")]
        output: PathBuf,

        /// Root directory for per-power checkpoints
        #[arg(long, value_name = "DIR")]
        checkpoints: Option<PathBuf>,
    },
}

fn load_config(run: &RunArgs, base: LinkConfig) -> Result<LinkConfig> {
    let mut config = match run.config.as_deref() {
        Some(path) => LinkConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => base,
    };
    if let Some(loops) = run.main_loops {
        config.main_loops = loops;
    }
    if let Some(sweeps) = run.eval_sweeps {
        config.eval_sweeps = sweeps;
    }
    if run.seed.is_some() {
        config.noise_seed = run.seed;
    }
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn write_results(path: &Path, values: &[f64]) -> Result<()> {
    write_ser_file(path, values)
        .with_context(|| format!("Failed to write SER file {}", path.display()))?;
    info!(path = %path.display(), rows = values.len(), "SER written");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Bits {
            run,
            num_bits,
            realizations,
            output,
        } => {
            let config = load_config(&run, LinkConfig::default())?;
            if realizations == 0 {
                bail!("at least one realization is required");
            }
            info!(
                m = config.m,
                p_in_dbm = config.p_in_dbm,
                noise_dbm = config.fiber.noise_power_dbm,
                num_bits,
                realizations,
                "SER vs quantization bits"
            );

            let sers = compute_ser_realizations(&config, num_bits, realizations)?;
            write_results(&output, &sers)?;
            if let Some(summary) = SerSummary::from_values(&sers) {
                info!(
                    mean = summary.mean,
                    std_dev = summary.std_dev,
                    ci95 = summary.ci95_half_width,
                    "SER over realizations"
                );
            }
        }

        Command::Power {
            run,
            from,
            to,
            output,
            checkpoints,
        } => {
            let config = load_config(&run, LinkConfig::power_sweep_preset())?;
            if from > to {
                bail!("empty power range {}..={} dBm", from, to);
            }
            let powers: Vec<f64> = (from..=to).map(f64::from).collect();
            info!(
                m = config.m,
                noise_dbm = config.fiber.noise_power_dbm,
                points = powers.len(),
                "SER vs input power"
            );

            let points = sweep_input_power(&config, &powers, checkpoints.as_deref())?;
            let sers: Vec<f64> = points.iter().map(|p| p.ser).collect();
            write_results(&output, &sers)?;
            for point in &points {
                info!(p_in_dbm = point.p_in_dbm, ser = point.ser, "sweep point");
            }
        }
    }

    Ok(())
}

//! NIF interface for Elixir
//!
//! A trained link lives in a resource so the BEAM side can train once and
//! evaluate or inspect it repeatedly. Training and evaluation run for
//! minutes, so every NIF that touches the network is dirty-CPU scheduled.

use rustler::{NifResult, ResourceArc};
use std::sync::{Mutex, MutexGuard};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::trainer::{self, Trainer};

/// NIF resource wrapper for a training run
pub struct LinkResource {
    pub inner: Mutex<Trainer>,
}

fn to_nif_error(err: LinkError) -> rustler::Error {
    rustler::Error::Term(Box::new(err.to_string()))
}

fn parse_config(config_json: &str) -> NifResult<LinkConfig> {
    let config: LinkConfig = serde_json::from_str(config_json)
        .map_err(|e| to_nif_error(LinkError::Serialization(e)))?;
    config.validate().map_err(to_nif_error)?;
    Ok(config)
}

fn lock(link: &ResourceArc<LinkResource>) -> NifResult<MutexGuard<'_, Trainer>> {
    link.inner
        .lock()
        .map_err(|_| rustler::Error::Term(Box::new("lock poisoned")))
}

// ============================================================================
// Link NIFs
// ============================================================================

/// Create a link from a JSON config; missing keys take their defaults
#[rustler::nif]
pub fn link_new(config_json: String) -> NifResult<ResourceArc<LinkResource>> {
    let config = parse_config(&config_json)?;
    let trainer = Trainer::new(config).map_err(to_nif_error)?;

    Ok(ResourceArc::new(LinkResource {
        inner: Mutex::new(trainer),
    }))
}

/// Run the full training schedule, returning completed outer iterations
#[rustler::nif(schedule = "DirtyCpu")]
pub fn link_train(link: ResourceArc<LinkResource>) -> NifResult<usize> {
    let mut trainer = lock(&link)?;
    let report = trainer.train().map_err(to_nif_error)?;
    Ok(report.iterations)
}

/// Monte-Carlo SER over `sweeps` sweeps of the alphabet
#[rustler::nif(schedule = "DirtyCpu")]
pub fn link_ser(link: ResourceArc<LinkResource>, sweeps: usize) -> NifResult<f64> {
    let mut trainer = lock(&link)?;
    trainer.evaluate(sweeps).map_err(to_nif_error)
}

/// Current constellation as `[{i, q}]`, one point per message
#[rustler::nif]
pub fn link_constellation(link: ResourceArc<LinkResource>) -> NifResult<Vec<(f64, f64)>> {
    let trainer = lock(&link)?;
    let points = trainer.constellation().map_err(to_nif_error)?;
    Ok(points
        .columns()
        .into_iter()
        .map(|c| (c[0], c[1]))
        .collect())
}

/// Serialized checkpoint of the link's current networks
#[rustler::nif]
pub fn link_checkpoint(link: ResourceArc<LinkResource>) -> NifResult<String> {
    let trainer = lock(&link)?;
    serde_json::to_string(&trainer.checkpoint())
        .map_err(|e| to_nif_error(LinkError::Serialization(e)))
}

// ============================================================================
// One-shot NIFs
// ============================================================================

/// Train a fresh link with `num_bits` of reward feedback and return its SER
#[rustler::nif(schedule = "DirtyCpu")]
pub fn compute_ser(config_json: String, num_bits: u32) -> NifResult<f64> {
    let config = parse_config(&config_json)?;
    trainer::compute_ser(&config, num_bits).map_err(to_nif_error)
}

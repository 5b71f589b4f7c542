//! Average-power constraint
//!
//! Symbol batches are `2 × N` arrays: row 0 is the in-phase (real) part,
//! row 1 the quadrature (imaginary) part, one column per symbol.

use ndarray::{Array2, ArrayView2};

use crate::error::{ChannelError, ChannelResult};

/// Convert dBm to linear Watts
#[inline]
pub fn dbm_to_watts(p_dbm: f64) -> f64 {
    10.0_f64.powf(p_dbm / 10.0) / 1000.0
}

/// Convert linear Watts to dBm
#[inline]
pub fn watts_to_dbm(p_watts: f64) -> f64 {
    10.0 * (p_watts * 1000.0).log10()
}

pub(crate) fn check_iq_rows(batch: &ArrayView2<f64>) -> ChannelResult<()> {
    if batch.nrows() != 2 {
        return Err(ChannelError::ShapeMismatch {
            expected: 2,
            actual: batch.nrows(),
        });
    }
    Ok(())
}

/// Mean squared magnitude per symbol across the batch
pub fn average_energy(batch: ArrayView2<f64>) -> ChannelResult<f64> {
    check_iq_rows(&batch)?;
    let n = batch.ncols();
    if n == 0 {
        return Err(ChannelError::NumericInstability(
            "average energy of an empty batch".into(),
        ));
    }
    Ok(batch.iter().map(|x| x * x).sum::<f64>() / n as f64)
}

/// A normalized batch together with the scale it was divided by
#[derive(Debug, Clone)]
pub struct Normalized {
    pub symbols: Array2<f64>,
    pub norm: f64,
}

/// Rescale the whole batch to unit average energy per symbol.
///
/// The scale is shared by every column, so all symbols in the batch are
/// coupled through it.
pub fn normalize(batch: ArrayView2<f64>) -> ChannelResult<Normalized> {
    let energy = average_energy(batch)?;
    let norm = energy.sqrt();
    if !norm.is_finite() || norm <= f64::MIN_POSITIVE {
        return Err(ChannelError::NumericInstability(format!(
            "cannot normalize batch with average energy {}",
            energy
        )));
    }
    Ok(Normalized {
        symbols: &batch / norm,
        norm,
    })
}

/// Adjoint of [`normalize`]: maps a gradient w.r.t. the normalized symbols
/// back to a gradient w.r.t. the raw batch.
///
/// With `y = x / p` and `p = sqrt(Σx² / N)`:
/// `∂L/∂x = (g - y · Σ(g ⊙ y) / N) / p`
pub fn normalize_backward(grad: ArrayView2<f64>, normalized: &Normalized) -> Array2<f64> {
    let y = &normalized.symbols;
    let n = y.ncols() as f64;
    let projection = (&grad * y).sum() / n;
    (&grad - &(y * projection)) / normalized.norm
}

/// Scale unit-energy symbols to `p_dbm` average launch power
pub fn apply_power(batch: ArrayView2<f64>, p_dbm: f64) -> ChannelResult<Array2<f64>> {
    check_iq_rows(&batch)?;
    if !p_dbm.is_finite() {
        return Err(ChannelError::InvalidParameter(format!(
            "launch power must be finite, got {} dBm",
            p_dbm
        )));
    }
    Ok(&batch * dbm_to_watts(p_dbm).sqrt())
}

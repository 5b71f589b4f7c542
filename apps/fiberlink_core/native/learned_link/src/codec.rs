//! Uniform mid-rise quantizer for the feedback link
//!
//! A `b`-bit codec splits (0, 1) into `2^b` equal intervals:
//!
//! ```text
//! partition[i] = (i + 1) / 2^b          i = 0 .. 2^b − 2
//! codebook[i]  = i / 2^b + 0.5 / 2^b    i = 0 .. 2^b − 1
//! ```
//!
//! Indices travel over the link as `b` bits each, least significant first.

use ndarray::{Array2, ArrayView2};

use crate::config::MAX_FEEDBACK_BITS;
use crate::error::{LinkError, LinkResult};

/// Thresholds between adjacent quantization levels
pub(crate) fn uniform_partition(num_bits: u32) -> Vec<f64> {
    let levels = 1u64 << num_bits;
    (1..levels).map(|i| i as f64 / levels as f64).collect()
}

/// Reconstruction value (interval midpoint) of every level
pub(crate) fn uniform_codebook(num_bits: u32) -> Vec<f64> {
    let levels = 1u64 << num_bits;
    let half_step = 0.5 / levels as f64;
    (0..levels).map(|i| i as f64 / levels as f64 + half_step).collect()
}

/// Level index of each value: the number of thresholds it exceeds
pub fn quantize(values: &[f64], partition: &[f64]) -> Vec<u32> {
    values
        .iter()
        .map(|&v| partition.iter().filter(|&&t| v > t).count() as u32)
        .collect()
}

/// Codebook lookup
pub fn dequantize(indices: &[u32], codebook: &[f64]) -> LinkResult<Vec<f64>> {
    indices
        .iter()
        .map(|&i| {
            codebook
                .get(i as usize)
                .copied()
                .ok_or_else(|| LinkError::shape("quantization index", codebook.len(), i as usize))
        })
        .collect()
}

/// `N × b` bit matrix, column `k` holding bit `k` of each index
pub(crate) fn to_bits(indices: &[u32], num_bits: u32) -> Array2<u8> {
    Array2::from_shape_fn((indices.len(), num_bits as usize), |(row, bit)| {
        ((indices[row] >> bit) & 1) as u8
    })
}

/// Inverse of [`to_bits`]
pub(crate) fn from_bits(bits: ArrayView2<u8>) -> Vec<u32> {
    bits.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold(0u32, |acc, (bit, &b)| acc | (u32::from(b & 1) << bit))
        })
        .collect()
}

/// Partition and codebook for one resolution
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizationCodec {
    num_bits: u32,
    partition: Vec<f64>,
    codebook: Vec<f64>,
}

impl QuantizationCodec {
    pub fn new(num_bits: u32) -> LinkResult<Self> {
        if num_bits == 0 || num_bits > MAX_FEEDBACK_BITS {
            return Err(LinkError::Configuration(format!(
                "codec needs 1..={} bits, got {}",
                MAX_FEEDBACK_BITS, num_bits
            )));
        }
        Ok(Self {
            num_bits,
            partition: uniform_partition(num_bits),
            codebook: uniform_codebook(num_bits),
        })
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    pub fn levels(&self) -> usize {
        self.codebook.len()
    }

    /// Width of one quantization interval
    pub fn step(&self) -> f64 {
        1.0 / self.levels() as f64
    }

    pub fn partition(&self) -> &[f64] {
        &self.partition
    }

    pub fn codebook(&self) -> &[f64] {
        &self.codebook
    }

    pub fn quantize(&self, values: &[f64]) -> Vec<u32> {
        quantize(values, &self.partition)
    }

    pub fn dequantize(&self, indices: &[u32]) -> LinkResult<Vec<f64>> {
        dequantize(indices, &self.codebook)
    }

    pub fn to_bits(&self, indices: &[u32]) -> Array2<u8> {
        to_bits(indices, self.num_bits)
    }

    pub fn from_bits(&self, bits: ArrayView2<u8>) -> LinkResult<Vec<u32>> {
        if bits.ncols() != self.num_bits as usize {
            return Err(LinkError::shape("bits per index", self.num_bits as usize, bits.ncols()));
        }
        Ok(from_bits(bits))
    }

    /// quantize → bits → indices → dequantize
    pub fn round_trip(&self, values: &[f64]) -> LinkResult<Vec<f64>> {
        let indices = self.quantize(values);
        let bits = self.to_bits(&indices);
        let received = self.from_bits(bits.view())?;
        self.dequantize(&received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_for_two_bits() {
        assert_eq!(uniform_partition(2), vec![0.25, 0.5, 0.75]);
        assert_eq!(uniform_codebook(2), vec![0.125, 0.375, 0.625, 0.875]);
    }

    #[test]
    fn test_table_sizes() {
        for bits in 1..=8 {
            let codec = QuantizationCodec::new(bits).unwrap();
            assert_eq!(codec.partition().len(), (1 << bits) - 1);
            assert_eq!(codec.codebook().len(), 1 << bits);
            assert!(codec.codebook().iter().all(|&c| c > 0.0 && c < 1.0));
        }
    }

    #[test]
    fn test_quantize_counts_exceeded_thresholds() {
        let partition = uniform_partition(2);
        let indices = quantize(&[0.0, 0.25, 0.26, 0.5, 0.74, 0.9, 1.0], &partition);
        assert_eq!(indices, vec![0, 0, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn test_reconstruction_within_one_step() {
        for bits in 1..=10 {
            let codec = QuantizationCodec::new(bits).unwrap();
            let values: Vec<f64> = (0..=1000).map(|i| i as f64 / 1000.0).collect();
            let restored = codec.dequantize(&codec.quantize(&values)).unwrap();
            for (x, y) in values.iter().zip(&restored) {
                assert!(
                    (x - y).abs() <= codec.step(),
                    "bits={} x={} y={}",
                    bits,
                    x,
                    y
                );
            }
        }
    }

    #[test]
    fn test_bits_round_trip_all_indices() {
        for bits in 1..=10u32 {
            let indices: Vec<u32> = (0..(1u32 << bits)).collect();
            let matrix = to_bits(&indices, bits);
            assert_eq!(matrix.dim(), (indices.len(), bits as usize));
            assert_eq!(from_bits(matrix.view()), indices);
        }
    }

    #[test]
    fn test_bit_order_is_lsb_first() {
        let matrix = to_bits(&[6], 3);
        assert_eq!(matrix.row(0).to_vec(), vec![0, 1, 1]);
    }

    #[test]
    fn test_round_trip_equals_direct_composition() {
        let codec = QuantizationCodec::new(3).unwrap();
        let values = vec![0.0, 0.1, 0.33, 0.5, 0.51, 0.99, 1.0];
        let direct = codec.dequantize(&codec.quantize(&values)).unwrap();
        let via_bits = codec.round_trip(&values).unwrap();
        assert_eq!(direct, via_bits);
        // Idempotent: reconstruction values map back onto themselves
        assert_eq!(codec.round_trip(&via_bits).unwrap(), via_bits);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(matches!(
            QuantizationCodec::new(0),
            Err(LinkError::Configuration(_))
        ));
        for bits in [17, 32, 40, 64, u32::MAX] {
            assert!(matches!(
                QuantizationCodec::new(bits),
                Err(LinkError::Configuration(_))
            ));
        }
        let codec = QuantizationCodec::new(2).unwrap();
        assert!(codec.dequantize(&[4]).is_err());
        let wrong_width = Array2::<u8>::zeros((3, 5));
        assert!(codec.from_bits(wrong_width.view()).is_err());
    }
}

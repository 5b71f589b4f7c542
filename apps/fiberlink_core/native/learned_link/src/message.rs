//! Messages and their one-hot batches
//!
//! Batches are column-major in meaning: an `M × N` matrix holds one
//! one-hot column per sample. Column `j` of [`one_hot_labels`] is message
//! `j + 1`.

use ndarray::{concatenate, Array2, ArrayView2, Axis};

use crate::error::{LinkError, LinkResult};

/// A message in `1..=M`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Message(u32);

impl Message {
    pub fn new(value: u32, m: usize) -> LinkResult<Self> {
        if value == 0 || value as usize > m {
            return Err(LinkError::Configuration(format!(
                "message {} outside 1..={}",
                value, m
            )));
        }
        Ok(Message(value))
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        Message(index as u32 + 1)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }
}

/// `M × M` identity: one column per message, in order
pub fn one_hot_labels(m: usize) -> Array2<f64> {
    Array2::eye(m)
}

/// Repeat a label block `reps` times along the sample axis
pub fn tile_columns(labels: ArrayView2<f64>, reps: usize) -> LinkResult<Array2<f64>> {
    if reps == 0 {
        return Err(LinkError::shape("tile repetitions", 1, 0));
    }
    let views = vec![labels; reps];
    concatenate(Axis(1), &views).map_err(|_| LinkError::shape("tiled batch", labels.nrows(), 0))
}

/// `reps` full sweeps over the alphabet: `M × (M·reps)`
pub fn message_sweeps(m: usize, reps: usize) -> LinkResult<Array2<f64>> {
    tile_columns(one_hot_labels(m).view(), reps)
}

/// Index of the largest entry in each column
pub fn argmax_columns(batch: ArrayView2<f64>) -> Vec<usize> {
    batch
        .columns()
        .into_iter()
        .map(|column| {
            column
                .iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |best, (i, &p)| {
                    if p > best.1 {
                        (i, p)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

/// Decode one-hot (or probability) columns into messages
pub fn labels_to_messages(batch: ArrayView2<f64>) -> Vec<Message> {
    argmax_columns(batch)
        .into_iter()
        .map(Message::from_index)
        .collect()
}

/// Check that a batch holds whole sweeps of an `m`-message alphabet
pub fn check_whole_sweeps(columns: usize, m: usize) -> LinkResult<usize> {
    if columns == 0 || columns % m != 0 {
        return Err(LinkError::shape(
            "sweep-aligned batch width",
            (columns / m).max(1) * m,
            columns,
        ));
    }
    Ok(columns / m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_has_single_active_entry() {
        let labels = one_hot_labels(16);
        for (j, column) in labels.columns().into_iter().enumerate() {
            assert_eq!(column.sum(), 1.0);
            assert_eq!(column[j], 1.0);
        }
    }

    #[test]
    fn test_message_indexing() {
        let msg = Message::from_index(0);
        assert_eq!(msg.value(), 1);
        assert_eq!(msg.index(), 0);
        assert_eq!(Message::new(16, 16).unwrap().index(), 15);
        assert!(Message::new(0, 16).is_err());
        assert!(Message::new(17, 16).is_err());
    }

    #[test]
    fn test_tile_and_decode() {
        let batch = message_sweeps(4, 3).unwrap();
        assert_eq!(batch.dim(), (4, 12));
        let decoded: Vec<u32> = labels_to_messages(batch.view())
            .into_iter()
            .map(Message::value)
            .collect();
        assert_eq!(decoded, vec![1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn test_whole_sweep_check() {
        assert_eq!(check_whole_sweeps(64, 16).unwrap(), 4);
        assert!(matches!(
            check_whole_sweeps(65, 16),
            Err(LinkError::ShapeMismatch { expected: 64, actual: 65, .. })
        ));
        assert!(check_whole_sweeps(0, 16).is_err());
    }
}

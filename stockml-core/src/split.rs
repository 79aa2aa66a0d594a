//! Seeded, shuffled train/test partitioning.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::DesignMatrix;

pub const MIN_TEST_PERCENT: u32 = 10;
pub const MAX_TEST_PERCENT: u32 = 40;
pub const DEFAULT_TEST_PERCENT: u32 = 20;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("test fraction {0} outside 0.10..=0.40")]
    FractionOutOfRange(f64),

    #[error("need at least 2 rows to split, got {0}")]
    TooFewRows(usize),

    #[error("a {test} / {train} split leaves one side empty")]
    EmptySide { train: usize, test: usize },
}

/// Share of rows held out for testing, always within 0.10..=0.40.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestFraction(f64);

impl TestFraction {
    pub fn from_fraction(fraction: f64) -> Result<Self, SplitError> {
        let lo = MIN_TEST_PERCENT as f64 / 100.0;
        let hi = MAX_TEST_PERCENT as f64 / 100.0;
        if !(lo - 1e-12..=hi + 1e-12).contains(&fraction) {
            return Err(SplitError::FractionOutOfRange(fraction));
        }
        Ok(Self(fraction))
    }

    pub fn from_percent(percent: u32) -> Result<Self, SplitError> {
        Self::from_fraction(percent as f64 / 100.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `ceil(fraction * n)`, tolerant of float noise such as 0.2 * 100.
    pub fn test_size(self, n: usize) -> usize {
        let raw = self.0 * n as f64;
        (raw - 1e-9).ceil().max(0.0) as usize
    }
}

impl Default for TestFraction {
    fn default() -> Self {
        Self(DEFAULT_TEST_PERCENT as f64 / 100.0)
    }
}

/// Positions `0..n` partitioned into (train, test). The permutation comes
/// from a `StdRng` seeded with `seed`; its first `test_size` entries are the
/// test set.
pub fn split_indices(
    n: usize,
    fraction: TestFraction,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), SplitError> {
    if n < 2 {
        return Err(SplitError::TooFewRows(n));
    }
    let n_test = fraction.test_size(n);
    if n_test == 0 || n_test >= n {
        return Err(SplitError::EmptySide {
            train: n.saturating_sub(n_test),
            test: n_test,
        });
    }
    let mut perm: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    perm.shuffle(&mut rng);
    let train = perm.split_off(n_test);
    Ok((train, perm))
}

/// The four partitioned arrays plus the table rows behind each side.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub train_index: Vec<usize>,
    pub test_index: Vec<usize>,
    pub feature_names: Vec<String>,
    pub target: String,
    pub seed: u64,
    pub fraction: TestFraction,
}

impl TrainTestSplit {
    pub fn n_train(&self) -> usize {
        self.train_index.len()
    }

    pub fn n_test(&self) -> usize {
        self.test_index.len()
    }
}

/// Partition a design matrix. Index vectors refer to the source table rows.
pub fn train_test_split(
    data: &DesignMatrix,
    fraction: TestFraction,
    seed: u64,
) -> Result<TrainTestSplit, SplitError> {
    let (train_pos, test_pos) = split_indices(data.n_samples(), fraction, seed)?;
    Ok(TrainTestSplit {
        x_train: data.x.select(Axis(0), &train_pos),
        x_test: data.x.select(Axis(0), &test_pos),
        y_train: data.y.select(Axis(0), &train_pos),
        y_test: data.y.select(Axis(0), &test_pos),
        train_index: train_pos.iter().map(|&p| data.row_index[p]).collect(),
        test_index: test_pos.iter().map(|&p| data.row_index[p]).collect(),
        feature_names: data.feature_names.clone(),
        target: data.target.clone(),
        seed,
        fraction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_bounds() {
        assert!(TestFraction::from_percent(9).is_err());
        assert!(TestFraction::from_percent(41).is_err());
        assert!(TestFraction::from_percent(10).is_ok());
        assert!(TestFraction::from_percent(40).is_ok());
    }

    #[test]
    fn test_size_is_ceiling() {
        let f = TestFraction::from_percent(20).unwrap();
        assert_eq!(f.test_size(100), 20);
        assert_eq!(f.test_size(7), 2);
        let f = TestFraction::from_percent(30).unwrap();
        assert_eq!(f.test_size(10), 3);
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let (train, test) = split_indices(50, TestFraction::default(), 7).unwrap();
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
        assert_eq!(test.len(), 10);
    }

    #[test]
    fn too_few_rows() {
        assert_eq!(
            split_indices(1, TestFraction::default(), 0),
            Err(SplitError::TooFewRows(1))
        );
    }

    #[test]
    fn seed_changes_partition() {
        let a = split_indices(100, TestFraction::default(), 1).unwrap();
        let b = split_indices(100, TestFraction::default(), 2).unwrap();
        assert_ne!(a.1, b.1);
    }
}

//! K-nearest neighbours with Euclidean distance and uniform weights.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1, Axis};

use super::{check_fit_input, check_predict_input, Estimator, ModelError};

pub const DEFAULT_K: usize = 5;
pub const MAX_K: usize = 50;

/// Stored training set shared by both KNN flavours.
#[derive(Debug, Clone, PartialEq)]
struct Neighbours {
    k: usize,
    x: Option<Array2<f64>>,
    y: Option<Array1<f64>>,
}

impl Neighbours {
    fn new(k: usize) -> Self {
        Self { k, x: None, y: None }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        if self.k == 0 || self.k > MAX_K {
            return Err(ModelError::InvalidK {
                k: self.k,
                max: MAX_K,
            });
        }
        check_fit_input(x, y, 1)?;
        if self.k > x.nrows() {
            return Err(ModelError::KExceedsSamples {
                k: self.k,
                n: x.nrows(),
            });
        }
        self.x = Some(x.clone());
        self.y = Some(y.clone());
        Ok(())
    }

    /// Target values of the k nearest training rows for each query row.
    /// Equal distances keep training order.
    fn neighbour_targets(&self, query: &Array2<f64>) -> Result<Vec<Vec<f64>>, ModelError> {
        let (x, y) = match (&self.x, &self.y) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(ModelError::NotFitted),
        };
        check_predict_input(query, x.ncols())?;

        Ok(query
            .axis_iter(Axis(0))
            .map(|sample| {
                let mut distances: Vec<(usize, f64)> = x
                    .axis_iter(Axis(0))
                    .enumerate()
                    .map(|(i, row)| (i, euclidean(sample, row)))
                    .collect();
                distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                distances.iter().take(self.k).map(|&(i, _)| y[i]).collect()
            })
            .collect())
    }
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(p, q)| (p - q).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Mean of the neighbours' targets.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnRegressor(Neighbours);

impl KnnRegressor {
    pub fn new(k: usize) -> Self {
        Self(Neighbours::new(k))
    }

    pub fn k(&self) -> usize {
        self.0.k
    }
}

impl Estimator for KnnRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        self.0.fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self
            .0
            .neighbour_targets(x)?
            .into_iter()
            .map(|t| t.iter().sum::<f64>() / t.len() as f64)
            .collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.0.x.as_ref().map(|x| x.ncols())
    }
}

/// Majority vote; a tied vote goes to the smallest label.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnClassifier(Neighbours);

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self(Neighbours::new(k))
    }

    pub fn k(&self) -> usize {
        self.0.k
    }
}

fn majority(labels: &[f64]) -> f64 {
    let mut votes: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for &label in labels {
        let key = ordered_key(label);
        votes.entry(key).or_insert((label, 0)).1 += 1;
    }
    let mut best: Option<(f64, usize)> = None;
    for (label, count) in votes.into_values() {
        match best {
            Some((_, c)) if c >= count => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label).unwrap_or(f64::NAN)
}

/// Total order on f64 as an i64 key: ascending keys mean ascending values.
fn ordered_key(v: f64) -> i64 {
    let v = if v == 0.0 { 0.0 } else { v };
    let bits = v.to_bits() as i64;
    if bits < 0 {
        bits ^ i64::MAX
    } else {
        bits
    }
}

impl Estimator for KnnClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        self.0.fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self
            .0
            .neighbour_targets(x)?
            .iter()
            .map(|t| majority(t))
            .collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.0.x.as_ref().map(|x| x.ncols())
    }
}

//! L2-regularized logistic regression fitted by batch gradient descent.
//!
//! Features are standardized internally before descent; the learned weights
//! are mapped back to raw units so `coefficients()` and `intercept()` read
//! like an ordinary linear model. Two classes train one binary model; more
//! classes train one model per class (one-vs-rest).

use ndarray::{Array1, Array2, Axis};

use super::{check_fit_input, check_predict_input, distinct_sorted, Estimator, ModelError};

/// Inverse regularization strength, matching the usual `C = 1.0`.
pub const DEFAULT_C: f64 = 1.0;
pub const DEFAULT_MAX_ITER: usize = 1000;
const LEARNING_RATE: f64 = 0.5;
const TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    c: f64,
    max_iter: usize,
    classes: Vec<f64>,
    /// One row per binary model, raw feature units.
    weights: Option<Array2<f64>>,
    intercepts: Option<Array1<f64>>,
    iterations: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(DEFAULT_C, DEFAULT_MAX_ITER)
    }
}

impl LogisticRegression {
    pub fn new(c: f64, max_iter: usize) -> Self {
        Self {
            c,
            max_iter,
            classes: Vec::new(),
            weights: None,
            intercepts: None,
            iterations: 0,
        }
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Coefficient rows: one for a binary problem, one per class otherwise.
    pub fn coefficients(&self) -> Option<&Array2<f64>> {
        self.weights.as_ref()
    }

    pub fn intercepts(&self) -> Option<&Array1<f64>> {
        self.intercepts.as_ref()
    }

    /// Gradient-descent iterations used by the slowest binary model.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let exp_z = z.exp();
            exp_z / (1.0 + exp_z)
        }
    }

    /// Fit one binary model on standardized features. Returns (w, b, iterations).
    fn fit_binary(&self, z: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64, usize) {
        let n = z.nrows() as f64;
        let lambda = 1.0 / (self.c * n);
        let mut w = Array1::<f64>::zeros(z.ncols());
        let mut b = 0.0;

        for iter in 0..self.max_iter {
            let p = (z.dot(&w) + b).mapv(Self::sigmoid);
            let err = &p - y;
            let dw = z.t().dot(&err) / n + &w * lambda;
            let db = err.sum() / n;

            w = &w - &(&dw * LEARNING_RATE);
            b -= LEARNING_RATE * db;

            let step = dw.iter().map(|g| g * g).sum::<f64>() + db * db;
            if step.sqrt() < TOLERANCE {
                return (w, b, iter + 1);
            }
        }
        (w, b, self.max_iter)
    }

    fn decision(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        let (w, b) = match (&self.weights, &self.intercepts) {
            (Some(w), Some(b)) => (w, b),
            _ => return Err(ModelError::NotFitted),
        };
        check_predict_input(x, w.ncols())?;
        Ok(x.dot(&w.t()) + b)
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        check_fit_input(x, y, 2)?;
        let classes = distinct_sorted(y.iter().copied());
        if classes.len() < 2 {
            return Err(ModelError::SingleClass);
        }

        let mean = x.mean_axis(Axis(0)).ok_or(ModelError::TooFewSamples {
            needed: 2,
            got: 0,
        })?;
        let std = x.std_axis(Axis(0), 0.0).mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        let z = (x - &mean) / &std;

        let targets: Vec<f64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        let mut weights = Array2::<f64>::zeros((targets.len(), x.ncols()));
        let mut intercepts = Array1::<f64>::zeros(targets.len());
        let mut iterations = 0;
        for (row, &positive) in targets.iter().enumerate() {
            let labels = y.mapv(|v| if v == positive { 1.0 } else { 0.0 });
            let (w, b, iters) = self.fit_binary(&z, &labels);
            iterations = iterations.max(iters);
            // Undo the standardization: w·(x - μ)/σ + b = (w/σ)·x + (b - Σ wμ/σ)
            let raw_w = &w / &std;
            intercepts[row] = b - raw_w.dot(&mean);
            weights.row_mut(row).assign(&raw_w);
        }

        self.classes = classes;
        self.weights = Some(weights);
        self.intercepts = Some(intercepts);
        self.iterations = iterations;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let scores = self.decision(x)?;
        let labels = scores
            .axis_iter(Axis(0))
            .map(|row| {
                if self.classes.len() == 2 {
                    if row[0] >= 0.0 {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    }
                } else {
                    let best = row
                        .iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |acc, (i, &s)| {
                            if s > acc.1 {
                                (i, s)
                            } else {
                                acc
                            }
                        })
                        .0;
                    self.classes[best]
                }
            })
            .collect();
        Ok(labels)
    }

    fn n_features(&self) -> Option<usize> {
        self.weights.as_ref().map(|w| w.ncols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn separates_two_classes() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.classes(), &[0.0, 1.0]);
        assert!(model.coefficients().unwrap()[[0, 0]] > 0.0);
        assert_eq!(model.predict(&array![[0.0], [20.0]]).unwrap(), array![0.0, 1.0]);
    }

    #[test]
    fn one_vs_rest_for_three_classes() {
        let x = array![[0.0], [0.5], [5.0], [5.5], [10.0], [10.5]];
        let y = array![1.0, 1.0, 2.0, 2.0, 3.0, 3.0];
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.coefficients().unwrap().nrows(), 3);
        let pred = model.predict(&array![[0.0], [10.5]]).unwrap();
        assert_eq!(pred, array![1.0, 3.0]);
    }

    #[test]
    fn single_class_is_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let mut model = LogisticRegression::default();
        assert_eq!(model.fit(&x, &y), Err(ModelError::SingleClass));
    }
}

//! Ordinary least squares.
//!
//! The intercept is handled by centring X and y, then the normal equations
//! `(XcᵀXc) β = Xcᵀyc` are solved with Cholesky. If the Gram matrix is not
//! positive definite the solve falls back to Gaussian elimination with
//! partial pivoting; a zero pivot there means the system is singular.

use ndarray::{Array1, Array2, Axis};

use super::{check_fit_input, check_predict_input, Estimator, ModelError};

const PIVOT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearRegression {
    coefficients: Option<Array1<f64>>,
    intercept: Option<f64>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> Option<f64> {
        self.intercept
    }
}

impl Estimator for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        check_fit_input(x, y, 1)?;

        let x_mean = x.mean_axis(Axis(0)).ok_or(ModelError::TooFewSamples {
            needed: 1,
            got: 0,
        })?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let gram = xc.t().dot(&xc);
        let rhs = xc.t().dot(&yc);
        let beta = match cholesky_solve(&gram, &rhs) {
            Some(beta) => beta,
            None => gaussian_solve(&gram, &rhs)?,
        };
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(ModelError::SingularMatrix);
        }

        self.intercept = Some(y_mean - x_mean.dot(&beta));
        self.coefficients = Some(beta);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let (coef, intercept) = match (&self.coefficients, self.intercept) {
            (Some(c), Some(b)) => (c, b),
            _ => return Err(ModelError::NotFitted),
        };
        check_predict_input(x, coef.len())?;
        Ok(x.dot(coef) + intercept)
    }

    fn n_features(&self) -> Option<usize> {
        self.coefficients.as_ref().map(|c| c.len())
    }
}

/// Solve `A x = b` for symmetric positive-definite `A`. `None` when a
/// diagonal entry of the factor is not positive.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let scale = (0..n).map(|i| a[[i, i]].abs()).fold(0.0, f64::max).max(1.0);
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= PIVOT_TOLERANCE * scale {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }
    Some(x)
}

fn gaussian_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
    let n = a.nrows();
    let mut m = a.clone();
    let mut rhs = b.clone();
    let scale = m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())).max(1.0);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r, &s| m[[r, col]].abs().total_cmp(&m[[s, col]].abs()))
            .unwrap_or(col);
        if m[[pivot_row, col]].abs() <= PIVOT_TOLERANCE * scale {
            return Err(ModelError::SingularMatrix);
        }
        if pivot_row != col {
            for k in 0..n {
                m.swap([col, k], [pivot_row, k]);
            }
            rhs.swap(col, pivot_row);
        }
        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n {
            sum -= m[[i, j]] * x[j];
        }
        x[i] = sum / m[[i, i]];
    }
    Ok(x)
}

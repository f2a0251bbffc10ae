use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeechError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeParams {
    pub alpha: f64,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self { alpha: 10.0 }
    }
}

/// L2-penalized least squares with an unpenalized intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl RidgeRegression {
    pub fn fit(x: ArrayView2<f64>, y: &[f64], params: &RidgeParams) -> Result<Self> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(SpeechError::invalid_dataset(format!(
                "ridge needs matching non-empty inputs, got {} rows and {} targets",
                x.nrows(),
                y.len()
            )));
        }
        let y = ArrayView1::from(y);
        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let y_mean = y.mean().unwrap_or(0.0);
        let centered = &x - &x_mean;
        let y_centered = &y - y_mean;

        let mut gram = centered.t().dot(&centered);
        gram.diag_mut().mapv_inplace(|v| v + params.alpha);
        let rhs = centered.t().dot(&y_centered);
        let coefficients = solve(gram, rhs)?;
        let intercept = y_mean - x_mean.dot(&coefficients);
        Ok(Self {
            coefficients: coefficients.to_vec(),
            intercept,
        })
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.intercept + ArrayView1::from(&self.coefficients[..]).dot(&row)
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(SpeechError::invalid_dataset(
                "ridge normal equations are singular",
            ));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

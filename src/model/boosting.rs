use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{MaxFeatures, RegressionTree, TreeParams};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub n_stages: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: f64,
    pub subsample: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_stages: 150,
            max_depth: 3,
            min_samples_split: 10,
            min_samples_leaf: 5,
            learning_rate: 0.05,
            subsample: 0.8,
        }
    }
}

/// Least-squares gradient boosting: each stage fits a tree to the current residuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit(x: ArrayView2<f64>, y: &[f64], params: &BoostingParams, seed: u64) -> Self {
        let n = x.nrows();
        let init = if n == 0 {
            0.0
        } else {
            y.iter().sum::<f64>() / n as f64
        };
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: MaxFeatures::All,
        };
        let sample_size = ((params.subsample * n as f64) as usize).clamp(1.min(n), n);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut current = vec![init; n];
        let mut stages = Vec::with_capacity(params.n_stages);
        let mut rows: Vec<usize> = (0..n).collect();
        for _ in 0..params.n_stages {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            rows.shuffle(&mut rng);
            let tree = RegressionTree::fit(x, &residuals, &rows[..sample_size], tree_params, &mut rng);
            for (prediction, row) in current.iter_mut().zip(x.rows()) {
                *prediction += params.learning_rate * tree.predict_row(row);
            }
            stages.push(tree);
        }
        Self {
            init,
            learning_rate: params.learning_rate,
            stages,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.init
            + self.learning_rate
                * self
                    .stages
                    .iter()
                    .map(|tree| tree.predict_row(row))
                    .sum::<f64>()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.stages.first().map(RegressionTree::n_features)
    }

    pub fn feature_importances(&self) -> Vec<f64> {
        super::average_importances(&self.stages)
    }
}

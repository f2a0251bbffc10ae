use std::collections::BTreeMap;

use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::schema::Target;

/// Held-out and in-sample errors of a training run, stored as `training_metrics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub train_mae: f64,
    pub test_mae: f64,
    pub train_rmse: f64,
    pub test_rmse: f64,
    pub train_r2: f64,
    pub test_r2: f64,
    /// `<target>_mae` and `<target>_r2` on the test partition.
    #[serde(flatten)]
    pub per_target: BTreeMap<String, f64>,
}

impl TrainingMetrics {
    pub fn compute(
        y_train: ArrayView2<f64>,
        pred_train: ArrayView2<f64>,
        y_test: ArrayView2<f64>,
        pred_test: ArrayView2<f64>,
    ) -> Self {
        let mut per_target = BTreeMap::new();
        for target in Target::ALL {
            let axis = Axis(1);
            let (truth, predicted) = (
                y_test.index_axis(axis, target.index()),
                pred_test.index_axis(axis, target.index()),
            );
            per_target.insert(format!("{}_mae", target.name()), mae(truth, predicted));
            per_target.insert(format!("{}_r2", target.name()), r2(truth, predicted));
        }
        Self {
            train_mae: averaged(y_train, pred_train, mae),
            test_mae: averaged(y_test, pred_test, mae),
            train_rmse: averaged(y_train, pred_train, mse).sqrt(),
            test_rmse: averaged(y_test, pred_test, mse).sqrt(),
            train_r2: averaged(y_train, pred_train, r2),
            test_r2: averaged(y_test, pred_test, r2),
            per_target,
        }
    }

    pub fn target_mae(&self, target: Target) -> Option<f64> {
        self.per_target.get(&format!("{}_mae", target.name())).copied()
    }

    pub fn target_r2(&self, target: Target) -> Option<f64> {
        self.per_target.get(&format!("{}_r2", target.name())).copied()
    }
}

/// Uniform average of a per-column metric.
fn averaged(
    truth: ArrayView2<f64>,
    predicted: ArrayView2<f64>,
    metric: fn(ArrayView1<f64>, ArrayView1<f64>) -> f64,
) -> f64 {
    let columns = truth.ncols();
    if columns == 0 {
        return 0.0;
    }
    truth
        .columns()
        .into_iter()
        .zip(predicted.columns())
        .map(|(t, p)| metric(t, p))
        .sum::<f64>()
        / columns as f64
}

pub fn mae(truth: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    (&truth - &predicted).mapv(f64::abs).mean().unwrap_or(0.0)
}

pub fn mse(truth: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    (&truth - &predicted).mapv(|d| d * d).mean().unwrap_or(0.0)
}

/// Coefficient of determination; a constant truth scores 1.0 when matched exactly, else 0.0.
pub fn r2(truth: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let Some(mean) = truth.mean() else {
        return 0.0;
    };
    let ss_res: f64 = truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

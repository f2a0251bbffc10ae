//! Multi-target score regression: eight independent regressors of one family.

pub mod artifact;
mod boosting;
mod forest;
pub mod metrics;
mod ridge;
pub mod split;
mod tree;

use std::fmt::{Display, Formatter};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TrainingConfig;
use crate::error::{Result, SpeechError};
use crate::preprocessing::{target_matrix, FeaturePipeline};
use crate::schema::{Feature, FeatureRecord, ScoreVector, Target, TrainingSample, MAX_SCORE, MIN_SCORE};

pub use artifact::{ModelArtifact, ModelMetadata};
pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use metrics::TrainingMetrics;
pub use ridge::{RidgeParams, RidgeRegression};
pub use tree::RegressionTree;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ModelType {
    #[default]
    RandomForest,
    GradientBoosting,
    Ridge,
}

impl ModelType {
    pub fn name(self) -> &'static str {
        match self {
            ModelType::RandomForest => "random_forest",
            ModelType::GradientBoosting => "gradient_boosting",
            ModelType::Ridge => "ridge",
        }
    }

    pub fn supports_importance(self) -> bool {
        !matches!(self, ModelType::Ridge)
    }
}

impl Display for ModelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The fitted regressor for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum TargetEstimator {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    Ridge(RidgeRegression),
}

impl TargetEstimator {
    pub fn fit(model_type: ModelType, x: ArrayView2<f64>, y: &[f64], seed: u64) -> Result<Self> {
        Ok(match model_type {
            ModelType::RandomForest => {
                Self::RandomForest(RandomForest::fit(x, y, &ForestParams::default(), seed))
            }
            ModelType::GradientBoosting => Self::GradientBoosting(GradientBoosting::fit(
                x,
                y,
                &BoostingParams::default(),
                seed,
            )),
            ModelType::Ridge => Self::Ridge(RidgeRegression::fit(x, y, &RidgeParams::default())?),
        })
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            Self::RandomForest(_) => ModelType::RandomForest,
            Self::GradientBoosting(_) => ModelType::GradientBoosting,
            Self::Ridge(_) => ModelType::Ridge,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            Self::RandomForest(model) => model.predict_row(row),
            Self::GradientBoosting(model) => model.predict_row(row),
            Self::Ridge(model) => model.predict_row(row),
        }
    }

    /// Input width the estimator was fitted on, when it can tell.
    pub fn n_features(&self) -> Option<usize> {
        match self {
            Self::RandomForest(model) => model.n_features(),
            Self::GradientBoosting(model) => model.n_features(),
            Self::Ridge(model) => Some(model.n_features()),
        }
    }

    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            Self::RandomForest(model) => Some(model.feature_importances()),
            Self::GradientBoosting(model) => Some(model.feature_importances()),
            Self::Ridge(_) => None,
        }
    }
}

/// One estimator per target, indexed by [`Target::index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEnsemble {
    pub model_type: ModelType,
    pub estimators: [TargetEstimator; Target::COUNT],
}

impl ScoreEnsemble {
    pub fn new(model_type: ModelType, estimators: Vec<TargetEstimator>) -> Result<Self> {
        let count = estimators.len();
        let estimators: [TargetEstimator; Target::COUNT] =
            estimators.try_into().map_err(|_| SpeechError::DimensionMismatch {
                expected: Target::COUNT,
                actual: count,
            })?;
        Ok(Self {
            model_type,
            estimators,
        })
    }

    /// Fit every target column of `y` on `x`, targets in parallel.
    pub fn fit(
        model_type: ModelType,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
        seed: u64,
    ) -> Result<Self> {
        let estimators = (0..Target::COUNT)
            .into_par_iter()
            .map(|column| {
                let target = y.column(column).to_vec();
                TargetEstimator::fit(model_type, x, &target, seed)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(model_type, estimators)
    }

    pub fn predict_raw(&self, row: ArrayView1<f64>) -> [f64; Target::COUNT] {
        let mut raw = [0.0; Target::COUNT];
        for (slot, estimator) in raw.iter_mut().zip(&self.estimators) {
            *slot = estimator.predict_row(row);
        }
        raw
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> ScoreVector {
        to_scores(self.predict_raw(row))
    }

    /// Clamped, rounded scores for every row, as floats for metric computation.
    pub fn predict_matrix(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((x.nrows(), Target::COUNT));
        for (row, mut slot) in x.rows().into_iter().zip(out.rows_mut()) {
            let scores = self.predict_row(row);
            slot.assign(&Array1::from_iter(scores.as_array().iter().map(|&s| s as f64)));
        }
        out
    }

    /// Check every estimator was fitted on `n_features` columns and matches the ensemble family.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        for estimator in &self.estimators {
            if estimator.model_type() != self.model_type {
                return Err(SpeechError::invalid_dataset(format!(
                    "estimator of type {} inside a {} ensemble",
                    estimator.model_type(),
                    self.model_type
                )));
            }
            if let Some(actual) = estimator.n_features() {
                if actual != n_features {
                    return Err(SpeechError::DimensionMismatch {
                        expected: n_features,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }

    /// Per-feature importance averaged over the eight target estimators.
    pub fn feature_importances(&self) -> Result<Vec<f64>> {
        let mut total = vec![0.0; Feature::COUNT];
        for estimator in &self.estimators {
            let importances =
                estimator
                    .feature_importances()
                    .ok_or_else(|| SpeechError::UnsupportedOperation {
                        operation: "feature_importance",
                        model_type: self.model_type.to_string(),
                    })?;
            for (slot, value) in total.iter_mut().zip(importances) {
                *slot += value;
            }
        }
        total
            .iter_mut()
            .for_each(|v| *v /= Target::COUNT as f64);
        Ok(total)
    }
}

/// Clamp to the score range and round half away from zero.
pub fn to_score(prediction: f64) -> u8 {
    if prediction.is_nan() {
        return MIN_SCORE;
    }
    prediction
        .clamp(MIN_SCORE as f64, MAX_SCORE as f64)
        .round() as u8
}

pub fn to_scores(raw: [f64; Target::COUNT]) -> ScoreVector {
    ScoreVector::new(raw.map(to_score))
}

/// Mean of the per-tree importances, renormalized to sum to one.
fn average_importances(trees: &[RegressionTree]) -> Vec<f64> {
    let Some(width) = trees.first().map(|t| t.importances().len()) else {
        return Vec::new();
    };
    let mut total = vec![0.0; width];
    for tree in trees {
        for (slot, value) in total.iter_mut().zip(tree.importances()) {
            *slot += value;
        }
    }
    let sum: f64 = total.iter().sum();
    if sum > 0.0 {
        total.iter_mut().for_each(|v| *v /= sum);
    }
    total
}

/// Entry point for fitting a complete artifact from labelled samples.
pub struct ScoreModel;

impl ScoreModel {
    /// Fit encoder and medians on all samples, the scaler and regressors on the
    /// training partition, and score both partitions.
    pub fn train(
        samples: &[TrainingSample],
        config: &TrainingConfig,
    ) -> Result<(ModelArtifact, TrainingMetrics)> {
        config.validate()?;
        if samples.is_empty() {
            return Err(SpeechError::invalid_dataset("training set is empty"));
        }
        let targets = target_matrix(samples)?;
        let records: Vec<&FeatureRecord> = samples.iter().map(|s| &s.features).collect();

        let mut pipeline = FeaturePipeline::default();
        pipeline.fit_columns(&records)?;
        let raw = pipeline.design_matrix(&records)?;

        let partition = split::train_test_split(samples.len(), config.test_fraction, config.seed)?;
        let x_train_raw = raw.select(Axis(0), &partition.train);
        let x_test_raw = raw.select(Axis(0), &partition.test);
        let y_train = targets.select(Axis(0), &partition.train);
        let y_test = targets.select(Axis(0), &partition.test);

        pipeline.scaler.fit(&x_train_raw)?;
        let x_train = pipeline.scaler.transform(&x_train_raw)?;
        let x_test = pipeline.scaler.transform(&x_test_raw)?;
        debug!(
            train = partition.train.len(),
            test = partition.test.len(),
            categories = ?pipeline.encoder.classes(),
            "prepared training matrices"
        );

        let ensemble =
            ScoreEnsemble::fit(config.model_type, x_train.view(), y_train.view(), config.seed)?;
        let metrics = TrainingMetrics::compute(
            y_train.view(),
            ensemble.predict_matrix(x_train.view()).view(),
            y_test.view(),
            ensemble.predict_matrix(x_test.view()).view(),
        );
        info!(
            model_type = %config.model_type,
            samples = samples.len(),
            test_mae = metrics.test_mae,
            test_r2 = metrics.test_r2,
            "trained score model"
        );
        Ok((ModelArtifact::new(pipeline, ensemble), metrics))
    }
}

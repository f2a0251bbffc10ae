use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::ArrayView1;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{to_scores, ModelType, ScoreEnsemble, TrainingMetrics};
use crate::error::{Result, SpeechError};
use crate::preprocessing::{CategoryEncoder, FeaturePipeline, FeatureScaler};
use crate::schema::{Feature, FeatureRecord, ScoreVector, Target};

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const ENCODER_FILE: &str = "label_encoder.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const METRICS_FILE: &str = "training_metrics.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: ModelType,
    pub is_trained: bool,
}

/// Everything needed to turn a feature record into scores. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pipeline: FeaturePipeline,
    ensemble: Option<ScoreEnsemble>,
    metadata: ModelMetadata,
}

impl ModelArtifact {
    pub(crate) fn new(pipeline: FeaturePipeline, ensemble: ScoreEnsemble) -> Self {
        Self {
            metadata: ModelMetadata {
                model_type: ensemble.model_type,
                is_trained: true,
            },
            pipeline,
            ensemble: Some(ensemble),
        }
    }

    /// An artifact that refuses every prediction with [`SpeechError::NotTrained`].
    pub fn untrained(model_type: ModelType) -> Self {
        Self {
            pipeline: FeaturePipeline::default(),
            ensemble: None,
            metadata: ModelMetadata {
                model_type,
                is_trained: false,
            },
        }
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.metadata
    }

    pub fn model_type(&self) -> ModelType {
        self.metadata.model_type
    }

    pub fn is_trained(&self) -> bool {
        self.metadata.is_trained && self.ensemble.is_some()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.pipeline.scaler.feature_names
    }

    pub fn categories(&self) -> &[String] {
        self.pipeline.encoder.classes()
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    fn ensemble(&self) -> Result<&ScoreEnsemble> {
        match &self.ensemble {
            Some(ensemble) if self.metadata.is_trained => Ok(ensemble),
            _ => Err(SpeechError::NotTrained),
        }
    }

    /// Preprocess `record` with the frozen statistics and predict its scores.
    pub fn predict(&self, record: &FeatureRecord) -> Result<ScoreVector> {
        let ensemble = self.ensemble()?;
        let row = self.pipeline.transform_record(record)?;
        Ok(ensemble.predict_row(row.view()))
    }

    /// Predict from an already standardized feature vector.
    pub fn predict_vector(&self, row: ArrayView1<f64>) -> Result<ScoreVector> {
        Ok(to_scores(self.predict_raw(row)?))
    }

    /// Unclamped regressor outputs for a standardized vector.
    pub fn predict_raw(&self, row: ArrayView1<f64>) -> Result<[f64; Target::COUNT]> {
        let ensemble = self.ensemble()?;
        let expected = self.pipeline.scaler.n_features();
        if row.len() != expected {
            return Err(SpeechError::DimensionMismatch {
                expected,
                actual: row.len(),
            });
        }
        Ok(ensemble.predict_raw(row))
    }

    /// `(feature name, importance)` ranked by descending importance.
    pub fn feature_importance(&self) -> Result<Vec<(String, f64)>> {
        let ensemble = self.ensemble()?;
        let importances = ensemble.feature_importances()?;
        let mut ranked: Vec<(String, f64)> = self
            .feature_names()
            .iter()
            .cloned()
            .zip(importances)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        let ensemble = self.ensemble()?;
        fs::create_dir_all(dir).map_err(|err| SpeechError::artifact(dir, err.to_string()))?;
        write_json(&dir.join(MODEL_FILE), ensemble)?;
        write_json(&dir.join(SCALER_FILE), &self.pipeline.scaler)?;
        write_json(&dir.join(ENCODER_FILE), &self.pipeline.encoder)?;
        write_json(&dir.join(METADATA_FILE), &self.metadata)?;
        info!(dir = %dir.display(), model_type = %self.model_type(), "saved model artifact");
        Ok(())
    }

    /// Load and cross-check the four artifact files in `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let metadata: ModelMetadata = read_json(&dir.join(METADATA_FILE))?;
        if !metadata.is_trained {
            return Err(SpeechError::NotTrained);
        }
        let ensemble: ScoreEnsemble = read_json(&dir.join(MODEL_FILE))?;
        let scaler: FeatureScaler = read_json(&dir.join(SCALER_FILE))?;
        let encoder: CategoryEncoder = read_json(&dir.join(ENCODER_FILE))?;

        let expected: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        if scaler.feature_names != expected {
            return Err(SpeechError::artifact(
                dir.join(SCALER_FILE),
                format!("feature columns {:?} differ from {:?}", scaler.feature_names, expected),
            ));
        }
        if !scaler.is_fitted() || scaler.medians.len() != Feature::COUNT {
            return Err(SpeechError::artifact(
                dir.join(SCALER_FILE),
                "scaler statistics are incomplete",
            ));
        }
        if ensemble.model_type != metadata.model_type {
            return Err(SpeechError::artifact(
                dir.join(MODEL_FILE),
                format!(
                    "ensemble is {} but metadata says {}",
                    ensemble.model_type, metadata.model_type
                ),
            ));
        }
        ensemble
            .validate(scaler.n_features())
            .map_err(|err| SpeechError::artifact(dir.join(MODEL_FILE), err.to_string()))?;

        info!(dir = %dir.display(), model_type = %metadata.model_type, "loaded model artifact");
        Ok(Self {
            pipeline: FeaturePipeline::new(encoder, scaler),
            ensemble: Some(ensemble),
            metadata,
        })
    }
}

impl TrainingMetrics {
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        write_json(&dir.as_ref().join(METRICS_FILE), self)
    }

    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        read_json(&dir.as_ref().join(METRICS_FILE))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|err| SpeechError::artifact(path, err.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|err| SpeechError::artifact(path, err.to_string()))?;
    writer
        .flush()
        .map_err(|err| SpeechError::artifact(path, err.to_string()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| SpeechError::artifact(path, err.to_string()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| SpeechError::artifact(path, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use tempfile::tempdir;

    #[test]
    fn untrained_artifact_refuses_to_predict() {
        let artifact = ModelArtifact::untrained(ModelType::RandomForest);
        assert!(!artifact.is_trained());
        let err = artifact
            .predict_vector(Array1::zeros(Feature::COUNT).view())
            .unwrap_err();
        assert!(matches!(err, SpeechError::NotTrained));
        assert!(matches!(
            artifact.predict(&FeatureRecord::new()).unwrap_err(),
            SpeechError::NotTrained
        ));
    }

    #[test]
    fn missing_files_are_artifact_errors() {
        let dir = tempdir().unwrap();
        let err = ModelArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, SpeechError::Artifact { .. }));
    }

    #[test]
    fn untrained_metadata_is_not_trained() {
        let dir = tempdir().unwrap();
        let metadata = ModelMetadata {
            model_type: ModelType::Ridge,
            is_trained: false,
        };
        write_json(&dir.path().join(METADATA_FILE), &metadata).unwrap();
        let err = ModelArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, SpeechError::NotTrained));
    }
}

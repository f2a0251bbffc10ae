//! Turns feature records into the exact standardized matrix the regressors consume.

mod encoder;
mod scaler;

pub use encoder::CategoryEncoder;
pub use scaler::FeatureScaler;

use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use crate::error::{Result, SpeechError};
use crate::schema::{Feature, FeatureRecord, Target, TrainingSample, SYLLABLES_PER_WORD};

type RawRow = [Option<f64>; Feature::COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Learn encoder, medians and scaler from the input, then transform it.
    Fit,
    /// Apply statistics frozen at training time.
    Inference,
}

/// Standardized features, plus targets when preprocessing in fit mode.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub features: Array2<f64>,
    pub targets: Option<Array2<f64>>,
}

/// `words_per_minute` estimated from the syllable rate.
pub fn derive_words_per_minute(syllables_per_sec: f64) -> f64 {
    syllables_per_sec * 60.0 / SYLLABLES_PER_WORD
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeaturePipeline {
    pub encoder: CategoryEncoder,
    pub scaler: FeatureScaler,
}

impl FeaturePipeline {
    pub fn new(encoder: CategoryEncoder, scaler: FeatureScaler) -> Self {
        Self { encoder, scaler }
    }

    /// Run every preprocessing step over `samples`.
    ///
    /// In [`Mode::Fit`] the encoder, medians and scaler are refit on `samples`
    /// and targets are required; in [`Mode::Inference`] nothing is refit and
    /// no targets are returned.
    pub fn preprocess(&mut self, samples: &[TrainingSample], mode: Mode) -> Result<Preprocessed> {
        let records: Vec<&FeatureRecord> = samples.iter().map(|s| &s.features).collect();
        match mode {
            Mode::Fit => {
                let targets = target_matrix(samples)?;
                self.fit_columns(&records)?;
                let raw = self.design_matrix(&records)?;
                self.scaler.fit(&raw)?;
                Ok(Preprocessed {
                    features: self.scaler.transform(&raw)?,
                    targets: Some(targets),
                })
            }
            Mode::Inference => Ok(Preprocessed {
                features: self.transform(&records)?,
                targets: None,
            }),
        }
    }

    /// Fit the category encoder and per-column medians over the full dataset.
    pub fn fit_columns(&mut self, records: &[&FeatureRecord]) -> Result<()> {
        self.encoder = CategoryEncoder::fit(records.iter().filter_map(|r| r.category.as_deref()));
        let rows = records
            .iter()
            .map(|record| self.raw_row(record))
            .collect::<Result<Vec<_>>>()?;
        self.scaler.fit_medians(&rows);
        if let Some(feature) = Feature::ALL
            .iter()
            .find(|feature| self.scaler.median(**feature).is_none())
        {
            return Err(SpeechError::MissingFeature {
                feature: feature.name(),
            });
        }
        debug!(
            rows = rows.len(),
            categories = self.encoder.classes().len(),
            "fitted category encoder and column medians"
        );
        Ok(())
    }

    /// Unscaled, imputed feature matrix in model column order.
    pub fn design_matrix(&self, records: &[&FeatureRecord]) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((records.len(), Feature::COUNT));
        for (mut row, record) in matrix.rows_mut().into_iter().zip(records) {
            row.assign(&self.impute(self.raw_row(record)?)?);
        }
        Ok(matrix)
    }

    /// Standardized matrix for already-fitted statistics.
    pub fn transform(&self, records: &[&FeatureRecord]) -> Result<Array2<f64>> {
        if !self.scaler.is_fitted() {
            return Err(SpeechError::NotTrained);
        }
        self.scaler.transform(&self.design_matrix(records)?)
    }

    /// Standardized vector for a single record.
    pub fn transform_record(&self, record: &FeatureRecord) -> Result<Array1<f64>> {
        if !self.scaler.is_fitted() {
            return Err(SpeechError::NotTrained);
        }
        let raw = self.impute(self.raw_row(record)?)?;
        self.scaler.transform_row(raw.view())
    }

    /// Encode the category and derive words-per-minute, leaving gaps as `None`.
    fn raw_row(&self, record: &FeatureRecord) -> Result<RawRow> {
        record.validate()?;
        let mut row: RawRow = [None; Feature::COUNT];
        for feature in Feature::ALL {
            row[feature.index()] = record.get(feature);
        }
        if let Some(category) = record.category.as_deref() {
            let code = self.encoder.encode(category)?;
            row[Feature::CategoryEncoded.index()] = Some(code as f64);
        }
        if row[Feature::WordsPerMinute.index()].is_none() {
            if let Some(rate) = row[Feature::SyllablesPerSec.index()] {
                row[Feature::WordsPerMinute.index()] = Some(derive_words_per_minute(rate));
            }
        }
        Ok(row)
    }

    fn impute(&self, row: RawRow) -> Result<Array1<f64>> {
        Feature::ALL
            .iter()
            .map(|feature| match row[feature.index()] {
                Some(value) => Ok(value),
                None => {
                    let median = self.scaler.median(*feature).ok_or(
                        SpeechError::MissingFeature {
                            feature: feature.name(),
                        },
                    )?;
                    warn!(feature = feature.name(), median, "imputing missing feature");
                    Ok(median)
                }
            })
            .collect()
    }
}

/// Expert scores of every sample, in target column order.
pub fn target_matrix(samples: &[TrainingSample]) -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros((samples.len(), Target::COUNT));
    for (index, sample) in samples.iter().enumerate() {
        let scores = sample
            .scores
            .as_ref()
            .filter(|scores| scores.is_complete())
            .ok_or(SpeechError::MissingTargets { index })?;
        for target in Target::ALL {
            matrix[[index, target.index()]] = scores.get(target).unwrap_or_default();
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TargetRecord;

    fn record(seed: f64, category: &str) -> FeatureRecord {
        let mut record = FeatureRecord::new().with_category(category);
        for feature in Feature::ALL {
            if !matches!(feature, Feature::CategoryEncoded | Feature::WordsPerMinute) {
                record.set(feature, seed + feature.index() as f64);
            }
        }
        record
    }

    fn sample(seed: f64, category: &str) -> TrainingSample {
        let mut scores = TargetRecord::default();
        for target in Target::ALL {
            scores.set(target, 3.0);
        }
        TrainingSample::new(record(seed, category), scores)
    }

    fn fitted_pipeline() -> FeaturePipeline {
        let samples = vec![
            sample(1.0, "Informative"),
            sample(2.0, "Motivational"),
            sample(4.0, "Persuasive"),
        ];
        let mut pipeline = FeaturePipeline::default();
        pipeline.preprocess(&samples, Mode::Fit).unwrap();
        pipeline
    }

    #[test]
    fn derives_words_per_minute_from_syllable_rate() {
        let pipeline = FeaturePipeline::default();
        let record = FeatureRecord::new().with(Feature::SyllablesPerSec, 4.5);
        let row = pipeline.raw_row(&record).unwrap();
        assert_eq!(row[Feature::WordsPerMinute.index()], Some(180.0));
    }

    #[test]
    fn explicit_words_per_minute_wins() {
        let pipeline = FeaturePipeline::default();
        let record = FeatureRecord::new()
            .with(Feature::SyllablesPerSec, 4.5)
            .with(Feature::WordsPerMinute, 120.0);
        let row = pipeline.raw_row(&record).unwrap();
        assert_eq!(row[Feature::WordsPerMinute.index()], Some(120.0));
    }

    #[test]
    fn fit_mode_returns_targets_and_standardized_features() {
        let samples = vec![sample(1.0, "Informative"), sample(3.0, "Persuasive")];
        let mut pipeline = FeaturePipeline::default();
        let out = pipeline.preprocess(&samples, Mode::Fit).unwrap();
        assert_eq!(out.features.dim(), (2, Feature::COUNT));
        assert_eq!(out.targets.unwrap().dim(), (2, Target::COUNT));
        assert_eq!(out.features[[0, 0]], -1.0);
        assert_eq!(out.features[[1, 0]], 1.0);
    }

    #[test]
    fn inference_mode_has_no_targets_and_does_not_refit() {
        let mut pipeline = fitted_pipeline();
        let before = pipeline.clone();
        let samples = vec![sample(100.0, "Informative")];
        let out = pipeline.preprocess(&samples, Mode::Inference).unwrap();
        assert!(out.targets.is_none());
        assert_eq!(pipeline, before);
    }

    #[test]
    fn fit_requires_targets() {
        let samples = vec![TrainingSample {
            file: None,
            features: record(1.0, "Informative"),
            scores: None,
        }];
        let err = FeaturePipeline::default()
            .preprocess(&samples, Mode::Fit)
            .unwrap_err();
        assert!(matches!(err, SpeechError::MissingTargets { index: 0 }));
    }

    #[test]
    fn unknown_category_at_inference_is_rejected() {
        let pipeline = fitted_pipeline();
        let err = pipeline
            .transform_record(&record(1.0, "Inspirational"))
            .unwrap_err();
        assert!(matches!(err, SpeechError::UnknownCategory { .. }));
    }

    #[test]
    fn missing_feature_is_imputed_with_training_median() {
        let pipeline = fitted_pipeline();
        let mut partial = record(2.0, "Motivational");
        partial.remove(Feature::LoudStd);
        let complete = record(2.0, "Motivational");
        assert_eq!(
            pipeline.transform_record(&partial).unwrap(),
            pipeline.transform_record(&complete).unwrap()
        );
    }

    #[test]
    fn column_never_observed_is_a_missing_feature() {
        let mut samples = vec![sample(1.0, "Informative"), sample(2.0, "Persuasive")];
        for s in samples.iter_mut() {
            s.features.remove(Feature::ChromaMean);
        }
        let err = FeaturePipeline::default()
            .preprocess(&samples, Mode::Fit)
            .unwrap_err();
        assert!(matches!(
            err,
            SpeechError::MissingFeature {
                feature: "chroma_mean"
            }
        ));
    }

    #[test]
    fn unfitted_pipeline_refuses_inference() {
        let err = FeaturePipeline::default()
            .transform_record(&record(1.0, "Informative"))
            .unwrap_err();
        assert!(matches!(err, SpeechError::NotTrained));
    }
}

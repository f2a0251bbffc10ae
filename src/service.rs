//! Request-level entry points: a shared artifact, feature extraction and feedback in one call.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::audio::transcode::{FfmpegTranscoder, Transcoder};
use crate::error::{Result, SpeechError};
use crate::feedback::{feedback, recommendations, Feedback, Recommendation};
use crate::features::FeatureExtractor;
use crate::model::ModelArtifact;
use crate::schema::{FeatureRecord, ScoreVector};

/// Raw audio plus the hints needed to decode and encode it.
#[derive(Debug, Clone)]
pub struct AudioRequest {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub category: Option<String>,
}

impl AudioRequest {
    pub fn new(bytes: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            bytes,
            extension: extension.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub scores: ScoreVector,
    pub feedback: Feedback,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureRecord>,
}

impl AnalysisResponse {
    pub fn from_scores(scores: ScoreVector) -> Self {
        Self {
            feedback: feedback(&scores),
            recommendations: recommendations(&scores),
            scores,
            features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub message: String,
}

impl From<&SpeechError> for ErrorResponse {
    fn from(err: &SpeechError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Serves predictions from one loaded artifact; cheap to clone and safe to share.
#[derive(Clone)]
pub struct SpeechAnalyzer {
    artifact: Arc<ModelArtifact>,
    extractor: FeatureExtractor,
    transcoder: Arc<dyn Transcoder>,
}

impl SpeechAnalyzer {
    pub fn new(artifact: Arc<ModelArtifact>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            artifact,
            extractor: FeatureExtractor::new(),
            transcoder,
        }
    }

    pub fn with_ffmpeg(artifact: Arc<ModelArtifact>) -> Self {
        Self::new(artifact, Arc::new(FfmpegTranscoder::new()))
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn predict_record(&self, record: &FeatureRecord) -> Result<AnalysisResponse> {
        let scores = self.artifact.predict(record)?;
        Ok(AnalysisResponse::from_scores(scores))
    }

    pub fn analyze_audio(&self, request: &AudioRequest) -> Result<AnalysisResponse> {
        let mut record =
            self.extractor
                .extract_bytes(&request.bytes, &request.extension, self.transcoder.as_ref())?;
        record.category = request.category.clone();
        let mut response = self.predict_record(&record)?;
        info!(
            extension = %request.extension,
            overall = response.scores.get(crate::schema::Target::Overall),
            "analyzed recording"
        );
        response.features = Some(record);
        Ok(response)
    }

    /// Analyze independent requests in parallel; results keep request order.
    pub fn analyze_batch(&self, requests: &[AudioRequest]) -> Vec<Result<AnalysisResponse>> {
        requests
            .par_iter()
            .map(|request| {
                self.analyze_audio(request).map_err(|err| {
                    warn!(extension = %request.extension, error = %err, "analysis failed");
                    err
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::model::{ModelType, ScoreModel};
    use crate::schema::{Feature, Target, TargetRecord, TrainingSample};
    use std::io::Cursor;

    struct NoTranscoder;

    impl Transcoder for NoTranscoder {
        fn to_wav(&self, _bytes: &[u8], extension: &str) -> Result<Vec<u8>> {
            Err(SpeechError::Transcode {
                extension: extension.to_string(),
                message: "disabled".into(),
            })
        }
    }

    fn analyzer() -> SpeechAnalyzer {
        let categories = ["Informative", "Motivational", "Persuasive"];
        let samples: Vec<TrainingSample> = (0..30)
            .map(|i| {
                let mut record = FeatureRecord::new().with_category(categories[i % 3]);
                for feature in Feature::ALL {
                    if !matches!(feature, Feature::CategoryEncoded | Feature::WordsPerMinute) {
                        record.set(feature, ((i * 7 + feature.index() * 3) % 11) as f64);
                    }
                }
                let mut scores = TargetRecord::default();
                for target in Target::ALL {
                    scores.set(target, (1 + (i + target.index()) % 5) as f64);
                }
                TrainingSample::new(record, scores)
            })
            .collect();
        let config = TrainingConfig {
            model_type: ModelType::Ridge,
            ..TrainingConfig::default()
        };
        let (artifact, _) = ScoreModel::train(&samples, &config).unwrap();
        SpeechAnalyzer::new(Arc::new(artifact), Arc::new(NoTranscoder))
    }

    fn tone_wav() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for n in 0..22_050 {
                let t = n as f32 / 22_050.0;
                let sample = (t * 220.0 * std::f32::consts::TAU).sin() * 0.5;
                writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let analyzer = analyzer();
        let requests = vec![
            AudioRequest::new(tone_wav(), "wav").with_category("Informative"),
            AudioRequest::new(vec![1, 2, 3], "webm"),
            AudioRequest::new(tone_wav(), "wav").with_category("Inspirational"),
        ];
        let results = analyzer.analyze_batch(&requests);
        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        assert!(first.features.is_some());
        assert!(first.scores.iter().all(|(_, s)| (1..=5).contains(&s)));
        assert!(matches!(results[1], Err(SpeechError::Transcode { .. })));
        assert!(matches!(
            results[2],
            Err(SpeechError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn response_flattens_scores() {
        let response = AnalysisResponse::from_scores(ScoreVector::new([3, 4, 5, 3, 4, 5, 3, 2]));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["speech_pace"], 3);
        assert_eq!(json["overall"], 2);
        assert!(json.get("features").is_none());
        assert_eq!(json["recommendations"][0]["category"], "Speech Pace");
    }

    #[test]
    fn error_response_carries_kind() {
        let response = ErrorResponse::from(&SpeechError::NotTrained);
        assert_eq!(response.kind, "not_trained_error");
    }
}

//! Error taxonomy shared by the extraction, preprocessing and prediction stages.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpeechError>;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("unable to decode audio: {message}")]
    Decode { message: String },

    #[error("audio signal is empty (zero duration)")]
    EmptySignal,

    #[error("unable to transcode .{extension} audio: {message}")]
    Transcode { extension: String, message: String },

    #[error("feature `{feature}` has non-finite value {value}")]
    NonFiniteFeature { feature: &'static str, value: f64 },

    #[error("feature `{feature}` is missing and no training median is available")]
    MissingFeature { feature: &'static str },

    #[error("unknown category \"{category}\" (known categories: {})", .known.join(", "))]
    UnknownCategory { category: String, known: Vec<String> },

    #[error("training requires target scores but sample {index} has none")]
    MissingTargets { index: usize },

    #[error("model must be trained or loaded before prediction")]
    NotTrained,

    #[error("feature vector has {actual} columns but the fitted scaler expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{operation} is not supported for {model_type} models")]
    UnsupportedOperation {
        operation: &'static str,
        model_type: String,
    },

    #[error("invalid dataset: {message}")]
    InvalidDataset { message: String },

    #[error("model artifact at {path:?} is invalid: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SpeechError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn invalid_dataset(message: impl Into<String>) -> Self {
        Self::InvalidDataset {
            message: message.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable tag used when the error crosses the service boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode_error",
            Self::EmptySignal => "empty_signal_error",
            Self::Transcode { .. } => "transcode_error",
            Self::NonFiniteFeature { .. } => "non_finite_feature_error",
            Self::MissingFeature { .. } => "missing_feature_error",
            Self::UnknownCategory { .. } => "unknown_category_error",
            Self::MissingTargets { .. } => "missing_targets_error",
            Self::NotTrained => "not_trained_error",
            Self::DimensionMismatch { .. } => "dimension_mismatch_error",
            Self::UnsupportedOperation { .. } => "unsupported_operation_error",
            Self::InvalidDataset { .. } => "invalid_dataset_error",
            Self::Artifact { .. } => "artifact_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }
}

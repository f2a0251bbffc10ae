use std::path::{Path, PathBuf};

use crate::error::{Result, SpeechError};
use crate::model::ModelType;

pub const MODEL_DIR_ENV: &str = "SPEECH_COACH_MODEL_DIR";
pub const DEFAULT_MODEL_DIR: &str = "trained_models";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_dir: PathBuf,
}

impl AppConfig {
    /// Model directory from the override, else `SPEECH_COACH_MODEL_DIR`, else `./trained_models`.
    pub fn from_override(path: Option<PathBuf>) -> Self {
        Self::resolve(path, std::env::var_os(MODEL_DIR_ENV).map(PathBuf::from))
    }

    fn resolve(path: Option<PathBuf>, env: Option<PathBuf>) -> Self {
        let model_dir = path
            .or(env.filter(|p| !p.as_os_str().is_empty()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR));
        Self { model_dir }
    }

    /// The model directory, which must already exist.
    pub fn existing_model_dir(&self) -> Result<&Path> {
        if self.model_dir.is_dir() {
            Ok(&self.model_dir)
        } else {
            Err(SpeechError::artifact(
                &self.model_dir,
                "model directory does not exist; run `train` first",
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub model_type: ModelType,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::RandomForest,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.test_fraction > 0.0 && self.test_fraction < 1.0 {
            Ok(())
        } else {
            Err(SpeechError::invalid_dataset(format!(
                "test fraction must lie in (0, 1), got {}",
                self.test_fraction
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, TrainingConfig, DEFAULT_MODEL_DIR};
    use std::path::PathBuf;

    #[test]
    fn override_beats_environment() {
        let config = AppConfig::resolve(Some(PathBuf::from("cli")), Some(PathBuf::from("env")));
        assert_eq!(config.model_dir, PathBuf::from("cli"));
    }

    #[test]
    fn environment_beats_default() {
        let config = AppConfig::resolve(None, Some(PathBuf::from("env")));
        assert_eq!(config.model_dir, PathBuf::from("env"));
        let config = AppConfig::resolve(None, Some(PathBuf::new()));
        assert_eq!(config.model_dir, PathBuf::from(DEFAULT_MODEL_DIR));
    }

    #[test]
    fn missing_model_dir_is_reported() {
        let config = AppConfig::resolve(Some(PathBuf::from("/definitely/not/here")), None);
        assert!(config.existing_model_dir().is_err());
    }

    #[test]
    fn test_fraction_must_be_a_proper_fraction() {
        assert!(TrainingConfig::default().validate().is_ok());
        for bad in [0.0, 1.0, -0.1, f64::NAN] {
            let config = TrainingConfig {
                test_fraction: bad,
                ..TrainingConfig::default()
            };
            assert!(config.validate().is_err());
        }
    }
}

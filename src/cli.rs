use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::TrainingConfig;
use crate::model::ModelType;

#[derive(Parser, Debug)]
#[command(
    name = "speech-coach",
    version,
    about = "Scores recorded speeches on eight delivery dimensions and suggests improvements"
)]
pub struct Cli {
    /// Model artifact directory (defaults to $SPEECH_COACH_MODEL_DIR, then ./trained_models).
    #[arg(long = "model-dir", global = true, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the acoustic features of a recording as JSON.
    Extract(ExtractArgs),
    /// Fit a model on a labelled JSON dataset and save it to the model directory.
    Train(TrainArgs),
    /// Score a JSON feature record with the saved model.
    Predict(PredictArgs),
    /// Extract features from a recording and score them.
    Analyze(AnalyzeArgs),
    /// Show stored training metrics, a sample prediction and the strongest features.
    Evaluate(EvaluateArgs),
    /// Describe the saved model.
    ModelInfo,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Audio file (wav, mp3, flac, ogg, m4a, ...).
    #[arg(value_name = "AUDIO")]
    pub audio: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// JSON array of `{ "file", "features", "scores" }` rows.
    #[arg(long, value_name = "PATH")]
    pub dataset: PathBuf,
    #[arg(long = "model-type", value_enum, default_value_t = ModelType::RandomForest)]
    pub model_type: ModelType,
    /// Share of rows held out for evaluation.
    #[arg(long = "test-fraction", default_value_t = 0.2)]
    pub test_fraction: f64,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl TrainArgs {
    pub fn training_config(&self) -> Result<TrainingConfig> {
        ensure!(
            self.test_fraction > 0.0 && self.test_fraction < 1.0,
            "test-fraction must lie strictly between 0 and 1, got {}",
            self.test_fraction
        );
        Ok(TrainingConfig {
            model_type: self.model_type,
            test_fraction: self.test_fraction,
            seed: self.seed,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// JSON feature record.
    #[arg(long, value_name = "PATH")]
    pub features: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(value_name = "AUDIO")]
    pub audio: PathBuf,
    /// Speech category (Informative, Motivational or Persuasive).
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Dataset whose first row is used for a sample prediction.
    #[arg(long, value_name = "PATH")]
    pub dataset: Option<PathBuf>,
}

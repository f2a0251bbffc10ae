use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use speech_coach::cli::{AnalyzeArgs, Cli, Command, EvaluateArgs, TrainArgs};
use speech_coach::config::AppConfig;
use speech_coach::features::FeatureExtractor;
use speech_coach::model::{ModelArtifact, ScoreModel, TrainingMetrics};
use speech_coach::schema::{Feature, FeatureRecord, ScoreVector, Target, TrainingSample};
use speech_coach::service::{AudioRequest, ErrorResponse, SpeechAnalyzer};
use speech_coach::SpeechError;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_override(cli.model_dir.clone());
    match &cli.command {
        Command::Extract(args) => {
            let record = FeatureExtractor::new()
                .extract_file(&args.audio)
                .with_context(|| format!("failed to extract features from {:?}", args.audio))?;
            print_json(&record)
        }
        Command::Train(args) => handle_train(&config, args),
        Command::Predict(args) => {
            let raw = fs::read_to_string(&args.features)
                .with_context(|| format!("failed to read feature file {:?}", args.features))?;
            let record: FeatureRecord =
                serde_json::from_str(&raw).context("failed to parse feature record JSON")?;
            let analyzer = load_analyzer(&config)?;
            respond(analyzer.predict_record(&record))
        }
        Command::Analyze(args) => handle_analyze(&config, args),
        Command::Evaluate(args) => handle_evaluate(&config, args),
        Command::ModelInfo => handle_model_info(&config),
    }
}

fn handle_train(config: &AppConfig, args: &TrainArgs) -> Result<()> {
    let training = args.training_config()?;
    let samples = load_dataset(&args.dataset)?;
    info!(
        samples = samples.len(),
        model_type = %training.model_type,
        "training score model"
    );
    let (artifact, metrics) =
        ScoreModel::train(&samples, &training).context("training failed")?;
    artifact
        .save(&config.model_dir)
        .context("failed to save model artifact")?;
    metrics
        .save(&config.model_dir)
        .context("failed to save training metrics")?;

    if training.model_type.supports_importance() {
        for (rank, (feature, importance)) in artifact.feature_importance()?.iter().take(10).enumerate() {
            info!(rank = rank + 1, feature = %feature, importance, "top feature");
        }
    }
    print_json(&metrics)
}

fn handle_analyze(config: &AppConfig, args: &AnalyzeArgs) -> Result<()> {
    let bytes =
        fs::read(&args.audio).with_context(|| format!("failed to read audio {:?}", args.audio))?;
    let extension = args
        .audio
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("wav")
        .to_ascii_lowercase();
    let mut request = AudioRequest::new(bytes, extension);
    request.category = args.category.clone();
    let analyzer = load_analyzer(config)?;
    respond(analyzer.analyze_audio(&request))
}

fn handle_evaluate(config: &AppConfig, args: &EvaluateArgs) -> Result<()> {
    let dir = config.existing_model_dir()?;
    let artifact = ModelArtifact::load(dir).context("failed to load model artifact")?;
    let metrics = match TrainingMetrics::load(dir) {
        Ok(metrics) => Some(metrics),
        Err(err) => {
            warn!(error = %err, "no stored training metrics");
            None
        }
    };

    let sample = match &args.dataset {
        Some(path) => load_dataset(path)?
            .into_iter()
            .next()
            .map(|first| sample_prediction(&artifact, first))
            .transpose()?,
        None => None,
    };
    let top_features = optional_importance(&artifact, 15)?;

    print_json(&json!({
        "model_type": artifact.model_type(),
        "metrics": metrics,
        "sample": sample,
        "top_features": top_features,
    }))
}

fn handle_model_info(config: &AppConfig) -> Result<()> {
    let artifact =
        ModelArtifact::load(config.existing_model_dir()?).context("failed to load model artifact")?;
    let targets: Vec<&str> = Target::ALL.iter().map(|t| t.name()).collect();
    print_json(&json!({
        "model_type": artifact.model_type(),
        "is_trained": artifact.is_trained(),
        "features": artifact.feature_names(),
        "targets": targets,
        "categories": artifact.categories(),
        "feature_importance": optional_importance(&artifact, Feature::COUNT)?,
    }))
}

#[derive(Serialize)]
struct SamplePrediction {
    file: Option<String>,
    predicted: ScoreVector,
    actual: Option<speech_coach::schema::TargetRecord>,
}

fn sample_prediction(artifact: &ModelArtifact, sample: TrainingSample) -> Result<SamplePrediction> {
    let predicted = artifact
        .predict(&sample.features)
        .context("sample prediction failed")?;
    Ok(SamplePrediction {
        file: sample.file,
        predicted,
        actual: sample.scores,
    })
}

/// Ranked importances, or `None` for model families without them.
fn optional_importance(artifact: &ModelArtifact, limit: usize) -> Result<Option<Vec<serde_json::Value>>> {
    match artifact.feature_importance() {
        Ok(ranked) => Ok(Some(
            ranked
                .into_iter()
                .take(limit)
                .map(|(feature, importance)| json!({ "feature": feature, "importance": importance }))
                .collect(),
        )),
        Err(SpeechError::UnsupportedOperation { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn load_analyzer(config: &AppConfig) -> Result<SpeechAnalyzer> {
    let artifact = ModelArtifact::load(config.existing_model_dir()?)
        .context("failed to load model artifact")?;
    Ok(SpeechAnalyzer::with_ffmpeg(Arc::new(artifact)))
}

fn load_dataset(path: &Path) -> Result<Vec<TrainingSample>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read dataset {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse dataset {:?}", path))
}

/// Print the response, or the structured error before failing the process.
fn respond<T: Serialize>(result: speech_coach::Result<T>) -> Result<()> {
    match result {
        Ok(response) => print_json(&response),
        Err(err) => {
            print_json(&ErrorResponse::from(&err))?;
            Err(err.into())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

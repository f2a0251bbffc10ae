//! Fixed feature and target schema shared by every pipeline stage.
//!
//! Feature records are keyed by the closed [`Feature`] enumeration, so a
//! misspelled or unexpected column fails at the deserialization boundary
//! instead of surfacing later as a silently imputed value.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SpeechError};

/// Approximate syllables per spoken word, used to derive a words-per-minute rate.
pub const SYLLABLES_PER_WORD: f64 = 1.5;

/// Lowest and highest score any target can take.
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    LoudMean,
    LoudStd,
    PauseRatio,
    PitchMean,
    PitchStd,
    SyllablesPerSec,
    SpectralCentroid,
    SpectralRolloff,
    WordsPerMinute,
    ZcrMean,
    #[serde(rename = "mfcc_1")]
    Mfcc1,
    #[serde(rename = "mfcc_2")]
    Mfcc2,
    #[serde(rename = "mfcc_3")]
    Mfcc3,
    #[serde(rename = "mfcc_4")]
    Mfcc4,
    #[serde(rename = "mfcc_5")]
    Mfcc5,
    #[serde(rename = "mfcc_6")]
    Mfcc6,
    #[serde(rename = "mfcc_7")]
    Mfcc7,
    #[serde(rename = "mfcc_8")]
    Mfcc8,
    #[serde(rename = "mfcc_9")]
    Mfcc9,
    #[serde(rename = "mfcc_10")]
    Mfcc10,
    #[serde(rename = "mfcc_11")]
    Mfcc11,
    #[serde(rename = "mfcc_12")]
    Mfcc12,
    #[serde(rename = "mfcc_13")]
    Mfcc13,
    SpectralBandwidth,
    SpectralFlux,
    ChromaMean,
    CategoryEncoded,
}

impl Feature {
    pub const COUNT: usize = 27;

    /// Model column order.
    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::LoudMean,
        Feature::LoudStd,
        Feature::PauseRatio,
        Feature::PitchMean,
        Feature::PitchStd,
        Feature::SyllablesPerSec,
        Feature::SpectralCentroid,
        Feature::SpectralRolloff,
        Feature::WordsPerMinute,
        Feature::ZcrMean,
        Feature::Mfcc1,
        Feature::Mfcc2,
        Feature::Mfcc3,
        Feature::Mfcc4,
        Feature::Mfcc5,
        Feature::Mfcc6,
        Feature::Mfcc7,
        Feature::Mfcc8,
        Feature::Mfcc9,
        Feature::Mfcc10,
        Feature::Mfcc11,
        Feature::Mfcc12,
        Feature::Mfcc13,
        Feature::SpectralBandwidth,
        Feature::SpectralFlux,
        Feature::ChromaMean,
        Feature::CategoryEncoded,
    ];

    pub const MFCC: [Feature; 13] = [
        Feature::Mfcc1,
        Feature::Mfcc2,
        Feature::Mfcc3,
        Feature::Mfcc4,
        Feature::Mfcc5,
        Feature::Mfcc6,
        Feature::Mfcc7,
        Feature::Mfcc8,
        Feature::Mfcc9,
        Feature::Mfcc10,
        Feature::Mfcc11,
        Feature::Mfcc12,
        Feature::Mfcc13,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::LoudMean => "loud_mean",
            Feature::LoudStd => "loud_std",
            Feature::PauseRatio => "pause_ratio",
            Feature::PitchMean => "pitch_mean",
            Feature::PitchStd => "pitch_std",
            Feature::SyllablesPerSec => "syllables_per_sec",
            Feature::SpectralCentroid => "spectral_centroid",
            Feature::SpectralRolloff => "spectral_rolloff",
            Feature::WordsPerMinute => "words_per_minute",
            Feature::ZcrMean => "zcr_mean",
            Feature::Mfcc1 => "mfcc_1",
            Feature::Mfcc2 => "mfcc_2",
            Feature::Mfcc3 => "mfcc_3",
            Feature::Mfcc4 => "mfcc_4",
            Feature::Mfcc5 => "mfcc_5",
            Feature::Mfcc6 => "mfcc_6",
            Feature::Mfcc7 => "mfcc_7",
            Feature::Mfcc8 => "mfcc_8",
            Feature::Mfcc9 => "mfcc_9",
            Feature::Mfcc10 => "mfcc_10",
            Feature::Mfcc11 => "mfcc_11",
            Feature::Mfcc12 => "mfcc_12",
            Feature::Mfcc13 => "mfcc_13",
            Feature::SpectralBandwidth => "spectral_bandwidth",
            Feature::SpectralFlux => "spectral_flux",
            Feature::ChromaMean => "chroma_mean",
            Feature::CategoryEncoded => "category_encoded",
        }
    }

    /// Column position in the model input.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    SpeechPace,
    PausingFluency,
    LoudnessControl,
    PitchVariation,
    ArticulationClarity,
    ExpressiveEmphasis,
    FillerWords,
    Overall,
}

impl Target {
    pub const COUNT: usize = 8;

    pub const ALL: [Target; Target::COUNT] = [
        Target::SpeechPace,
        Target::PausingFluency,
        Target::LoudnessControl,
        Target::PitchVariation,
        Target::ArticulationClarity,
        Target::ExpressiveEmphasis,
        Target::FillerWords,
        Target::Overall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::SpeechPace => "speech_pace",
            Target::PausingFluency => "pausing_fluency",
            Target::LoudnessControl => "loudness_control",
            Target::PitchVariation => "pitch_variation",
            Target::ArticulationClarity => "articulation_clarity",
            Target::ExpressiveEmphasis => "expressive_emphasis",
            Target::FillerWords => "filler_words",
            Target::Overall => "overall",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One speech's raw measurements, plus its declared rhetorical category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Clip length in seconds; informational only, not a model input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten, deserialize_with = "present_values")]
    values: BTreeMap<Feature, f64>,
}

/// Explicit `null` measurements count as absent.
fn present_values<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<Feature, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = BTreeMap::<Feature, Option<f64>>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|(feature, value)| value.map(|value| (feature, value)))
        .collect())
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(&feature).copied()
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.values.insert(feature, value);
    }

    pub fn remove(&mut self, feature: Feature) -> Option<f64> {
        self.values.remove(&feature)
    }

    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, value);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(feature, value)| (*feature, *value))
    }

    /// Rejects NaN and infinite measurements before they reach the model.
    pub fn validate(&self) -> Result<()> {
        for (feature, value) in self.iter() {
            if !value.is_finite() {
                return Err(SpeechError::NonFiniteFeature {
                    feature: feature.name(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Expert scores attached to a training sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetRecord(BTreeMap<Target, f64>);

impl TargetRecord {
    pub fn get(&self, target: Target) -> Option<f64> {
        self.0.get(&target).copied()
    }

    pub fn set(&mut self, target: Target, value: f64) {
        self.0.insert(target, value);
    }

    pub fn is_complete(&self) -> bool {
        Target::ALL.iter().all(|target| self.0.contains_key(target))
    }
}

/// A labelled row of the training dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub features: FeatureRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<TargetRecord>,
}

impl TrainingSample {
    pub fn new(features: FeatureRecord, scores: TargetRecord) -> Self {
        Self {
            file: None,
            features,
            scores: Some(scores),
        }
    }
}

/// Eight integer scores in `[MIN_SCORE, MAX_SCORE]`, indexed by [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Target, u8>",
    into = "BTreeMap<Target, u8>"
)]
pub struct ScoreVector([u8; Target::COUNT]);

impl ScoreVector {
    /// Builds a score vector, clamping every entry into the valid range.
    pub fn new(scores: [u8; Target::COUNT]) -> Self {
        Self(scores.map(|score| score.clamp(MIN_SCORE, MAX_SCORE)))
    }

    pub fn get(&self, target: Target) -> u8 {
        self.0[target.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Target, u8)> + '_ {
        Target::ALL.iter().map(|target| (*target, self.get(*target)))
    }

    pub fn as_array(&self) -> &[u8; Target::COUNT] {
        &self.0
    }
}

impl TryFrom<BTreeMap<Target, u8>> for ScoreVector {
    type Error = String;

    fn try_from(map: BTreeMap<Target, u8>) -> std::result::Result<Self, Self::Error> {
        let mut scores = [0u8; Target::COUNT];
        for target in Target::ALL {
            let score = *map
                .get(&target)
                .ok_or_else(|| format!("missing score for `{target}`"))?;
            if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
                return Err(format!("score {score} for `{target}` is outside 1-5"));
            }
            scores[target.index()] = score;
        }
        Ok(Self(scores))
    }
}

impl From<ScoreVector> for BTreeMap<Target, u8> {
    fn from(scores: ScoreVector) -> Self {
        scores.iter().collect()
    }
}

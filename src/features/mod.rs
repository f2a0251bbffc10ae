mod frames;
mod mel;
mod onset;
mod spectral;
mod statistics;

use std::path::Path;

use tracing::{debug, info};

use crate::audio::decoder::decode_audio;
use crate::audio::pause_detector::{non_silent_intervals, pause_ratio, DEFAULT_TOP_DB};
use crate::audio::resample;
use crate::audio::transcode::{decode_with_fallback, Transcoder};
use crate::error::{Result, SpeechError};
use crate::schema::{Feature, FeatureRecord};
use crate::types::{AudioData, ANALYSIS_SAMPLE_RATE};

use frames::{frame_rms, frame_zero_crossing_rate, HOP_LENGTH};
use statistics::{column_means, finite_or_zero, grand_mean, mean, std_dev};

/// Turns a decoded clip into the fixed set of acoustic and prosodic measurements.
///
/// Holds no state; one instance may serve any number of threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureExtractor {}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<FeatureRecord> {
        let audio = decode_audio(path)?;
        self.extract(&audio)
    }

    /// Decode `bytes` (transcoding when `extension` is not natively readable) and extract.
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        extension: &str,
        transcoder: &dyn Transcoder,
    ) -> Result<FeatureRecord> {
        let audio = decode_with_fallback(bytes, extension, transcoder)?;
        self.extract(&audio)
    }

    pub fn extract(&self, audio: &AudioData) -> Result<FeatureRecord> {
        if audio.is_empty() || audio.duration_secs() <= 0.0 {
            return Err(SpeechError::EmptySignal);
        }
        let clip = resample::to_rate(audio, ANALYSIS_SAMPLE_RATE)?;
        let samples: Vec<f64> = clip.samples.iter().map(|&s| s as f64).collect();
        let duration = clip.duration_secs();

        let rms = frame_rms(&samples);
        let intervals = non_silent_intervals(&rms, HOP_LENGTH, samples.len(), DEFAULT_TOP_DB);
        let pauses = pause_ratio(&intervals, duration, ANALYSIS_SAMPLE_RATE);
        let zcr = frame_zero_crossing_rate(&samples);

        let spec = spectral::compute_spectrogram(&samples);
        let voiced: Vec<f64> = spectral::pitch_track(&spec)
            .into_iter()
            .filter(|pitch| *pitch > 0.0)
            .collect();

        let mel_power = mel::mel_spectrogram(&spec);
        let mel_db = mel::mel_db(&mel_power);
        let onsets = onset::detect_onsets(&onset::onset_strength(&mel_db));
        let syllables_per_sec = if duration > 0.0 {
            onsets.len() as f64 / duration
        } else {
            0.0
        };
        let mfcc = column_means(&mel::mfcc(&mel_db), mel::MFCC_COUNT);

        debug!(
            frames = spec.magnitude.len(),
            voiced_frames = voiced.len(),
            onsets = onsets.len(),
            intervals = intervals.len(),
            "computed frame-level descriptors"
        );

        let mut record = FeatureRecord::new();
        record.duration = Some(duration);
        let mut put = |feature: Feature, value: f64| record.set(feature, finite_or_zero(value));
        put(Feature::LoudMean, mean(&rms));
        put(Feature::LoudStd, std_dev(&rms));
        put(Feature::PauseRatio, pauses);
        put(Feature::PitchMean, mean(&voiced));
        put(Feature::PitchStd, std_dev(&voiced));
        put(Feature::SyllablesPerSec, syllables_per_sec);
        put(Feature::SpectralCentroid, mean(&spectral::centroids(&spec)));
        put(Feature::SpectralRolloff, mean(&spectral::rolloffs(&spec)));
        put(Feature::ZcrMean, mean(&zcr));
        for (feature, value) in Feature::MFCC.iter().zip(mfcc) {
            put(*feature, value);
        }
        put(Feature::SpectralBandwidth, mean(&spectral::bandwidths(&spec)));
        // Mean spectral contrast stands in for spectral flux.
        put(Feature::SpectralFlux, grand_mean(&spectral::contrast(&spec)));
        put(Feature::ChromaMean, grand_mean(&spectral::chroma(&spec)));

        info!(
            duration_secs = duration,
            pause_ratio = pauses,
            syllables_per_sec,
            "extracted speech features"
        );
        Ok(record)
    }
}

mod support;

use approx::assert_abs_diff_eq;
use speech_coach::audio::transcode::Transcoder;
use speech_coach::features::FeatureExtractor;
use speech_coach::schema::Feature;
use speech_coach::types::AudioData;
use speech_coach::SpeechError;
use tempfile::tempdir;

use support::{sine, write_wav};

#[test]
fn steady_tone_yields_its_pitch_and_no_pauses() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, &sine(440.0, 1.5, 22_050, 0.5), 22_050, 1);

    let record = FeatureExtractor::new().extract_file(&path).unwrap();

    assert_abs_diff_eq!(record.duration.unwrap(), 1.5, epsilon = 1e-3);
    assert_abs_diff_eq!(record.get(Feature::PitchMean).unwrap(), 440.0, epsilon = 10.0);
    assert!(record.get(Feature::PitchStd).unwrap() < 10.0);
    assert!(record.get(Feature::PauseRatio).unwrap() < 0.05);
    assert!(record.get(Feature::LoudMean).unwrap() > 0.1);
    let centroid = record.get(Feature::SpectralCentroid).unwrap();
    assert!((300.0..1_500.0).contains(&centroid), "centroid {centroid}");
    assert!(record.iter().all(|(_, value)| value.is_finite()));
}

#[test]
fn record_has_every_measured_column() {
    let audio = AudioData::new(sine(220.0, 1.0, 22_050, 0.3), 22_050);
    let record = FeatureExtractor::new().extract(&audio).unwrap();
    for feature in Feature::ALL {
        let derived = matches!(feature, Feature::WordsPerMinute | Feature::CategoryEncoded);
        assert_eq!(record.get(feature).is_some(), !derived, "{feature}");
    }
    assert!(record.category.is_none());
}

#[test]
fn silence_is_all_pause() {
    let audio = AudioData::new(vec![0.0; 5 * 22_050], 22_050);
    let record = FeatureExtractor::new().extract(&audio).unwrap();
    assert_eq!(record.get(Feature::PauseRatio), Some(1.0));
    assert_eq!(record.get(Feature::PitchMean), Some(0.0));
    assert_eq!(record.get(Feature::PitchStd), Some(0.0));
    assert_eq!(record.get(Feature::SyllablesPerSec), Some(0.0));
    assert!(record.iter().all(|(_, value)| value.is_finite()));
}

#[test]
fn empty_signal_is_rejected() {
    let err = FeatureExtractor::new()
        .extract(&AudioData::new(Vec::new(), 22_050))
        .unwrap_err();
    assert!(matches!(err, SpeechError::EmptySignal));
}

#[test]
fn other_sample_rates_are_resampled_first() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone_44k.wav");
    write_wav(&path, &sine(440.0, 1.0, 44_100, 0.5), 44_100, 1);
    let record = FeatureExtractor::new().extract_file(&path).unwrap();
    assert_abs_diff_eq!(record.duration.unwrap(), 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(record.get(Feature::PitchMean).unwrap(), 440.0, epsilon = 10.0);
}

#[test]
fn stereo_is_downmixed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let mono = sine(330.0, 1.0, 22_050, 0.4);
    let interleaved: Vec<f32> = mono.iter().flat_map(|s| [*s, *s]).collect();
    write_wav(&path, &interleaved, 22_050, 2);
    let record = FeatureExtractor::new().extract_file(&path).unwrap();
    assert_abs_diff_eq!(record.duration.unwrap(), 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(record.get(Feature::PitchMean).unwrap(), 330.0, epsilon = 10.0);
}

struct CannedWav(Vec<u8>);

impl Transcoder for CannedWav {
    fn to_wav(&self, _bytes: &[u8], _extension: &str) -> speech_coach::Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

#[test]
fn foreign_containers_go_through_the_transcoder() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, &sine(440.0, 1.0, 22_050, 0.5), 22_050, 1);
    let wav = std::fs::read(&path).unwrap();

    let extractor = FeatureExtractor::new();
    let via_transcoder = extractor
        .extract_bytes(b"webm payload", "webm", &CannedWav(wav.clone()))
        .unwrap();
    let direct = extractor.extract_file(&path).unwrap();
    assert_eq!(via_transcoder, direct);
}

#[test]
fn undecodable_bytes_are_a_decode_error() {
    let err = FeatureExtractor::new()
        .extract_bytes(b"definitely not audio", "wav", &CannedWav(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, SpeechError::Decode { .. }));
}

#![allow(dead_code)]

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use speech_coach::schema::{Feature, FeatureRecord, Target, TargetRecord, TrainingSample};

pub const CATEGORIES: [&str; 3] = ["Informative", "Motivational", "Persuasive"];

/// Labelled rows whose scores follow the first eight feature columns.
pub fn synthetic_samples(n: usize, seed: u64) -> Vec<TrainingSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let mut features = FeatureRecord::new().with_category(CATEGORIES[i % CATEGORIES.len()]);
            for feature in Feature::ALL {
                if !matches!(feature, Feature::CategoryEncoded | Feature::WordsPerMinute) {
                    features.set(feature, rng.gen_range(0.0..1.0));
                }
            }
            let mut scores = TargetRecord::default();
            for target in Target::ALL {
                let driver = features.get(Feature::ALL[target.index()]).unwrap_or(0.5);
                scores.set(target, (1.0 + 4.0 * driver).round());
            }
            TrainingSample {
                file: Some(format!("speech_{i:03}.wav")),
                features,
                scores: Some(scores),
            }
        })
        .collect()
}

pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for sample in samples {
        writer
            .write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

pub fn sine(frequency: f32, seconds: f32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let total = (seconds * sample_rate as f32) as usize;
    (0..total)
        .map(|n| {
            let t = n as f32 / sample_rate as f32;
            (t * frequency * std::f32::consts::TAU).sin() * amplitude
        })
        .collect()
}

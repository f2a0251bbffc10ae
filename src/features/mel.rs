use aus::analysis;
use aus::analysis::mel::MelFilterbank;

use super::spectral::{power_to_db, Spectrogram};
use crate::types::ANALYSIS_SAMPLE_RATE;

pub(crate) const MEL_BANDS: usize = 128;
pub(crate) const MFCC_COUNT: usize = 13;
const MIN_FREQ: f64 = 0.0;
const TOP_DB: f64 = 80.0;

/// Mel power spectrogram (frames-by-bands) from a linear power spectrogram.
pub(crate) fn mel_spectrogram(spec: &Spectrogram) -> Vec<Vec<f64>> {
    let filterbank = MelFilterbank::new(
        MIN_FREQ,
        (ANALYSIS_SAMPLE_RATE as f64) / 2.0,
        MEL_BANDS,
        &spec.freqs,
        true,
    );
    analysis::mel::make_mel_spectrogram(&spec.power, &filterbank)
}

/// Decibel-scale mel spectrogram, floored `TOP_DB` below its loudest cell.
pub(crate) fn mel_db(mel: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let db: Vec<Vec<f64>> = mel
        .iter()
        .map(|frame| frame.iter().map(|v| power_to_db(*v)).collect())
        .collect();
    let peak = db
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return db;
    }
    let floor = peak - TOP_DB;
    db.into_iter()
        .map(|frame| frame.into_iter().map(|v| v.max(floor)).collect())
        .collect()
}

/// First `MFCC_COUNT` orthonormal DCT-II coefficients of every dB mel frame.
///
/// `aus::analysis::mel::mfcc_spectrogram` log-compresses the power mel itself, so the
/// spectrogram-wide `TOP_DB` floor cannot be applied between the two steps.
pub(crate) fn mfcc(mel_db: &[Vec<f64>]) -> Vec<Vec<f64>> {
    mel_db.iter().map(|frame| dct_ortho(frame, MFCC_COUNT)).collect()
}

fn dct_ortho(input: &[f64], coefficients: usize) -> Vec<f64> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; coefficients];
    }
    let n_f = n as f64;
    (0..coefficients)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, x)| {
                    x * (std::f64::consts::PI / n_f * (i as f64 + 0.5) * k as f64).cos()
                })
                .sum();
            let scale = if k == 0 {
                (1.0 / n_f).sqrt()
            } else {
                (2.0 / n_f).sqrt()
            };
            sum * scale
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dct_of_constant_has_only_dc_term() {
        let coeffs = dct_ortho(&[2.0; 16], 4);
        assert!((coeffs[0] - 2.0 * 16f64.sqrt()).abs() < 1e-9);
        assert!(coeffs[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn dct_matches_orthonormal_reference_values() {
        // scipy.fft.dct([1, 2, 3, 4], type=2, norm="ortho")
        let coeffs = dct_ortho(&[1.0, 2.0, 3.0, 4.0], 4);
        let expected = [5.0, -2.230_442_497_4, 0.0, -0.158_512_667_8];
        for (got, want) in coeffs.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
    }

    #[test]
    fn mfcc_of_floored_frame_keeps_thirteen_coefficients() {
        let frames = mfcc(&[vec![-80.0; MEL_BANDS]]);
        assert_eq!(frames[0].len(), MFCC_COUNT);
        assert!((frames[0][0] + 80.0 * (MEL_BANDS as f64).sqrt()).abs() < 1e-9);
        assert!(frames[0][1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn mel_db_applies_dynamic_range_floor() {
        let mel = vec![vec![1.0, 1e-12], vec![0.5, 0.25]];
        let db = mel_db(&mel);
        assert!((db[0][0] - 0.0).abs() < 1e-12);
        assert!((db[0][1] + TOP_DB).abs() < 1e-12);
    }
}

//! Onset-strength envelope and peak picking, used as a syllable-rate proxy.

use super::frames::HOP_LENGTH;
use crate::types::ANALYSIS_SAMPLE_RATE;

const DELTA: f64 = 0.07;

/// Frames covered by `seconds` of audio at the analysis hop.
fn frames_for(seconds: f64) -> usize {
    (seconds * ANALYSIS_SAMPLE_RATE as f64 / HOP_LENGTH as f64) as usize
}

/// Mean positive first difference across mel bands of a dB mel spectrogram.
pub(crate) fn onset_strength(mel_db: &[Vec<f64>]) -> Vec<f64> {
    if mel_db.is_empty() {
        return Vec::new();
    }
    let mut envelope = Vec::with_capacity(mel_db.len());
    envelope.push(0.0);
    for pair in mel_db.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let bands = current.len().min(previous.len()).max(1);
        let rise: f64 = current
            .iter()
            .zip(previous)
            .map(|(now, before)| (now - before).max(0.0))
            .sum();
        envelope.push(rise / bands as f64);
    }
    envelope
}

/// Frame indices of onset peaks in `envelope`.
///
/// The envelope is rescaled to [0, 1]; a frame is a peak when it is the local
/// maximum of its 30 ms neighbourhood, exceeds the surrounding 100 ms mean by
/// `DELTA`, and is at least 30 ms past the previous peak.
pub(crate) fn detect_onsets(envelope: &[f64]) -> Vec<usize> {
    let Some(normalized) = normalize(envelope) else {
        return Vec::new();
    };
    let pre_max = frames_for(0.03).max(1);
    let post_max = frames_for(0.0) + 1;
    let pre_avg = frames_for(0.10);
    let post_avg = frames_for(0.10) + 1;
    let wait = frames_for(0.03);

    let len = normalized.len();
    let mut peaks: Vec<usize> = Vec::new();
    for n in 0..len {
        let value = normalized[n];
        let max_window = &normalized[n.saturating_sub(pre_max)..(n + post_max).min(len)];
        if max_window.iter().any(|v| *v > value) {
            continue;
        }
        let avg_window = &normalized[n.saturating_sub(pre_avg)..(n + post_avg).min(len)];
        let local_mean = avg_window.iter().sum::<f64>() / avg_window.len() as f64;
        if value < local_mean + DELTA {
            continue;
        }
        if let Some(&previous) = peaks.last() {
            if n <= previous + wait {
                continue;
            }
        }
        peaks.push(n);
    }
    peaks
}

fn normalize(envelope: &[f64]) -> Option<Vec<f64>> {
    let min = envelope.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = envelope.iter().map(|v| v - min).collect();
    let max = shifted.iter().copied().fold(0.0, f64::max);
    if !max.is_finite() || max <= 0.0 {
        return None;
    }
    Some(shifted.into_iter().map(|v| v / max).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_envelope_has_no_onsets() {
        assert!(detect_onsets(&[0.3; 50]).is_empty());
        assert!(detect_onsets(&[]).is_empty());
    }

    #[test]
    fn isolated_spikes_are_detected() {
        let mut envelope = vec![0.0; 60];
        envelope[10] = 1.0;
        envelope[30] = 0.8;
        envelope[50] = 0.9;
        assert_eq!(detect_onsets(&envelope), vec![10, 30, 50]);
    }

    #[test]
    fn adjacent_spikes_respect_wait() {
        let mut envelope = vec![0.0; 30];
        envelope[10] = 1.0;
        envelope[11] = 1.0;
        assert_eq!(detect_onsets(&envelope), vec![10]);
    }

    #[test]
    fn strength_only_counts_rising_energy() {
        let mel_db = vec![vec![0.0, 0.0], vec![10.0, -10.0], vec![0.0, 0.0]];
        assert_eq!(onset_strength(&mel_db), vec![0.0, 5.0, 5.0]);
    }
}

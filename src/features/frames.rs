//! Centered time-domain framing shared by the loudness, silence and ZCR measures.

pub(crate) const FRAME_LENGTH: usize = 2048;
pub(crate) const HOP_LENGTH: usize = 512;
const ZERO_THRESHOLD: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PadMode {
    Zeros,
    Edge,
}

/// Pad `frame_length / 2` samples on both ends so frame `t` is centered on sample `t * hop`.
pub(crate) fn centered(samples: &[f64], frame_length: usize, mode: PadMode) -> Vec<f64> {
    let pad = frame_length / 2;
    let (head, tail) = match mode {
        PadMode::Zeros => (0.0, 0.0),
        PadMode::Edge => (
            samples.first().copied().unwrap_or(0.0),
            samples.last().copied().unwrap_or(0.0),
        ),
    };
    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, head);
    padded.extend_from_slice(samples);
    padded.resize(padded.len() + pad, tail);
    padded
}

/// Full frames of `padded`, advancing by `hop`.
pub(crate) fn frames(padded: &[f64], frame_length: usize, hop: usize) -> impl Iterator<Item = &[f64]> {
    let count = if padded.len() < frame_length {
        0
    } else {
        1 + (padded.len() - frame_length) / hop
    };
    (0..count).map(move |idx| &padded[idx * hop..idx * hop + frame_length])
}

/// Root-mean-square energy of each centered frame.
pub(crate) fn frame_rms(samples: &[f64]) -> Vec<f64> {
    let padded = centered(samples, FRAME_LENGTH, PadMode::Zeros);
    frames(&padded, FRAME_LENGTH, HOP_LENGTH)
        .map(|frame| (frame.iter().map(|s| s * s).sum::<f64>() / frame.len() as f64).sqrt())
        .collect()
}

/// Fraction of adjacent sample pairs in each frame that change sign.
pub(crate) fn frame_zero_crossing_rate(samples: &[f64]) -> Vec<f64> {
    let padded = centered(samples, FRAME_LENGTH, PadMode::Edge);
    frames(&padded, FRAME_LENGTH, HOP_LENGTH)
        .map(|frame| {
            let crossings = frame
                .windows(2)
                .filter(|pair| is_positive(pair[0]) != is_positive(pair[1]))
                .count();
            crossings as f64 / frame.len() as f64
        })
        .collect()
}

// Near-zero samples count as positive so DC-free silence does not register crossings.
fn is_positive(sample: f64) -> bool {
    sample.abs() <= ZERO_THRESHOLD || sample > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_frames_cover_short_signals() {
        let samples = vec![0.5; 100];
        let rms = frame_rms(&samples);
        assert_eq!(rms.len(), 1);
        let expected = (100.0 * 0.25 / FRAME_LENGTH as f64).sqrt();
        assert!((rms[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn frame_count_follows_hop() {
        let samples = vec![0.0; 22_050];
        assert_eq!(frame_rms(&samples).len(), 1 + 22_050 / HOP_LENGTH);
    }

    #[test]
    fn alternating_signal_crosses_every_sample() {
        let samples: Vec<f64> = (0..8192)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let zcr = frame_zero_crossing_rate(&samples);
        let middle = zcr[zcr.len() / 2];
        assert!((middle - (FRAME_LENGTH - 1) as f64 / FRAME_LENGTH as f64).abs() < 1e-12);
    }

    #[test]
    fn constant_signal_never_crosses() {
        let zcr = frame_zero_crossing_rate(&vec![0.3; 4096]);
        assert!(zcr.iter().all(|&rate| rate == 0.0));
    }
}

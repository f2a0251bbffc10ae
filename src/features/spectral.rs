use aus::analysis;
use aus::spectrum;
use aus::WindowType;

use super::frames::{centered, PadMode, FRAME_LENGTH, HOP_LENGTH};
use crate::types::ANALYSIS_SAMPLE_RATE;

const ROLLOFF_PERCENT: f64 = 0.85;
const PITCH_FMIN: f64 = 150.0;
const PITCH_FMAX: f64 = 4000.0;
const PITCH_THRESHOLD: f64 = 0.1;
const CONTRAST_BANDS: usize = 6;
const CONTRAST_FMIN: f64 = 200.0;
const CONTRAST_QUANTILE: f64 = 0.02;
const CHROMA_BINS: usize = 12;
const CHROMA_CENTER_OCTAVE: f64 = 5.0;
const CHROMA_OCTAVE_WIDTH: f64 = 2.0;
const A440: f64 = 440.0;
const TUNING_BINS: usize = 100;
const AMIN: f64 = 1e-10;

/// Short-time spectra of the centered signal, frames-by-bins.
pub(crate) struct Spectrogram {
    pub magnitude: Vec<Vec<f64>>,
    pub power: Vec<Vec<f64>>,
    pub freqs: Vec<f64>,
}

pub(crate) fn compute_spectrogram(samples: &[f64]) -> Spectrogram {
    let padded = centered(samples, FRAME_LENGTH, PadMode::Zeros);
    let stft = spectrum::rstft(&padded, FRAME_LENGTH, HOP_LENGTH, WindowType::Hanning);
    let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
    let power = analysis::make_power_spectrogram(&magnitude);
    let freqs = spectrum::rfftfreq(FRAME_LENGTH, ANALYSIS_SAMPLE_RATE);
    Spectrogram {
        magnitude,
        power,
        freqs,
    }
}

/// Magnitude-weighted mean frequency of every frame; 0.0 for silent frames.
pub(crate) fn centroids(spec: &Spectrogram) -> Vec<f64> {
    spec.magnitude
        .iter()
        .map(|frame| frame_centroid(frame, &spec.freqs))
        .collect()
}

fn frame_centroid(frame: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = frame.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    frame.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / total
}

/// Second-order spread of each frame's spectrum around its centroid.
pub(crate) fn bandwidths(spec: &Spectrogram) -> Vec<f64> {
    spec.magnitude
        .iter()
        .map(|frame| {
            let total: f64 = frame.iter().sum();
            if total <= 0.0 {
                return 0.0;
            }
            let centroid = frame_centroid(frame, &spec.freqs);
            let spread: f64 = frame
                .iter()
                .zip(&spec.freqs)
                .map(|(m, f)| (m / total) * (f - centroid).powi(2))
                .sum();
            spread.sqrt()
        })
        .collect()
}

/// Lowest frequency below which 85% of each frame's magnitude lies.
pub(crate) fn rolloffs(spec: &Spectrogram) -> Vec<f64> {
    spec.magnitude
        .iter()
        .map(|frame| {
            let threshold = ROLLOFF_PERCENT * frame.iter().sum::<f64>();
            let mut cumulative = 0.0;
            for (magnitude, freq) in frame.iter().zip(&spec.freqs) {
                cumulative += magnitude;
                if cumulative >= threshold {
                    return *freq;
                }
            }
            spec.freqs.last().copied().unwrap_or(0.0)
        })
        .collect()
}

/// Per-frame pitch from the strongest spectral peak between 150 Hz and 4 kHz.
///
/// A frame is voiced when that bin is a local maximum above a tenth of the
/// frame's peak magnitude; unvoiced frames report 0.0.
pub(crate) fn pitch_track(spec: &Spectrogram) -> Vec<f64> {
    spec.magnitude
        .iter()
        .map(|frame| {
            frame_peaks(frame, &spec.freqs)
                .into_iter()
                .fold(None, |best: Option<(f64, f64)>, peak| match best {
                    Some(current) if current.0 >= peak.0 => Some(current),
                    _ => Some(peak),
                })
                .map_or(0.0, |(_, pitch)| pitch)
        })
        .collect()
}

/// Parabolically interpolated `(magnitude, frequency)` of every qualifying peak in a frame.
fn frame_peaks(frame: &[f64], freqs: &[f64]) -> Vec<(f64, f64)> {
    let bin_hz = ANALYSIS_SAMPLE_RATE as f64 / FRAME_LENGTH as f64;
    if frame.len() < 3 {
        return Vec::new();
    }
    let reference = PITCH_THRESHOLD * frame.iter().copied().fold(0.0, f64::max);
    let mut peaks = Vec::new();
    for bin in 1..frame.len() - 1 {
        let freq = freqs.get(bin).copied().unwrap_or(bin as f64 * bin_hz);
        if !(PITCH_FMIN..PITCH_FMAX).contains(&freq) {
            continue;
        }
        let (prev, here, next) = (frame[bin - 1], frame[bin], frame[bin + 1]);
        if !(here > prev && here >= next && here > reference) {
            continue;
        }
        let curvature = 2.0 * here - prev - next;
        let shift = if curvature.abs() > 0.0 {
            0.5 * (next - prev) / curvature
        } else {
            0.0
        };
        peaks.push((here + 0.25 * (next - prev) * shift, (bin as f64 + shift) * bin_hz));
    }
    peaks
}

/// Deviation from A440 tuning in fractions of a semitone, within `[-0.5, 0.5)`.
///
/// Peaks of the power spectrum at or above their median strength vote in a
/// histogram of 0.01-semitone bins; the fullest bin's lower edge wins.
fn estimate_tuning(spec: &Spectrogram) -> f64 {
    let peaks: Vec<(f64, f64)> = spec
        .power
        .iter()
        .flat_map(|frame| frame_peaks(frame, &spec.freqs))
        .filter(|(_, pitch)| *pitch > 0.0)
        .collect();
    if peaks.is_empty() {
        return 0.0;
    }
    let mut strengths: Vec<f64> = peaks.iter().map(|(magnitude, _)| *magnitude).collect();
    strengths.sort_by(f64::total_cmp);
    let mid = strengths.len() / 2;
    let threshold = if strengths.len() % 2 == 0 {
        0.5 * (strengths[mid - 1] + strengths[mid])
    } else {
        strengths[mid]
    };

    let edges = TUNING_BINS as f64;
    let mut counts = vec![0usize; TUNING_BINS - 1];
    for (_, pitch) in peaks.iter().filter(|(magnitude, _)| *magnitude >= threshold) {
        let mut residual = (CHROMA_BINS as f64 * octaves_above_a0(*pitch, 0.0)).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }
        // Residuals in the top 0.01 fall past the last bin.
        let slot = ((residual + 0.5) * edges).floor() as usize;
        if let Some(count) = counts.get_mut(slot) {
            *count += 1;
        }
    }
    let best = counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (slot, count)| if *count > best.1 { (slot, *count) } else { best })
        .0;
    -0.5 + best as f64 / edges
}

fn octaves_above_a0(freq: f64, tuning: f64) -> f64 {
    let a440 = A440 * 2f64.powf(tuning / CHROMA_BINS as f64);
    (freq / (a440 / 16.0)).log2()
}

/// Power folded into 12 pitch classes (C first), each frame scaled to a peak of 1.
pub(crate) fn chroma(spec: &Spectrogram) -> Vec<Vec<f64>> {
    let filters = chroma_filters(&spec.freqs, estimate_tuning(spec));
    spec.power
        .iter()
        .map(|frame| {
            let mut classes: Vec<f64> = filters
                .iter()
                .map(|weights| weights.iter().zip(frame).map(|(w, p)| w * p).sum::<f64>())
                .collect();
            let peak = classes.iter().copied().fold(0.0, f64::max);
            if peak > 0.0 {
                classes.iter_mut().for_each(|c| *c /= peak);
            }
            classes
        })
        .collect()
}

/// Soft chroma filterbank, classes-by-bins.
///
/// Each bin spreads over neighbouring pitch classes with a Gaussian one bin-width wide,
/// columns are L2-normalized, then weighted by a Gaussian over octaves centred on C5.
fn chroma_filters(freqs: &[f64], tuning: f64) -> Vec<Vec<f64>> {
    let n_chroma = CHROMA_BINS as f64;
    let mut positions: Vec<f64> = freqs
        .iter()
        .map(|f| n_chroma * octaves_above_a0(*f, tuning))
        .collect();
    if positions.len() > 1 {
        positions[0] = positions[1] - 1.5 * n_chroma;
    }
    let bin_hz = ANALYSIS_SAMPLE_RATE as f64 / FRAME_LENGTH as f64;
    let widths: Vec<f64> = (0..positions.len())
        .map(|bin| {
            let next = positions.get(bin + 1).copied().unwrap_or_else(|| {
                n_chroma * octaves_above_a0((bin + 1) as f64 * bin_hz, tuning)
            });
            (next - positions[bin]).max(1.0)
        })
        .collect();

    // Rows start at A; rotated below so that C comes first.
    let mut filters = vec![vec![0.0; positions.len()]; CHROMA_BINS];
    for (bin, (position, width)) in positions.iter().zip(&widths).enumerate() {
        let column: Vec<f64> = (0..CHROMA_BINS)
            .map(|class| {
                let half = (n_chroma / 2.0).round();
                let distance =
                    (position - class as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
                (-0.5 * (2.0 * distance / width).powi(2)).exp()
            })
            .collect();
        let norm = column.iter().map(|w| w * w).sum::<f64>().sqrt();
        let octave_gain = (-0.5
            * ((position / n_chroma - CHROMA_CENTER_OCTAVE) / CHROMA_OCTAVE_WIDTH).powi(2))
        .exp();
        for (class, weight) in column.into_iter().enumerate() {
            let normalized = if norm > 0.0 { weight / norm } else { weight };
            filters[(class + CHROMA_BINS - 3) % CHROMA_BINS][bin] = normalized * octave_gain;
        }
    }
    filters
}

/// Peak-to-valley ratio in dB for six octave bands above 200 Hz plus the residual band.
pub(crate) fn contrast(spec: &Spectrogram) -> Vec<Vec<f64>> {
    let bands = contrast_bands(&spec.freqs);
    spec.magnitude
        .iter()
        .map(|frame| {
            bands
                .iter()
                .map(|range| band_contrast(&frame[range.clone()]))
                .collect()
        })
        .collect()
}

fn contrast_bands(freqs: &[f64]) -> Vec<std::ops::Range<usize>> {
    let mut edges = vec![0.0];
    edges.extend((0..=CONTRAST_BANDS).map(|k| CONTRAST_FMIN * 2f64.powi(k as i32)));

    let mut bands = Vec::with_capacity(CONTRAST_BANDS + 1);
    for k in 0..=CONTRAST_BANDS {
        let (low, high) = (edges[k], edges[k + 1]);
        let inside: Vec<usize> = freqs
            .iter()
            .enumerate()
            .filter(|(_, f)| **f >= low && **f <= high)
            .map(|(idx, _)| idx)
            .collect();
        let (Some(&first), Some(&last)) = (inside.first(), inside.last()) else {
            continue;
        };
        // Each band borrows the bin just below it; the top band runs to Nyquist.
        let start = if k > 0 { first.saturating_sub(1) } else { first };
        let end = if k == CONTRAST_BANDS {
            freqs.len()
        } else {
            last.max(start + 1)
        };
        if end > start {
            bands.push(start..end);
        }
    }
    bands
}

fn band_contrast(band: &[f64]) -> f64 {
    if band.is_empty() {
        return 0.0;
    }
    let mut sorted = band.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let take = ((CONTRAST_QUANTILE * sorted.len() as f64).round() as usize).clamp(1, sorted.len());
    let valley = sorted[..take].iter().sum::<f64>() / take as f64;
    let peak = sorted[sorted.len() - take..].iter().sum::<f64>() / take as f64;
    power_to_db(peak) - power_to_db(valley)
}

pub(crate) fn power_to_db(value: f64) -> f64 {
    10.0 * value.max(AMIN).log10()
}

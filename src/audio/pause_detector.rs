//! Silence/non-silence segmentation over frame-wise RMS energy.

/// Frames quieter than this many decibels below the loudest frame count as silence.
pub const DEFAULT_TOP_DB: f64 = 20.0;

/// Half-open sample span `[start, end)` of audible signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

impl Interval {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split a signal into non-silent sample intervals.
///
/// # Parameters
/// * `frame_rms` - RMS energy of centered frames, one entry per hop
/// * `hop_length` - samples between consecutive frame centers
/// * `signal_len` - number of samples in the unpadded signal
/// * `top_db` - threshold below the peak frame, in decibels
///
/// A signal whose loudest frame carries no energy has no audible interval.
pub fn non_silent_intervals(
    frame_rms: &[f64],
    hop_length: usize,
    signal_len: usize,
    top_db: f64,
) -> Vec<Interval> {
    let peak = frame_rms.iter().copied().fold(0.0_f64, f64::max);
    if peak <= f64::EPSILON || signal_len == 0 {
        return Vec::new();
    }
    let threshold = peak * 10f64.powf(-top_db / 20.0);

    let mut intervals = Vec::new();
    let mut run_start: Option<usize> = None;
    for (frame, &energy) in frame_rms.iter().enumerate() {
        if energy > threshold {
            run_start.get_or_insert(frame);
        } else if let Some(start) = run_start.take() {
            push_interval(&mut intervals, start, frame, hop_length, signal_len);
        }
    }
    if let Some(start) = run_start {
        push_interval(
            &mut intervals,
            start,
            frame_rms.len(),
            hop_length,
            signal_len,
        );
    }
    intervals
}

fn push_interval(
    intervals: &mut Vec<Interval>,
    start_frame: usize,
    end_frame: usize,
    hop_length: usize,
    signal_len: usize,
) {
    let interval = Interval {
        start: (start_frame * hop_length).min(signal_len),
        end: (end_frame * hop_length).min(signal_len),
    };
    if !interval.is_empty() {
        intervals.push(interval);
    }
}

/// Fraction of the clip spent in silence, in `[0, 1]`.
///
/// Returns 0.0 for a zero-length clip rather than dividing by zero.
pub fn pause_ratio(intervals: &[Interval], duration_secs: f64, sample_rate: u32) -> f64 {
    if duration_secs <= 0.0 || sample_rate == 0 {
        return 0.0;
    }
    let voiced_samples: usize = intervals.iter().map(Interval::len).sum();
    let voiced_secs = voiced_samples as f64 / sample_rate as f64;
    (1.0 - voiced_secs / duration_secs).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_signal_is_all_pause() {
        let rms = vec![0.0; 216];
        let intervals = non_silent_intervals(&rms, 512, 110_250, DEFAULT_TOP_DB);
        assert!(intervals.is_empty());
        assert_eq!(pause_ratio(&intervals, 5.0, 22_050), 1.0);
    }

    #[test]
    fn zero_duration_has_no_pause() {
        assert_eq!(pause_ratio(&[], 0.0, 22_050), 0.0);
    }

    #[test]
    fn quiet_gap_splits_intervals() {
        // loud, loud, quiet (-40 dB), loud
        let rms = vec![0.5, 0.5, 0.005, 0.5];
        let intervals = non_silent_intervals(&rms, 100, 400, DEFAULT_TOP_DB);
        assert_eq!(
            intervals,
            vec![
                Interval { start: 0, end: 200 },
                Interval {
                    start: 300,
                    end: 400
                }
            ]
        );
        let ratio = pause_ratio(&intervals, 4.0, 100);
        assert!((ratio - 0.25).abs() < 1e-12);
    }

    #[test]
    fn trailing_interval_is_clipped_to_signal() {
        let rms = vec![0.2, 0.2, 0.2];
        let intervals = non_silent_intervals(&rms, 512, 700, DEFAULT_TOP_DB);
        assert_eq!(intervals, vec![Interval { start: 0, end: 700 }]);
    }
}

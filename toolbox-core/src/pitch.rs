//! # Pitch Detection Module
//!
//! This module implements the McLeod Pitch Method: a normalized square
//! difference function (NSDF) computed in the lag domain, a peak picker over
//! its positive maxima, and parabolic interpolation for sub-sample accuracy.
//!
//! ## Features
//! - NSDF autocorrelation, normalized so that lag 0 is exactly 1
//! - Highest-peak selection with a tie tolerance against sub-harmonic lags
//! - Parabolic interpolation with a flat-peak fallback
//! - RMS volume for onset detection in the stability gate
//!
//! The NSDF is O(N²) in the window length. Callers evaluate it at a fixed,
//! throttled cadence (see [`crate::tuner::Tuner`]), never once per audio chunk.

use serde::Serialize;

/// Default analysis window length in samples.
///
/// Long enough to hold several periods of a low E string (~82 Hz) at 44.1 kHz.
pub const WINDOW_SIZE: usize = 4096;

/// Peaks within this distance of the highest NSDF peak count as tied with it;
/// the earliest tied lag wins. Periodic signals produce near-identical peaks at
/// every multiple of the true period.
pub const PEAK_TOLERANCE: f32 = 0.01;

/// The result of one estimation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchEstimate {
    /// Detected frequency in Hz, or `-1.0` when no pitch was found.
    pub frequency_hz: f32,
    /// NSDF value at the chosen peak, in `[-1, 1]`.
    pub clarity: f32,
}

impl PitchEstimate {
    /// Sentinel for "no periodicity found".
    pub const NONE: PitchEstimate = PitchEstimate {
        frequency_hz: -1.0,
        clarity: 0.0,
    };

    /// Whether the estimator found any peak at all.
    pub fn is_pitched(&self) -> bool {
        self.frequency_hz > 0.0
    }
}

/// Stateful wrapper that reuses its NSDF scratch buffer between calls.
#[derive(Debug, Default)]
pub struct PitchEstimator {
    nsdf: Vec<f32>,
}

impl PitchEstimator {
    pub fn new() -> Self {
        Self {
            nsdf: Vec::with_capacity(WINDOW_SIZE / 2),
        }
    }

    /// Estimates the fundamental frequency of `signal`.
    ///
    /// # Arguments
    /// * `signal` - Mono audio window (typically [`WINDOW_SIZE`] samples)
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * A [`PitchEstimate`]; [`PitchEstimate::NONE`] for silence or aperiodic input
    pub fn estimate(&mut self, signal: &[f32], sample_rate: u32) -> PitchEstimate {
        normalized_square_difference(signal, &mut self.nsdf);

        let Some(peak) = select_peak(&self.nsdf) else {
            return PitchEstimate::NONE;
        };

        // Candidates always have a neighbour on both sides.
        let refined = parabolic_interpolation(
            peak,
            self.nsdf[peak - 1],
            self.nsdf[peak],
            self.nsdf[peak + 1],
        );

        PitchEstimate {
            frequency_hz: sample_rate as f32 / refined,
            clarity: self.nsdf[peak],
        }
    }

    /// The NSDF computed by the most recent [`estimate`](Self::estimate) call.
    pub fn last_nsdf(&self) -> &[f32] {
        &self.nsdf
    }
}

/// Computes the NSDF of `signal` for lags `0..signal.len() / 2` into `out`.
///
/// `nsdf(τ) = 2·Σ x[i]x[i+τ] / Σ (x[i]² + x[i+τ]²)` over the first half of the
/// window. Lags whose energy term is zero (silence) are reported as 0.
pub fn normalized_square_difference(signal: &[f32], out: &mut Vec<f32>) {
    let cutoff = signal.len() / 2;
    out.clear();
    out.reserve(cutoff);

    let head = &signal[..cutoff];
    for tau in 0..cutoff {
        let lagged = &signal[tau..tau + cutoff];
        let (acf, divisor) = head
            .iter()
            .zip(lagged)
            .fold((0.0_f32, 0.0_f32), |(acf, divisor), (&a, &b)| {
                (acf + a * b, divisor + (a * a + b * b))
            });

        out.push(if divisor > 0.0 { 2.0 * acf / divisor } else { 0.0 });
    }
}

/// Picks the winning lag among the positive local maxima of `nsdf`.
///
/// A lag `τ ≥ 1` is a candidate when `nsdf[τ] > 0`, `nsdf[τ] > nsdf[τ-1]`
/// and `nsdf[τ] >= nsdf[τ+1]`. The highest candidate wins, with candidates
/// within [`PEAK_TOLERANCE`] of it treated as equal (earliest first).
pub fn select_peak(nsdf: &[f32]) -> Option<usize> {
    if nsdf.len() < 3 {
        return None;
    }

    let candidates: Vec<usize> = (1..nsdf.len() - 1)
        .filter(|&tau| {
            let y = nsdf[tau];
            y > 0.0 && y > nsdf[tau - 1] && y >= nsdf[tau + 1]
        })
        .collect();

    let highest = candidates
        .iter()
        .map(|&tau| nsdf[tau])
        .fold(f32::NEG_INFINITY, f32::max);

    candidates
        .into_iter()
        .find(|&tau| nsdf[tau] >= highest - PEAK_TOLERANCE)
}

/// Refines an integer peak position by fitting a parabola through its
/// neighbours. A flat (zero-curvature) fit returns the peak unchanged.
pub fn parabolic_interpolation(peak: usize, y1: f32, y2: f32, y3: f32) -> f32 {
    let a = (y1 + y3 - 2.0 * y2) / 2.0;
    let b = (y3 - y1) / 2.0;
    if a == 0.0 {
        return peak as f32;
    }
    peak as f32 - b / (2.0 * a)
}

/// Root-mean-square level of a window, used as its loudness.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TAU * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn silence_has_no_pitch() {
        let mut estimator = PitchEstimator::new();
        let estimate = estimator.estimate(&vec![0.0; WINDOW_SIZE], 44_100);
        assert_eq!(estimate, PitchEstimate::NONE);
        assert!(!estimate.is_pitched());
        assert_eq!(estimate.clarity, 0.0);
    }

    #[test]
    fn lag_zero_is_exactly_one() {
        let signal: Vec<f32> = (0..512).map(|i| ((i * 7919) % 113) as f32 / 113.0 - 0.5).collect();
        let mut nsdf = Vec::new();
        normalized_square_difference(&signal, &mut nsdf);
        assert_eq!(nsdf.len(), 256);
        assert_eq!(nsdf[0], 1.0);
    }

    #[test]
    fn detects_a440() {
        let mut estimator = PitchEstimator::new();
        let estimate = estimator.estimate(&sine(440.0, 44_100, WINDOW_SIZE), 44_100);
        assert!(
            (estimate.frequency_hz - 440.0).abs() < 1.0,
            "got {}",
            estimate.frequency_hz
        );
        assert!(estimate.clarity > 0.99);
    }

    #[test]
    fn detects_low_e_at_48k() {
        let mut estimator = PitchEstimator::new();
        let estimate = estimator.estimate(&sine(82.41, 48_000, WINDOW_SIZE), 48_000);
        assert!(
            (estimate.frequency_hz - 82.41).abs() < 1.0,
            "got {}",
            estimate.frequency_hz
        );
    }

    #[test]
    fn highest_peak_beats_first_peak() {
        let nsdf = [1.0, 0.2, 0.5, 0.1, 0.9, 0.3, 0.0];
        assert_eq!(select_peak(&nsdf), Some(4));
    }

    #[test]
    fn near_tied_peaks_prefer_earliest() {
        let nsdf = [1.0, 0.2, 0.995, 0.1, 0.999, 0.3, 0.0];
        assert_eq!(select_peak(&nsdf), Some(2));
    }

    #[test]
    fn negative_maxima_are_ignored() {
        let nsdf = [1.0, -0.5, -0.2, -0.6, -0.9];
        assert_eq!(select_peak(&nsdf), None);
    }

    #[test]
    fn parabolic_interpolation_recovers_vertex() {
        // y = -(x - 10.25)^2 sampled at 9, 10, 11
        let f = |x: f32| -(x - 10.25) * (x - 10.25);
        let refined = parabolic_interpolation(10, f(9.0), f(10.0), f(11.0));
        assert!((refined - 10.25).abs() < 1e-4);
    }

    #[test]
    fn flat_peak_falls_back_to_integer_lag() {
        assert_eq!(parabolic_interpolation(42, 0.7, 0.7, 0.7), 42.0);
    }

    #[test]
    fn rms_of_full_scale_sine() {
        let level = rms(&sine(1000.0, 48_000, 4800));
        assert!((level - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert_eq!(rms(&[]), 0.0);
    }
}

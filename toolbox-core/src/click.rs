//! # Click Synthesis Module
//!
//! The metronome's audible beat: a short sine burst held at full gain for
//! the first millisecond, decaying exponentially to 0.001 by 20 ms and cut
//! at the end of the tone.

use std::f32::consts::TAU;

use crate::config::SchedulerConfig;

const ATTACK_SECS: f64 = 0.001;
const DECAY_END_SECS: f64 = 0.02;
const DECAY_FLOOR: f64 = 0.001;

/// A tone request handed to a [`crate::metronome::ToneEmitter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_secs: f64,
}

impl Tone {
    /// Higher-pitched click for the first beat of a bar.
    pub fn accent(config: &SchedulerConfig) -> Self {
        Self {
            frequency_hz: config.accent_frequency_hz,
            duration_secs: config.click_duration_secs(),
        }
    }

    /// Click for every other beat.
    pub fn regular(config: &SchedulerConfig) -> Self {
        Self {
            frequency_hz: config.beat_frequency_hz,
            duration_secs: config.click_duration_secs(),
        }
    }

    /// The click for a given position in the bar.
    pub fn for_beat(beat_index: u32, config: &SchedulerConfig) -> Self {
        if beat_index == 0 {
            Self::accent(config)
        } else {
            Self::regular(config)
        }
    }
}

/// Gain of the click envelope `t` seconds after onset.
pub fn envelope(t: f64, duration_secs: f64) -> f32 {
    if t < 0.0 || t >= duration_secs {
        return 0.0;
    }
    if t <= ATTACK_SECS {
        return 1.0;
    }
    let progress = ((t - ATTACK_SECS) / (DECAY_END_SECS - ATTACK_SECS)).min(1.0);
    DECAY_FLOOR.powf(progress) as f32
}

/// Renders `tone` to mono samples at `sample_rate`.
pub fn render_tone(tone: &Tone, sample_rate: u32) -> Vec<f32> {
    let len = (tone.duration_secs * sample_rate as f64).round() as usize;
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (TAU * tone.frequency_hz * t as f32).sin() * envelope(t, tone.duration_secs)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accent_is_higher_than_regular() {
        let config = SchedulerConfig::default();
        assert_eq!(Tone::for_beat(0, &config).frequency_hz, 1000.0);
        assert_eq!(Tone::for_beat(3, &config).frequency_hz, 800.0);
    }

    #[test]
    fn envelope_shape() {
        assert_eq!(envelope(0.0, 0.03), 1.0);
        assert!((envelope(0.02, 0.03) - 0.001).abs() < 1e-6);
        assert!(envelope(0.01, 0.03) < 1.0);
        assert!(envelope(0.01, 0.03) > 0.001);
        assert_eq!(envelope(0.03, 0.03), 0.0);
        assert_eq!(envelope(-0.001, 0.03), 0.0);
    }

    #[test]
    fn rendered_length_matches_duration() {
        let tone = Tone::regular(&SchedulerConfig::default());
        let samples = render_tone(&tone, 48_000);
        assert_eq!(samples.len(), 1440);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }
}

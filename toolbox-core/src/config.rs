//! # Configuration Module
//!
//! Static tool settings for the metronome and the tuner. Every field has a
//! default matching the documented constants, so a host can deserialize a
//! partial JSON object and get sensible values for whatever it leaves out.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pitch::WINDOW_SIZE;

/// Settings consumed by [`crate::metronome::BeatScheduler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How far ahead of the audio clock beats are handed to the tone emitter.
    pub lookahead_ms: u64,
    /// Period of the host timer that calls `on_wake`.
    pub wake_interval_ms: u64,
    /// Gap between `start` and the first beat.
    pub start_delay_ms: u64,
    /// Pitch of the accented first beat of each bar.
    pub accent_frequency_hz: f32,
    /// Pitch of every other beat.
    pub beat_frequency_hz: f32,
    /// Length of a single click.
    pub click_duration_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 100,
            wake_interval_ms: 25,
            start_delay_ms: 50,
            accent_frequency_hz: 1000.0,
            beat_frequency_hz: 800.0,
            click_duration_ms: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn lookahead_secs(&self) -> f64 {
        self.lookahead_ms as f64 / 1000.0
    }

    pub fn start_delay_secs(&self) -> f64 {
        self.start_delay_ms as f64 / 1000.0
    }

    pub fn wake_interval(&self) -> Duration {
        Duration::from_millis(self.wake_interval_ms)
    }

    pub fn click_duration_secs(&self) -> f64 {
        self.click_duration_ms as f64 / 1000.0
    }
}

/// Settings consumed by [`crate::tuner::Tuner`] and its stability gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Analysis window length in samples.
    pub window_size: usize,
    /// Minimum time between two pitch evaluations.
    pub update_interval_ms: u64,
    /// How long an accepted note holds before another may replace it.
    pub settle_time_ms: u64,
    /// RMS increase between two ticks that counts as a new note onset.
    pub volume_threshold: f32,
    /// Estimates at or below this clarity are treated as no pitch.
    pub min_clarity: f32,
    /// Exclusive lower frequency bound in Hz.
    pub min_frequency_hz: f32,
    /// Exclusive upper frequency bound in Hz.
    pub max_frequency_hz: f32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            update_interval_ms: 100,
            settle_time_ms: 1500,
            volume_threshold: 0.1,
            min_clarity: 0.9,
            min_frequency_hz: 20.0,
            max_frequency_hz: 5000.0,
        }
    }
}

impl TunerConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_time_ms)
    }
}

/// Both tool configurations, as read from a single host config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolboxConfig {
    pub metronome: SchedulerConfig,
    pub tuner: TunerConfig,
}

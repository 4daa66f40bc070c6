//! # Note Stability Module
//!
//! Hysteresis between the pitch estimator and the display. Without it, vibrato
//! and background noise make the shown note flicker between neighbours many
//! times a second. An accepted note holds for the settle time unless the
//! signal gets noticeably louder, which marks a fresh onset.

use std::time::{Duration, Instant};
use tracing::trace;

use crate::config::TunerConfig;
use crate::notes::{map_frequency, NoteObservation};
use crate::pitch::PitchEstimate;

/// What the tuner is currently showing and the bookkeeping behind it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TunerDisplayState {
    /// The displayed note, or `None` when idle.
    pub current: Option<NoteObservation>,
    /// Whether the displayed note is still inside its settle time.
    pub settled: bool,
    /// When the displayed note was accepted.
    pub last_accepted: Option<Instant>,
    /// RMS volume seen on the previous update.
    pub last_volume: f32,
}

/// Decides whether a new estimate replaces the displayed observation.
#[derive(Debug, Clone)]
pub struct StabilityGate {
    settle_time: Duration,
    volume_threshold: f32,
    min_clarity: f32,
    min_frequency_hz: f32,
    max_frequency_hz: f32,
    state: TunerDisplayState,
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self::new(&TunerConfig::default())
    }
}

impl StabilityGate {
    pub fn new(config: &TunerConfig) -> Self {
        Self {
            settle_time: config.settle_time(),
            volume_threshold: config.volume_threshold,
            min_clarity: config.min_clarity,
            min_frequency_hz: config.min_frequency_hz,
            max_frequency_hz: config.max_frequency_hz,
            state: TunerDisplayState::default(),
        }
    }

    pub fn state(&self) -> &TunerDisplayState {
        &self.state
    }

    /// Returns the gate to its freshly-opened, empty state.
    pub fn reset(&mut self) {
        self.state = TunerDisplayState::default();
    }

    /// Whether an estimate is clear enough and inside the audible range.
    pub fn accepts(&self, estimate: &PitchEstimate) -> bool {
        estimate.clarity > self.min_clarity
            && estimate.frequency_hz > self.min_frequency_hz
            && estimate.frequency_hz < self.max_frequency_hz
    }

    /// Feeds one evaluation tick into the gate.
    ///
    /// # Arguments
    /// * `estimate` - Output of the pitch estimator for this tick
    /// * `volume` - RMS level of the analysed window
    /// * `now` - Time of this tick
    ///
    /// # Returns
    /// * The observation to display after this tick, or `None` when idle
    pub fn update(
        &mut self,
        estimate: PitchEstimate,
        volume: f32,
        now: Instant,
    ) -> Option<NoteObservation> {
        let since_accepted = self
            .state
            .last_accepted
            .map(|at| now.saturating_duration_since(at));
        let settle_elapsed = since_accepted.is_none_or(|d| d > self.settle_time);

        // Settled expires on its own once the settle time has run out.
        if since_accepted.is_none_or(|d| d >= self.settle_time) {
            self.state.settled = false;
        }

        let volume_increase = volume - self.state.last_volume;
        self.state.last_volume = volume;

        if self.accepts(&estimate) {
            let onset = volume_increase > self.volume_threshold;
            if !self.state.settled || onset || settle_elapsed {
                let observation = map_frequency(estimate.frequency_hz);
                trace!(
                    note = %observation.label(),
                    frequency = estimate.frequency_hz,
                    onset,
                    "accepted note"
                );
                self.state.current = Some(observation);
                self.state.settled = true;
                self.state.last_accepted = Some(now);
            }
        } else if settle_elapsed {
            if self.state.current.take().is_some() {
                trace!("no pitch, display cleared");
            }
            self.state.settled = false;
        }

        self.state.current
    }
}

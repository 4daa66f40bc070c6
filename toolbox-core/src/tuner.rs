//! # Tuner Session Module
//!
//! Ties the pitch pipeline together for one open tuner window:
//! incoming audio refreshes a sliding window, and at most once per update
//! interval the window is run through estimator → note mapper → stability gate.
//!
//! Audio arrives far more often than the O(N²) estimator can afford to run,
//! so `push_samples` only copies data and `poll` does the throttled work.

use std::collections::VecDeque;
use std::time::Instant;
use serde::Serialize;
use tracing::debug;

use crate::config::TunerConfig;
use crate::notes::NoteObservation;
use crate::pitch::{rms, PitchEstimate, PitchEstimator};
use crate::stability::{StabilityGate, TunerDisplayState};

/// The most recent `capacity` samples of a continuous mono stream.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a chunk, discarding the oldest samples beyond capacity.
    pub fn push(&mut self, chunk: &[f32]) {
        let chunk = if chunk.len() > self.capacity {
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };
        let overflow = (self.samples.len() + chunk.len()).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(chunk.iter().copied());
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest-first view of the buffered samples.
    pub fn as_slice(&mut self) -> &[f32] {
        self.samples.make_contiguous()
    }
}

/// What one evaluation tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TunerTick {
    pub estimate: PitchEstimate,
    pub volume: f32,
    /// The observation to show after this tick, `None` when idle.
    pub display: Option<NoteObservation>,
}

/// One tuner tool instance.
#[derive(Debug)]
pub struct Tuner {
    config: TunerConfig,
    sample_rate: u32,
    window: SampleWindow,
    estimator: PitchEstimator,
    gate: StabilityGate,
    last_evaluation: Option<Instant>,
}

impl Tuner {
    pub fn new(config: TunerConfig, sample_rate: u32) -> Self {
        debug!(
            sample_rate,
            window = config.window_size,
            "tuner opened"
        );
        Self {
            window: SampleWindow::new(config.window_size),
            estimator: PitchEstimator::new(),
            gate: StabilityGate::new(&config),
            config,
            sample_rate,
            last_evaluation: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffers newly captured audio. Cheap; never runs the estimator.
    pub fn push_samples(&mut self, chunk: &[f32]) {
        self.window.push(chunk);
    }

    /// Whether the update interval has passed since the last evaluation.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_evaluation
            .is_none_or(|at| now.saturating_duration_since(at) >= self.config.update_interval())
    }

    /// Evaluates the current window if an update is due.
    pub fn poll(&mut self, now: Instant) -> Option<TunerTick> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.evaluate(now))
    }

    /// Evaluates the current window unconditionally.
    ///
    /// A window that has not filled up yet counts as "no pitch".
    pub fn evaluate(&mut self, now: Instant) -> TunerTick {
        self.last_evaluation = Some(now);

        let full = self.window.is_full();
        let samples = self.window.as_slice();
        let volume = rms(samples);
        let estimate = if full {
            self.estimator.estimate(samples, self.sample_rate)
        } else {
            PitchEstimate::NONE
        };

        let display = self.gate.update(estimate, volume, now);
        TunerTick {
            estimate,
            volume,
            display,
        }
    }

    pub fn display(&self) -> Option<NoteObservation> {
        self.gate.state().current
    }

    pub fn display_state(&self) -> &TunerDisplayState {
        self.gate.state()
    }

    /// Empties the window and the display, as when the tool is reopened.
    pub fn reset(&mut self) {
        self.window.clear();
        self.gate.reset();
        self.last_evaluation = None;
    }
}

//! # Metronome Scheduling Module
//!
//! Look-ahead beat scheduling. The host's periodic timer is coarse and
//! jitters under load, so it never decides *when* a click sounds. Each
//! wake-up only hands every beat that falls inside the look-ahead window to
//! the audio output together with its exact timestamp on the hardware clock;
//! the output then starts the click sample-accurately.
//!
//! ```text
//! wake-ups:   |--25ms--|--25ms--|--25ms--|
//! lookahead:  [ now ......... now+100ms )
//! beats:         ^ next_note_time   ^ +60/bpm
//! ```

use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::click::Tone;
use crate::config::SchedulerConfig;

pub const MIN_BPM: f64 = 40.0;
pub const MAX_BPM: f64 = 240.0;
pub const DEFAULT_BPM: f64 = 120.0;

/// Tempo multiplier applied when switching to a compound meter.
const COMPOUND_TEMPO_SCALE: f64 = 1.5;

/// Clamps a tempo into `[MIN_BPM, MAX_BPM]`. NaN maps to the minimum.
pub fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() {
        return MIN_BPM;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// The supported meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeSignature {
    OneFour,
    TwoFour,
    ThreeFour,
    #[default]
    FourFour,
    FiveFour,
    SixEight,
    SevenEight,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeSignatureError {
    #[error("unsupported time signature `{0}` (expected 1/4, 2/4, 3/4, 4/4, 5/4, 6/8 or 7/8)")]
    Unsupported(String),
}

impl TimeSignature {
    pub const ALL: [TimeSignature; 7] = [
        TimeSignature::OneFour,
        TimeSignature::TwoFour,
        TimeSignature::ThreeFour,
        TimeSignature::FourFour,
        TimeSignature::FiveFour,
        TimeSignature::SixEight,
        TimeSignature::SevenEight,
    ];

    /// Numerator.
    pub fn beats_per_bar(self) -> u32 {
        match self {
            TimeSignature::OneFour => 1,
            TimeSignature::TwoFour => 2,
            TimeSignature::ThreeFour => 3,
            TimeSignature::FourFour => 4,
            TimeSignature::FiveFour => 5,
            TimeSignature::SixEight => 6,
            TimeSignature::SevenEight => 7,
        }
    }

    /// Denominator.
    pub fn beat_unit(self) -> u32 {
        match self {
            TimeSignature::SixEight | TimeSignature::SevenEight => 8,
            _ => 4,
        }
    }

    /// 6/8 and 7/8 count eighth notes, so their tempo is rescaled.
    pub fn is_compound(self) -> bool {
        self.beat_unit() == 8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeSignature::OneFour => "1/4",
            TimeSignature::TwoFour => "2/4",
            TimeSignature::ThreeFour => "3/4",
            TimeSignature::FourFour => "4/4",
            TimeSignature::FiveFour => "5/4",
            TimeSignature::SixEight => "6/8",
            TimeSignature::SevenEight => "7/8",
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSignature {
    type Err = TimeSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        TimeSignature::ALL
            .into_iter()
            .find(|sig| sig.as_str() == trimmed)
            .ok_or_else(|| TimeSignatureError::Unsupported(s.to_string()))
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = TimeSignatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(sig: TimeSignature) -> Self {
        sig.as_str().to_string()
    }
}

/// Tempo and meter. The tempo is always inside `[MIN_BPM, MAX_BPM]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoState {
    bpm: f64,
    time_signature: TimeSignature,
}

impl Default for TempoState {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            time_signature: TimeSignature::default(),
        }
    }
}

impl TempoState {
    pub fn new(bpm: f64, time_signature: TimeSignature) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
            time_signature,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.time_signature.beats_per_bar()
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = clamp_bpm(bpm);
    }

    /// Switches meter; compound meters scale the current tempo by 3/2.
    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.time_signature = time_signature;
        if time_signature.is_compound() {
            self.set_bpm(self.bpm * COMPOUND_TEMPO_SCALE);
        }
    }
}

/// One beat handed to the audio output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeatEvent {
    /// Position in the bar, `0..beats_per_bar`. Beat 0 is accented.
    pub beat_index: u32,
    /// When the click sounds, in seconds on the audio clock.
    pub scheduled_time: f64,
}

impl BeatEvent {
    pub fn is_accent(&self) -> bool {
        self.beat_index == 0
    }
}

/// The precise, monotonically increasing clock of the audio hardware.
pub trait AudioClock {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

/// Plays tones at exact future timestamps on the [`AudioClock`].
pub trait ToneEmitter {
    fn emit(&mut self, tone: Tone, at: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Drives the metronome on top of an audio output `O`.
///
/// The host calls [`on_wake`](Self::on_wake) every
/// [`SchedulerConfig::wake_interval`]; each call schedules every beat whose
/// time falls inside the look-ahead window.
#[derive(Debug)]
pub struct BeatScheduler<O> {
    output: O,
    config: SchedulerConfig,
    tempo: TempoState,
    state: SchedulerState,
    next_note_time: f64,
    beat_index: u32,
    listener: Option<Sender<BeatEvent>>,
}

impl<O> BeatScheduler<O> {
    pub fn new(output: O, config: SchedulerConfig) -> Self {
        Self::with_tempo(output, config, TempoState::default())
    }

    pub fn with_tempo(output: O, config: SchedulerConfig, tempo: TempoState) -> Self {
        Self {
            output,
            config,
            tempo,
            state: SchedulerState::Stopped,
            next_note_time: 0.0,
            beat_index: 0,
            listener: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn tempo(&self) -> &TempoState {
        &self.tempo
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }

    /// Halts scheduling and drops the beat listener. Idempotent.
    ///
    /// Clicks already handed to the output still sound.
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Running {
            info!("metronome stopped");
        }
        self.state = SchedulerState::Stopped;
        self.listener = None;
    }

    /// Clamps and applies a new tempo. Beats already scheduled keep their time.
    pub fn set_tempo(&mut self, bpm: f64) {
        self.tempo.set_bpm(bpm);
        debug!(requested = bpm, bpm = self.tempo.bpm(), "tempo changed");
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.tempo.set_time_signature(time_signature);
        if self.beat_index >= self.tempo.beats_per_bar() {
            self.beat_index = 0;
        }
        debug!(
            time_signature = %time_signature,
            bpm = self.tempo.bpm(),
            "time signature changed"
        );
    }

    fn advance(&mut self) {
        self.next_note_time += self.tempo.seconds_per_beat();
        self.beat_index = (self.beat_index + 1) % self.tempo.beats_per_bar();
    }
}

impl<O: AudioClock + ToneEmitter> BeatScheduler<O> {
    /// Starts producing beats, reporting each to `listener`.
    ///
    /// Does nothing if already running. The first beat is an accent placed
    /// one start delay after the current clock time, and the first
    /// scheduling pass runs before this returns.
    pub fn start(&mut self, listener: Sender<BeatEvent>) {
        if self.is_running() {
            return;
        }
        self.state = SchedulerState::Running;
        self.listener = Some(listener);
        self.beat_index = 0;
        self.next_note_time = self.output.now() + self.config.start_delay_secs();
        info!(
            bpm = self.tempo.bpm(),
            time_signature = %self.tempo.time_signature(),
            "metronome started"
        );
        self.on_wake();
    }

    /// One wake-up of the scheduling loop. Returns how many beats it scheduled.
    pub fn on_wake(&mut self) -> usize {
        if !self.is_running() {
            return 0;
        }

        let horizon = self.output.now() + self.config.lookahead_secs();
        let mut scheduled = 0;
        while self.next_note_time < horizon {
            self.schedule_beat(BeatEvent {
                beat_index: self.beat_index,
                scheduled_time: self.next_note_time,
            });
            self.advance();
            scheduled += 1;
        }
        scheduled
    }

    fn schedule_beat(&mut self, event: BeatEvent) {
        trace!(beat = event.beat_index, at = event.scheduled_time, "scheduling beat");
        self.output
            .emit(Tone::for_beat(event.beat_index, &self.config), event.scheduled_time);

        let Some(listener) = &self.listener else {
            return;
        };
        match listener.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("beat listener is full; dropping beat event"),
            Err(TrySendError::Disconnected(_)) => {
                debug!("beat listener disconnected");
                self.listener = None;
            }
        }
    }
}

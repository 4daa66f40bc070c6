// toolbox-core/src/lib.rs

//! The core logic for the practice toolbox: a look-ahead metronome and a
//! real-time chromatic tuner.
//! This crate is responsible for beat scheduling, pitch detection, note
//! mapping and note stability. It is completely headless and contains no
//! GUI code; a host drives its periodic callbacks and renders its output.

pub mod audio;
pub mod click;
pub mod config;
pub mod metronome;
pub mod notes;
pub mod pitch;
pub mod stability;
pub mod tuner;

pub use config::{SchedulerConfig, ToolboxConfig, TunerConfig};
pub use metronome::{
    AudioClock, BeatEvent, BeatScheduler, TempoState, TimeSignature, TimeSignatureError,
    ToneEmitter,
};
pub use notes::{map_frequency, NoteName, NoteObservation};
pub use pitch::{PitchEstimate, PitchEstimator};
pub use stability::{StabilityGate, TunerDisplayState};
pub use tuner::{Tuner, TunerTick};

//! # Note Mapping Module
//!
//! Equal-temperament math for the tuner: converts a detected frequency into
//! the nearest chromatic note, its octave, and how far the signal sits from
//! that note's perfect pitch.
//!
//! ## Features
//! - Static 12-entry chromatic note table anchored at C
//! - A4 = 440 Hz reference, MIDI-style numbering (A4 = 69)
//! - Deviation as a ratio, in cents, or as a percentage

use serde::Serialize;
use std::fmt;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI note number of A4. Fixed anchor for octave and name arithmetic.
pub const A4_MIDI_NUMBER: i32 = 69;

const SEMITONES_PER_OCTAVE: i32 = 12;

/// One of the twelve chromatic pitch classes, spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NoteName {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

/// Chromatic table indexed by pitch class (0 = C ... 11 = B).
pub const NOTE_TABLE: [NoteName; 12] = [
    NoteName::C,
    NoteName::CSharp,
    NoteName::D,
    NoteName::DSharp,
    NoteName::E,
    NoteName::F,
    NoteName::FSharp,
    NoteName::G,
    NoteName::GSharp,
    NoteName::A,
    NoteName::ASharp,
    NoteName::B,
];

impl NoteName {
    /// Looks up a pitch class. Any integer is accepted; it is reduced modulo 12.
    pub fn from_pitch_class(pitch_class: i32) -> Self {
        NOTE_TABLE[pitch_class.rem_euclid(SEMITONES_PER_OCTAVE) as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::D => "D",
            NoteName::DSharp => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::A => "A",
            NoteName::ASharp => "A#",
            NoteName::B => "B",
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frequency resolved against the equal-tempered scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteObservation {
    /// Nearest chromatic note.
    pub note: NoteName,
    /// Scientific-pitch octave (A4 = 440 Hz, octaves start at C).
    pub octave: i32,
    /// `(f - perfect) / perfect`; positive is sharp, negative is flat.
    pub deviation_ratio: f32,
    /// The measured frequency in Hz.
    pub frequency_hz: f32,
}

impl NoteObservation {
    /// Deviation in cents (100 cents = 1 semitone).
    pub fn cents(&self) -> f32 {
        1200.0 * (1.0 + self.deviation_ratio).log2()
    }

    /// Deviation ratio scaled to a percentage.
    pub fn percent(&self) -> f32 {
        self.deviation_ratio * 100.0
    }

    /// Note label such as `"C#3"`.
    pub fn label(&self) -> String {
        format!("{}{}", self.note, self.octave)
    }
}

/// Signed semitone distance from A4 of the note nearest to `freq`.
pub fn nearest_note_index(freq: f32) -> i32 {
    let note_number = SEMITONES_PER_OCTAVE as f32 * (freq / A4_FREQUENCY).log2();
    note_number.round() as i32
}

/// Equal-temperament frequency of the note `note_index` semitones from A4.
pub fn perfect_frequency(note_index: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf(note_index as f32 / SEMITONES_PER_OCTAVE as f32)
}

/// Maps a frequency to its nearest note, octave and deviation.
///
/// `freq` is expected to be positive and finite; the tuner only calls this
/// for estimates that passed the stability gate's frequency bounds.
///
/// # Examples
/// ```
/// use toolbox_core::notes::{map_frequency, NoteName};
///
/// let obs = map_frequency(440.0);
/// assert_eq!(obs.note, NoteName::A);
/// assert_eq!(obs.octave, 4);
/// assert_eq!(obs.deviation_ratio, 0.0);
/// ```
pub fn map_frequency(freq: f32) -> NoteObservation {
    let nearest = nearest_note_index(freq);
    let midi = nearest + A4_MIDI_NUMBER;
    let perfect = perfect_frequency(nearest);

    NoteObservation {
        note: NoteName::from_pitch_class(midi),
        octave: midi.div_euclid(SEMITONES_PER_OCTAVE) - 1,
        deviation_ratio: (freq - perfect) / perfect,
        frequency_hz: freq,
    }
}

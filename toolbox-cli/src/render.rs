//! # Output Rendering
//!
//! Turns beat events and tuner ticks into lines on stdout, either for a
//! person (text) or for another program (JSON lines).

use serde::Serialize;
use std::io::Write;
use toolbox_core::{BeatEvent, NoteObservation, TimeSignature, TunerTick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum HostEvent<'a> {
    Beat {
        beat_index: u32,
        accent: bool,
        scheduled_time: f64,
    },
    Note {
        #[serde(flatten)]
        observation: &'a NoteObservation,
        cents: f32,
        clarity: f32,
    },
    Idle,
}

/// Writes host output, suppressing tuner lines that would repeat the last one.
pub struct Renderer<W> {
    out: W,
    mode: OutputMode,
    last_note: Option<Option<String>>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, mode: OutputMode) -> Self {
        Self {
            out,
            mode,
            last_note: None,
        }
    }

    pub fn beat(&mut self, beat: &BeatEvent, time_signature: TimeSignature) -> std::io::Result<()> {
        match self.mode {
            OutputMode::Json => self.json(&HostEvent::Beat {
                beat_index: beat.beat_index,
                accent: beat.is_accent(),
                scheduled_time: beat.scheduled_time,
            }),
            OutputMode::Text => {
                let marker = if beat.is_accent() { "●" } else { "○" };
                writeln!(
                    self.out,
                    "{marker} {}/{}  t={:.3}s",
                    beat.beat_index + 1,
                    time_signature.beats_per_bar(),
                    beat.scheduled_time
                )
            }
        }
    }

    /// Renders a tuner tick if what is displayed has changed.
    pub fn tuner(&mut self, tick: &TunerTick) -> std::io::Result<()> {
        let key = tick
            .display
            .map(|o| format!("{}{:+.1}", o.label(), o.cents()));
        if self.last_note.as_ref() == Some(&key) {
            return Ok(());
        }
        self.last_note = Some(key);

        match (self.mode, tick.display.as_ref()) {
            (OutputMode::Json, Some(observation)) => self.json(&HostEvent::Note {
                observation,
                cents: observation.cents(),
                clarity: tick.estimate.clarity,
            }),
            (OutputMode::Json, None) => self.json(&HostEvent::Idle),
            (OutputMode::Text, Some(observation)) => writeln!(
                self.out,
                "{:<4} {:+6.1} cents  ({:.2} Hz)",
                observation.label(),
                observation.cents(),
                observation.frequency_hz
            ),
            (OutputMode::Text, None) => writeln!(self.out, "---"),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn json(&mut self, event: &HostEvent<'_>) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)
    }
}

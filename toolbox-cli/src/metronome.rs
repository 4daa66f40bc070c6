//! Host loop for the metronome tool.
//!
//! The scheduler's wake-ups come from an ordinary crossbeam ticker. Beat
//! events reach this loop as soon as they are scheduled (up to one look-ahead
//! early) and are held back until the audio clock reaches them, so printed
//! beats line up with what is heard.

use anyhow::Result;
use crossbeam_channel::{after, never, select, tick, Receiver};
use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;
use toolbox_core::audio::ClickOutput;
use toolbox_core::{AudioClock, BeatEvent, BeatScheduler, SchedulerConfig, TempoState};
use tracing::{debug, info};

use crate::commands::{spawn_stdin_reader, Command};
use crate::render::Renderer;

pub fn run<W: Write>(
    config: SchedulerConfig,
    tempo: TempoState,
    duration: Option<Duration>,
    renderer: &mut Renderer<W>,
) -> Result<()> {
    let output = ClickOutput::start()?;
    let ticker = tick(config.wake_interval());
    let mut scheduler = BeatScheduler::with_tempo(output, config, tempo);

    let (beat_tx, beat_rx) = crossbeam_channel::unbounded::<BeatEvent>();
    let mut commands: Receiver<Command> = spawn_stdin_reader();
    let deadline = duration.map(after).unwrap_or_else(never);
    let mut pending: VecDeque<BeatEvent> = VecDeque::new();

    scheduler.start(beat_tx.clone());

    loop {
        select! {
            recv(ticker) -> _ => {
                scheduler.on_wake();
                pending.extend(beat_rx.try_iter());
                let now = scheduler.output().now();
                while pending.front().is_some_and(|beat| beat.scheduled_time <= now) {
                    if let Some(beat) = pending.pop_front() {
                        renderer.beat(&beat, scheduler.tempo().time_signature())?;
                    }
                }
            }
            recv(commands) -> msg => match msg {
                Ok(Command::Tempo(bpm)) => {
                    scheduler.set_tempo(bpm);
                    info!(bpm = scheduler.tempo().bpm(), "tempo set");
                }
                Ok(Command::TimeSignature(sig)) => {
                    scheduler.set_time_signature(sig);
                    info!(time_signature = %sig, bpm = scheduler.tempo().bpm(), "time signature set");
                }
                Ok(Command::Start) => scheduler.start(beat_tx.clone()),
                Ok(Command::Stop) => {
                    scheduler.stop();
                    pending.clear();
                }
                Ok(Command::Quit) => break,
                Err(_) => {
                    debug!("stdin closed; running until the deadline");
                    commands = never();
                }
            },
            recv(deadline) -> _ => break,
        }
    }

    scheduler.stop();
    scheduler.output_mut().stop();
    Ok(())
}

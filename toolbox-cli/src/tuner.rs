//! Host loop for the tuner tool.
//!
//! Captured audio only refreshes the tuner's window. Evaluation runs on its
//! own ticker at the configured update interval, so a fast capture callback
//! can never build up an estimation backlog.

use anyhow::{Context, Result};
use crossbeam_channel::{after, bounded, never, select, tick};
use std::io::Write;
use std::time::Duration;
use toolbox_core::audio::AudioInput;
use toolbox_core::{Tuner, TunerConfig};
use tracing::warn;

use crate::render::Renderer;

/// Chunks buffered between the capture callback and this loop.
const CAPTURE_QUEUE: usize = 64;

pub fn run<W: Write>(
    config: TunerConfig,
    duration: Option<Duration>,
    renderer: &mut Renderer<W>,
) -> Result<()> {
    let (audio_tx, audio_rx) = bounded::<Vec<f32>>(CAPTURE_QUEUE);
    let mut input = AudioInput::start(audio_tx)
        .context("Unable to access microphone. Please ensure you have granted microphone permissions")?;

    let ticker = tick(config.update_interval());
    let deadline = duration.map(after).unwrap_or_else(never);
    let mut tuner = Tuner::new(config, input.sample_rate());

    loop {
        select! {
            recv(audio_rx) -> msg => match msg {
                Ok(chunk) => tuner.push_samples(&chunk),
                Err(_) => {
                    warn!("audio capture ended");
                    break;
                }
            },
            recv(ticker) -> at => {
                if let Some(result) = at.ok().and_then(|at| tuner.poll(at)) {
                    renderer.tuner(&result)?;
                }
            }
            recv(deadline) -> _ => break,
        }
    }

    input.stop();
    Ok(())
}

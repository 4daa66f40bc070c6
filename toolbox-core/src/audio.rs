//! # Audio Device Module
//!
//! This module owns the two hardware pathways of the toolbox, both built on
//! CPAL (Cross-Platform Audio Library):
//!
//! - [`AudioInput`]: microphone capture for the tuner. Samples are downmixed
//!   to mono and streamed to the host loop over a crossbeam channel.
//! - [`ClickOutput`]: the metronome's output. Its frame counter is the
//!   precise [`AudioClock`], and it starts every emitted click on the exact
//!   frame that corresponds to the requested timestamp.
//!
//! Both are scoped guards: the device is released on [`stop`](AudioInput::stop)
//! or on drop, whichever comes first.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::click::{render_tone, Tone};
use crate::metronome::{AudioClock, ToneEmitter};

/// Preferred capture rate. The device may pick a different one.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Live microphone capture.
pub struct AudioInput {
    stream: Option<cpal::Stream>,
    sample_rate: u32,
}

impl AudioInput {
    /// Opens the default input device and starts streaming mono chunks.
    ///
    /// Failure (no device, no usable format, permission denied) is returned
    /// once; nothing is retried.
    ///
    /// # Arguments
    /// * `sender` - Channel receiving one mono `Vec<f32>` per device callback
    pub fn start(sender: Sender<Vec<f32>>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        info!(device = %device.name()?, "using audio input device");

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let rate = TARGET_SAMPLE_RATE
            .clamp(supported_config.min_sample_rate().0, supported_config.max_sample_rate().0);
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(rate))
            .into();
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        info!(sample_rate, channels, "selected input format");

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix(data, channels);
                    // The host drains this every tick; a full channel just drops audio.
                    let _ = sender.try_send(mono);
                },
                |err| error!("an error occurred on the input stream: {err}"),
                None,
            )
            .context("failed to open the microphone")?;

        stream.play().context("failed to start audio capture")?;

        Ok(Self {
            stream: Some(stream),
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Stops capture and releases the device. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("error pausing input stream: {e}");
            }
            drop(stream);
            debug!("audio input released");
        }
    }
}

impl Drop for AudioInput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Finds the best f32 input configuration, preferring mono and then the
/// range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .min_by_key(|c| {
            let rate_distance = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = c.min_sample_rate().0.abs_diff(target_rate);
                let max_diff = c.max_sample_rate().0.abs_diff(target_rate);
                min_diff.min(max_diff)
            };
            (c.channels() != 1, rate_distance)
        })
}

/// Averages interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// A rendered click waiting for, or in the middle of, playback.
#[derive(Debug, Clone)]
pub struct Voice {
    start_frame: u64,
    samples: Vec<f32>,
}

/// Mixes queued voices into output blocks, frame by frame.
///
/// Lives inside the output callback; kept separate from CPAL so the
/// sample-accurate placement can be checked without a device.
#[derive(Debug)]
pub struct ClickMixer {
    incoming: Receiver<Voice>,
    active: Vec<Voice>,
    frames: Arc<AtomicU64>,
}

impl ClickMixer {
    pub fn new(incoming: Receiver<Voice>, frames: Arc<AtomicU64>) -> Self {
        Self {
            incoming,
            active: Vec::with_capacity(16),
            frames,
        }
    }

    /// Fills one interleaved block and advances the clock by its frame count.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let base = self.frames.load(Ordering::Acquire);

        for mut voice in self.incoming.try_iter() {
            // Too late to be exact; play it as soon as possible.
            voice.start_frame = voice.start_frame.max(base);
            self.active.push(voice);
        }

        let block_frames = data.len() / channels;
        for (offset, frame) in data.chunks_mut(channels).enumerate() {
            let now = base + offset as u64;
            let value: f32 = self
                .active
                .iter()
                .filter_map(|voice| {
                    let position = now.checked_sub(voice.start_frame)?;
                    voice.samples.get(position as usize).copied()
                })
                .sum();
            frame.fill(value);
        }

        let end = base + block_frames as u64;
        self.active
            .retain(|voice| voice.start_frame + (voice.samples.len() as u64) > end);
        self.frames.store(end, Ordering::Release);
    }
}

/// Metronome output: audio clock plus sample-accurate tone emitter.
pub struct ClickOutput {
    stream: Option<cpal::Stream>,
    sample_rate: u32,
    frames: Arc<AtomicU64>,
    voices: Sender<Voice>,
}

impl ClickOutput {
    /// Opens the default output device.
    pub fn start() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;

        info!(device = %device.name()?, "using audio output device");

        let supported_config = device.default_output_config()?;
        if supported_config.sample_format() != SampleFormat::F32 {
            return Err(anyhow!(
                "Unsupported output sample format {:?}",
                supported_config.sample_format()
            ));
        }
        let sample_rate = supported_config.sample_rate().0;
        let config: cpal::StreamConfig = supported_config.into();
        let channels = config.channels as usize;

        let frames = Arc::new(AtomicU64::new(0));
        let (voices, incoming) = crossbeam_channel::unbounded();
        let mut mixer = ClickMixer::new(incoming, Arc::clone(&frames));

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.render(data, channels);
                },
                |err| error!("an error occurred on the output stream: {err}"),
                None,
            )
            .context("failed to open the audio output")?;

        stream.play().context("failed to start audio output")?;
        info!(sample_rate, channels, "click output running");

        Ok(Self {
            stream: Some(stream),
            sample_rate,
            frames,
            voices,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stops playback and releases the device. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("error pausing output stream: {e}");
            }
            drop(stream);
            debug!("audio output released");
        }
    }
}

impl Drop for ClickOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

impl AudioClock for ClickOutput {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }
}

impl ToneEmitter for ClickOutput {
    fn emit(&mut self, tone: Tone, at: f64) {
        let voice = Voice {
            start_frame: (at.max(0.0) * self.sample_rate as f64).round() as u64,
            samples: render_tone(&tone, self.sample_rate),
        };
        if self.voices.send(voice).is_err() {
            warn!("click output closed; dropping tone");
        }
    }
}

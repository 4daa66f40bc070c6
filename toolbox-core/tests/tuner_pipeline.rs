//! End-to-end tests for the tuner session using synthetic signals.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use toolbox_core::notes::perfect_frequency;
use toolbox_core::pitch::WINDOW_SIZE;
use toolbox_core::{NoteName, Tuner, TunerConfig};

const SAMPLE_RATE: u32 = 44_100;

fn tone(freq: f32, amplitude: f32) -> Vec<f32> {
    (0..WINDOW_SIZE)
        .map(|i| amplitude * (TAU * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn a440_reads_as_a4() {
    let mut tuner = Tuner::new(TunerConfig::default(), SAMPLE_RATE);
    tuner.push_samples(&tone(440.0, 0.5));

    let tick = tuner.poll(Instant::now()).expect("first poll is always due");
    assert!((tick.estimate.frequency_hz - 440.0).abs() < 1.0);

    let shown = tick.display.expect("a clean sine is accepted");
    assert_eq!(shown.note, NoteName::A);
    assert_eq!(shown.octave, 4);
    assert!(shown.deviation_ratio.abs() < 0.002);
}

#[test]
fn note_holds_then_changes_then_clears() {
    let mut tuner = Tuner::new(TunerConfig::default(), SAMPLE_RATE);
    let t0 = Instant::now();

    tuner.push_samples(&tone(440.0, 0.5));
    assert_eq!(tuner.poll(t0).and_then(|t| t.display).map(|o| o.note), Some(NoteName::A));

    // B4 at the same level inside the settle time: display holds.
    tuner.push_samples(&tone(perfect_frequency(2), 0.5));
    let held = tuner.poll(t0 + ms(100)).unwrap();
    assert_eq!(held.display.map(|o| o.note), Some(NoteName::A));

    let replaced = tuner.poll(t0 + ms(1600)).unwrap();
    assert_eq!(replaced.display.map(|o| o.note), Some(NoteName::B));

    tuner.push_samples(&vec![0.0; WINDOW_SIZE]);
    let quiet = tuner.poll(t0 + ms(1700)).unwrap();
    assert!(!quiet.estimate.is_pitched());
    assert_eq!(quiet.display.map(|o| o.note), Some(NoteName::B));

    let idle = tuner.poll(t0 + ms(3200)).unwrap();
    assert!(idle.display.is_none());
    assert!(tuner.display().is_none());
}

#[test]
fn louder_onset_switches_immediately() {
    let mut tuner = Tuner::new(TunerConfig::default(), SAMPLE_RATE);
    let t0 = Instant::now();

    tuner.push_samples(&tone(440.0, 0.05));
    tuner.poll(t0);

    tuner.push_samples(&tone(perfect_frequency(3), 0.5));
    let tick = tuner.poll(t0 + ms(100)).unwrap();
    let shown = tick.display.unwrap();
    assert_eq!((shown.note, shown.octave), (NoteName::C, 5));
}

#[test]
fn reset_returns_to_idle() {
    let mut tuner = Tuner::new(TunerConfig::default(), SAMPLE_RATE);
    let t0 = Instant::now();
    tuner.push_samples(&tone(440.0, 0.5));
    tuner.poll(t0);
    assert!(tuner.display().is_some());

    tuner.reset();
    assert!(tuner.display().is_none());
    assert!(!tuner.display_state().settled);
    // Throttle is cleared as well.
    let tick = tuner.poll(t0 + ms(1)).unwrap();
    assert!(!tick.estimate.is_pitched());
}

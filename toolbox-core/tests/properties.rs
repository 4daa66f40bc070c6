//! Property-based tests for tempo handling, beat sequencing and note mapping.
//!
//! Run with:
//! cargo test -p toolbox-core --test properties

use crossbeam_channel::unbounded;
use proptest::prelude::*;

use toolbox_core::metronome::{clamp_bpm, MAX_BPM, MIN_BPM};
use toolbox_core::notes::{map_frequency, perfect_frequency, NoteName};
use toolbox_core::pitch::normalized_square_difference;
use toolbox_core::click::Tone;
use toolbox_core::{AudioClock, BeatScheduler, SchedulerConfig, TempoState, TimeSignature, ToneEmitter};

#[derive(Debug, Default)]
struct SimulatedOutput {
    now: f64,
    emitted: usize,
}

impl AudioClock for SimulatedOutput {
    fn now(&self) -> f64 {
        self.now
    }
}

impl ToneEmitter for SimulatedOutput {
    fn emit(&mut self, _tone: Tone, _at: f64) {
        self.emitted += 1;
    }
}

fn time_signature() -> impl Strategy<Value = TimeSignature> {
    prop::sample::select(TimeSignature::ALL.to_vec())
}

proptest! {
    #[test]
    fn tempo_is_always_clamped(bpm in -1.0e6f64..1.0e6) {
        let mut tempo = TempoState::default();
        tempo.set_bpm(bpm);
        prop_assert!(tempo.bpm() >= MIN_BPM && tempo.bpm() <= MAX_BPM);
    }

    #[test]
    fn tempo_clamp_is_monotonic(a in -500.0f64..500.0, b in -500.0f64..500.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(clamp_bpm(lo) <= clamp_bpm(hi));
    }

    #[test]
    fn compound_meters_scale_by_one_and_a_half(
        bpm in 40.0f64..=240.0,
        sig in prop::sample::select(vec![TimeSignature::SixEight, TimeSignature::SevenEight]),
    ) {
        let mut tempo = TempoState::new(bpm, TimeSignature::FourFour);
        tempo.set_time_signature(sig);
        prop_assert_eq!(tempo.bpm(), clamp_bpm(bpm * 1.5));
    }

    #[test]
    fn beat_indices_cycle_without_skips(
        bpm in 40u32..=240,
        sig in time_signature(),
        wake_jitter_ms in prop::collection::vec(5u32..60, 20..120),
    ) {
        let tempo = TempoState::new(bpm as f64, sig);
        let mut metronome = BeatScheduler::with_tempo(
            SimulatedOutput::default(),
            SchedulerConfig::default(),
            tempo,
        );
        let (tx, rx) = unbounded();
        metronome.start(tx);
        for step in wake_jitter_ms {
            metronome.output_mut().now += step as f64 / 1000.0;
            metronome.on_wake();
        }

        let beats: Vec<_> = rx.try_iter().collect();
        let per_bar = sig.beats_per_bar();
        for (n, beat) in beats.iter().enumerate() {
            prop_assert_eq!(beat.beat_index, n as u32 % per_bar);
        }
        for pair in beats.windows(2) {
            prop_assert!(pair[1].scheduled_time > pair[0].scheduled_time);
        }
        prop_assert_eq!(metronome.output().emitted, beats.len());
    }

    #[test]
    fn nsdf_lag_zero_is_one(signal in prop::collection::vec(-1.0f32..1.0, 16..256)) {
        prop_assume!(signal[..signal.len() / 2].iter().any(|&s| s != 0.0));
        let mut nsdf = Vec::new();
        normalized_square_difference(&signal, &mut nsdf);
        prop_assert!((nsdf[0] - 1.0).abs() < 1e-6);
        prop_assert!(nsdf.iter().all(|v| (-1.0 - 1e-5..=1.0 + 1e-5).contains(v)));
    }
}

#[test]
fn perfect_pitches_round_trip() {
    for index in -48..=48 {
        let observation = map_frequency(perfect_frequency(index));
        let midi = index + 69;
        assert_eq!(observation.deviation_ratio, 0.0, "index {index}");
        assert_eq!(observation.note, NoteName::from_pitch_class(midi), "index {index}");
        assert_eq!(observation.octave, midi.div_euclid(12) - 1, "index {index}");
    }
}

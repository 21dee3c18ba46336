//! Recorded traces for rhythms that are not synthesized beat by beat.
//!
//! Each trace is built once per process from a fixed seed at the canonical
//! 250 Hz / 10 s and then shared; callers resample it instead of asking for a
//! fresh one.

use super::motif::{wave, Motif, SINUS_POOL};
use super::rng::{Seed, Xorshift64};
use crate::device::RhythmType;
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Sampling rate of every recorded trace
pub const RECORDED_SAMPLING_RATE: u32 = 250;
/// Length of every recorded trace
pub const RECORDED_DURATION_S: f32 = 10.0;

const RECORDED_SAMPLES: usize = 2500;
const RECORDING_SEED: u64 = 0x00EC_6A11;

const AF_QRS: Motif = Motif {
    name: "af-qrs",
    duration_s: 0.40,
    deflections: &[
        wave(0.035, 0.008, -0.10),
        wave(0.06, 0.010, 1.00),
        wave(0.085, 0.009, -0.22),
        wave(0.27, 0.045, 0.25),
    ],
};

/// A pre-recorded ECG strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordedTrace {
    VentricularFibrillation,
    VentricularTachycardia,
    Asystole,
    AtrialFibrillation,
    /// Reference sinus strip at 70 bpm
    ClassicSinus,
    CompleteHeartBlock,
}

impl RecordedTrace {
    pub const ALL: [Self; 6] = [
        Self::VentricularFibrillation,
        Self::VentricularTachycardia,
        Self::Asystole,
        Self::AtrialFibrillation,
        Self::ClassicSinus,
        Self::CompleteHeartBlock,
    ];

    /// Recorded trace backing a rhythm, if that rhythm is not synthesized.
    #[must_use]
    pub const fn for_rhythm(rhythm: RhythmType) -> Option<Self> {
        match rhythm {
            RhythmType::FibrillationVentriculaire => Some(Self::VentricularFibrillation),
            RhythmType::TachycardieVentriculaire => Some(Self::VentricularTachycardia),
            RhythmType::Asystole => Some(Self::Asystole),
            RhythmType::FibrillationAtriale => Some(Self::AtrialFibrillation),
            RhythmType::Bav3 => Some(Self::CompleteHeartBlock),
            RhythmType::Sinus
            | RhythmType::Bav1
            | RhythmType::ElectroEntrainement
            | RhythmType::Choc => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VentricularFibrillation => "vf",
            Self::VentricularTachycardia => "vt",
            Self::Asystole => "asystole",
            Self::AtrialFibrillation => "af",
            Self::ClassicSinus => "classic-sinus",
            Self::CompleteHeartBlock => "bav3",
        }
    }

    /// The shared samples (250 Hz, 10 s).
    #[must_use]
    pub fn samples(self) -> &'static [f32] {
        static TRACES: [OnceLock<Vec<f32>>; 6] = [
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
        ];
        TRACES[self as usize].get_or_init(|| self.record())
    }

    fn record(self) -> Vec<f32> {
        let mut rng = Xorshift64::new(Seed::from_u64(RECORDING_SEED ^ self as u64));
        let rate = RECORDED_SAMPLING_RATE as f32;
        match self {
            Self::VentricularFibrillation => record_vf(&mut rng, rate),
            Self::VentricularTachycardia => record_vt(&mut rng, rate),
            Self::Asystole => record_asystole(&mut rng, rate),
            Self::AtrialFibrillation => record_af(&mut rng, rate),
            Self::ClassicSinus => record_beats(&mut rng, rate, 70.0, &SINUS_POOL[0]),
            Self::CompleteHeartBlock => record_bav3(&mut rng, rate),
        }
    }
}

impl fmt::Display for RecordedTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordedTrace {
    type Err = crate::device::ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::device::ParseLabelError::new("recorded trace", s))
    }
}

fn time(i: usize, rate: f32) -> f32 {
    i as f32 / rate
}

fn gaussian(t: f32, center: f32, width: f32) -> f32 {
    let z = (t - center) / width;
    (-0.5 * z * z).exp()
}

/// Chaotic undulation: a handful of drifting sinusoids under a slow envelope.
fn record_vf(rng: &mut Xorshift64, rate: f32) -> Vec<f32> {
    let components: Vec<(f32, f32, f32)> = (0..5)
        .map(|_| {
            (
                rng.next_f32_range(3.5, 7.5),
                rng.next_f32_range(0.15, 0.45),
                rng.next_f32_range(0.0, TAU),
            )
        })
        .collect();
    (0..RECORDED_SAMPLES)
        .map(|i| {
            let t = time(i, rate);
            let envelope = 0.75 + 0.25 * (TAU * 0.2 * t).sin();
            let wave: f32 = components
                .iter()
                .map(|&(freq, amp, phase)| {
                    amp * (TAU * freq * t + phase + 0.8 * (0.3 * t).sin()).sin()
                })
                .sum();
            envelope * wave + rng.next_f32_range(-0.03, 0.03)
        })
        .collect()
}

/// Wide monomorphic complexes at about 180 bpm.
fn record_vt(rng: &mut Xorshift64, rate: f32) -> Vec<f32> {
    let period = 60.0 / 180.0;
    (0..RECORDED_SAMPLES)
        .map(|i| {
            let t = time(i, rate);
            let phase = (t % period) / period;
            let complex = 1.3 * (PI * phase).sin().powi(3) - 0.5 * gaussian(phase, 0.78, 0.08);
            complex + rng.next_f32_range(-0.02, 0.02)
        })
        .collect()
}

/// Flat line with baseline wander.
fn record_asystole(rng: &mut Xorshift64, rate: f32) -> Vec<f32> {
    (0..RECORDED_SAMPLES)
        .map(|i| {
            let t = time(i, rate);
            0.02 * (TAU * 0.25 * t).sin() + rng.next_f32_range(-0.01, 0.01)
        })
        .collect()
}

/// Irregular narrow QRS over fibrillatory f-waves, no P waves.
fn record_af(rng: &mut Xorshift64, rate: f32) -> Vec<f32> {
    let qrs = AF_QRS;
    let mut beat_starts = Vec::new();
    let mut t = rng.next_f32_range(0.0, 0.3);
    while t < RECORDED_DURATION_S {
        beat_starts.push(t);
        t += rng.next_f32_range(0.45, 1.05);
    }
    let f_freq = rng.next_f32_range(5.5, 7.0);
    (0..RECORDED_SAMPLES)
        .map(|i| {
            let t = time(i, rate);
            let f_wave = 0.06 * (TAU * f_freq * t).sin() + 0.03 * (TAU * 1.7 * f_freq * t).sin();
            let beat: f32 = beat_starts
                .iter()
                .filter(|&&start| t >= start && t < start + qrs.duration_s)
                .map(|&start| qrs.value_at(t - start))
                .sum();
            beat + f_wave + rng.next_f32_range(-0.01, 0.01)
        })
        .collect()
}

/// A regular strip of one motif at a fixed rate.
fn record_beats(rng: &mut Xorshift64, rate: f32, bpm: f32, motif: &Motif) -> Vec<f32> {
    let period = 60.0 / bpm;
    (0..RECORDED_SAMPLES)
        .map(|i| {
            let t = time(i, rate) % period;
            let beat = if t < motif.duration_s {
                motif.value_at(t)
            } else {
                0.0
            };
            beat + rng.next_f32_range(-0.01, 0.01)
        })
        .collect()
}

/// Atrial P waves at 75/min dissociated from a wide escape rhythm at 38/min.
fn record_bav3(rng: &mut Xorshift64, rate: f32) -> Vec<f32> {
    let p_period = 60.0 / 75.0;
    let v_period = 60.0 / 38.0;
    let v_offset = rng.next_f32_range(0.1, 0.5);
    (0..RECORDED_SAMPLES)
        .map(|i| {
            let t = time(i, rate);
            let p = 0.15 * gaussian(t % p_period, 0.1, 0.025);
            let v_t = (t + v_period - v_offset) % v_period;
            let escape = 0.9 * gaussian(v_t, 0.08, 0.03) - 0.35 * gaussian(v_t, 0.15, 0.03)
                + 0.3 * gaussian(v_t, 0.45, 0.07);
            p + escape + rng.next_f32_range(-0.01, 0.01)
        })
        .collect()
}

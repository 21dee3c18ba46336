//! Single-beat templates.
//!
//! A motif is a sum of Gaussian deflections (P, Q, R, S, T, pacer spike...)
//! laid out over a fixed duration. Rendering samples it at a given rate,
//! optionally time-compressed so it fits inside a short R-R interval.

use crate::device::RhythmType;

/// One Gaussian deflection of a beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deflection {
    /// Peak position from motif start, seconds
    pub center_s: f32,
    /// Standard deviation, seconds
    pub width_s: f32,
    /// Peak amplitude, mV
    pub amplitude: f32,
}

pub(crate) const fn wave(center_s: f32, width_s: f32, amplitude: f32) -> Deflection {
    Deflection {
        center_s,
        width_s,
        amplitude,
    }
}

/// A one-beat waveform template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motif {
    pub name: &'static str,
    pub duration_s: f32,
    pub deflections: &'static [Deflection],
}

impl Motif {
    /// Value at `t` seconds from motif start
    #[must_use]
    pub fn value_at(&self, t: f32) -> f32 {
        self.deflections
            .iter()
            .map(|d| {
                let z = (t - d.center_s) / d.width_s;
                d.amplitude * (-0.5 * z * z).exp()
            })
            .sum()
    }

    /// Sample the motif at `sampling_rate`.
    #[must_use]
    pub fn render(&self, sampling_rate: u32) -> Vec<f32> {
        self.render_within(sampling_rate, f32::INFINITY)
    }

    /// Sample the motif, compressing it in time when it would not fit in
    /// `max_duration_s` (90 % of the window is used so a little padding
    /// always remains).
    #[must_use]
    pub fn render_within(&self, sampling_rate: u32, max_duration_s: f32) -> Vec<f32> {
        let scale = if self.duration_s > 0.9 * max_duration_s {
            (0.9 * max_duration_s / self.duration_s).max(0.05)
        } else {
            1.0
        };
        let rate = sampling_rate.max(1) as f32;
        let count = ((self.duration_s * scale * rate).round() as usize).max(1);
        (0..count)
            .map(|i| self.value_at(i as f32 / rate / scale))
            .collect()
    }
}

const SINUS_A: &[Deflection] = &[
    wave(0.10, 0.025, 0.15),
    wave(0.215, 0.008, -0.10),
    wave(0.24, 0.010, 1.10),
    wave(0.265, 0.009, -0.25),
    wave(0.46, 0.045, 0.30),
];

const SINUS_B: &[Deflection] = &[
    wave(0.10, 0.022, 0.12),
    wave(0.215, 0.008, -0.08),
    wave(0.24, 0.011, 1.00),
    wave(0.267, 0.010, -0.20),
    wave(0.47, 0.050, 0.28),
];

const SINUS_C: &[Deflection] = &[
    wave(0.09, 0.025, 0.17),
    wave(0.21, 0.007, -0.12),
    wave(0.235, 0.010, 1.20),
    wave(0.26, 0.009, -0.30),
    wave(0.45, 0.042, 0.33),
];

// First-degree block: same complex, P wave pushed well ahead of the QRS.
const BAV1_A: &[Deflection] = &[
    wave(0.08, 0.025, 0.15),
    wave(0.345, 0.008, -0.10),
    wave(0.37, 0.010, 1.05),
    wave(0.395, 0.009, -0.25),
    wave(0.59, 0.045, 0.30),
];

const BAV1_B: &[Deflection] = &[
    wave(0.07, 0.024, 0.13),
    wave(0.355, 0.008, -0.09),
    wave(0.38, 0.011, 0.95),
    wave(0.405, 0.010, -0.22),
    wave(0.60, 0.050, 0.27),
];

// Paced beat: narrow spike, then a wide QRS with a discordant T.
const PACED_A: &[Deflection] = &[
    wave(0.05, 0.002, 1.50),
    wave(0.10, 0.030, 1.00),
    wave(0.16, 0.025, -0.40),
    wave(0.38, 0.060, -0.35),
];

const PACED_B: &[Deflection] = &[
    wave(0.05, 0.002, 1.40),
    wave(0.105, 0.032, 0.90),
    wave(0.17, 0.028, -0.45),
    wave(0.40, 0.065, -0.30),
];

// Post-shock: tall slurred complex and a slow recovery wave.
const CHOC_A: &[Deflection] = &[
    wave(0.06, 0.020, 1.80),
    wave(0.12, 0.040, -0.90),
    wave(0.30, 0.120, 0.40),
];

const CHOC_B: &[Deflection] = &[
    wave(0.05, 0.018, -1.50),
    wave(0.11, 0.045, 0.70),
    wave(0.32, 0.110, -0.30),
];

pub const SINUS_POOL: &[Motif] = &[
    Motif {
        name: "sinus-a",
        duration_s: 0.62,
        deflections: SINUS_A,
    },
    Motif {
        name: "sinus-b",
        duration_s: 0.64,
        deflections: SINUS_B,
    },
    Motif {
        name: "sinus-c",
        duration_s: 0.60,
        deflections: SINUS_C,
    },
];

pub const BAV1_POOL: &[Motif] = &[
    Motif {
        name: "bav1-a",
        duration_s: 0.76,
        deflections: BAV1_A,
    },
    Motif {
        name: "bav1-b",
        duration_s: 0.78,
        deflections: BAV1_B,
    },
];

pub const PACED_POOL: &[Motif] = &[
    Motif {
        name: "paced-a",
        duration_s: 0.55,
        deflections: PACED_A,
    },
    Motif {
        name: "paced-b",
        duration_s: 0.58,
        deflections: PACED_B,
    },
];

pub const CHOC_POOL: &[Motif] = &[
    Motif {
        name: "choc-a",
        duration_s: 0.60,
        deflections: CHOC_A,
    },
    Motif {
        name: "choc-b",
        duration_s: 0.60,
        deflections: CHOC_B,
    },
];

/// Motif pool of a beat-synthesized rhythm; `None` for recorded rhythms.
#[must_use]
pub fn pool_for(rhythm: RhythmType) -> Option<&'static [Motif]> {
    match rhythm {
        RhythmType::Sinus => Some(SINUS_POOL),
        RhythmType::Bav1 => Some(BAV1_POOL),
        RhythmType::ElectroEntrainement => Some(PACED_POOL),
        RhythmType::Choc => Some(CHOC_POOL),
        _ => None,
    }
}

//! Synthetic physiological signals.
//!
//! Dynamic rhythms (sinus, first-degree block, paced, post-shock) are built
//! beat by beat from [`motif`] pools; the rest are served from
//! [`recorded`] traces. Every buffer can be made loopable with
//! [`create_seamless_loop`].
//!
//! ```
//! use defib_sim::waveform::get_rhythm_data;
//! use defib_sim::RhythmType;
//!
//! let samples = get_rhythm_data(RhythmType::Sinus, 72);
//! assert_eq!(samples.len(), 2500);
//! ```

pub mod generator;
pub mod motif;
pub mod recorded;
pub mod rng;

pub use generator::{
    create_seamless_loop, generate, generate_pleth, get_rhythm_data, resample_circular,
    sample_count, WaveformGenerator, RR_JITTER,
};
pub use motif::Motif;
pub use recorded::{RecordedTrace, RECORDED_DURATION_S, RECORDED_SAMPLING_RATE};
pub use rng::{Seed, Xorshift64};

use crate::device::{DeviceState, DisplayMode, PacerMode, RhythmType};

/// The rhythm and rate the monitor should trace for `state`.
///
/// Pacing in Stimulateur mode at or above `capture_threshold` mA captures the
/// ventricle and shows a paced rhythm at the pacer frequency. In Sentinelle
/// mode the pacer is inhibited while a perfusing intrinsic rhythm already
/// beats at or above the pacer frequency.
#[must_use]
pub fn displayed_rhythm(state: &DeviceState, capture_threshold: u16) -> (RhythmType, u16) {
    let intrinsic = (state.rhythm_type, state.heart_rate);
    if !state.is_pacing || state.display_mode != DisplayMode::Stimulateur {
        return intrinsic;
    }
    let inhibited = state.pacer_mode == PacerMode::Sentinelle
        && state.rhythm_type.is_perfusing()
        && state.heart_rate >= state.pacer_frequency;
    if inhibited || state.pacer_intensity < capture_threshold {
        return intrinsic;
    }
    (RhythmType::ElectroEntrainement, state.pacer_frequency)
}

//! ECG and pleth buffer synthesis.

use super::motif::{pool_for, Motif};
use super::recorded::{RecordedTrace, RECORDED_SAMPLING_RATE};
use super::rng::{Seed, Xorshift64};
use crate::config::WaveformConfig;
use crate::device::RhythmType;
use std::f32::consts::PI;
use tracing::trace;

/// Maximum relative R-R jitter per beat
pub const RR_JITTER: f32 = 0.05;

/// Peak amplitude of the noise riding on inter-beat padding
const PADDING_NOISE: f32 = 0.015;

/// Number of samples in a `duration_seconds` window at `sampling_rate`.
#[must_use]
pub fn sample_count(duration_seconds: f32, sampling_rate: u32) -> usize {
    let count = (f64::from(duration_seconds) * f64::from(sampling_rate)).round();
    if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    }
}

/// Seeded waveform source.
///
/// Successive calls on one generator continue the same random stream, so two
/// buffers for the same rhythm differ beat to beat while the whole session
/// stays reproducible from the configured seed.
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    config: WaveformConfig,
    rng: Xorshift64,
}

impl Default for WaveformGenerator {
    fn default() -> Self {
        Self::new(WaveformConfig::default())
    }
}

impl WaveformGenerator {
    #[must_use]
    pub fn new(config: WaveformConfig) -> Self {
        Self {
            rng: Xorshift64::new(Seed::from_u64(config.seed)),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &WaveformConfig {
        &self.config
    }

    /// ECG samples for `rhythm`.
    ///
    /// Recorded rhythms ignore `heart_rate`; they are resampled from their
    /// shared trace.
    pub fn generate(
        &mut self,
        rhythm: RhythmType,
        heart_rate: u16,
        duration_seconds: f32,
        sampling_rate: u32,
    ) -> Vec<f32> {
        let count = sample_count(duration_seconds, sampling_rate);
        match pool_for(rhythm) {
            Some(pool) => self.synthesize(pool, heart_rate, count, sampling_rate),
            None => {
                let trace = RecordedTrace::for_rhythm(rhythm)
                    .unwrap_or(RecordedTrace::ClassicSinus);
                resample_circular(trace.samples(), RECORDED_SAMPLING_RATE, count, sampling_rate)
            }
        }
    }

    /// A recorded strip resampled to the requested window.
    #[must_use]
    pub fn recorded(trace: RecordedTrace, duration_seconds: f32, sampling_rate: u32) -> Vec<f32> {
        resample_circular(
            trace.samples(),
            RECORDED_SAMPLING_RATE,
            sample_count(duration_seconds, sampling_rate),
            sampling_rate,
        )
    }

    /// Display-ready ECG: configured window, seamlessly looped.
    pub fn rhythm_data(&mut self, rhythm: RhythmType, heart_rate: u16) -> Vec<f32> {
        let WaveformConfig {
            sampling_rate,
            duration_seconds,
            blend_duration_ms,
            ..
        } = self.config;
        let mut buffer = self.generate(rhythm, heart_rate, duration_seconds, sampling_rate);
        create_seamless_loop(&mut buffer, blend_duration_ms, sampling_rate);
        buffer
    }

    /// Plethysmograph trace.
    ///
    /// Perfusing rhythms produce one pulse per beat; VF, asystole and the
    /// post-shock trace produce a flat noisy baseline.
    pub fn generate_pleth(
        &mut self,
        rhythm: RhythmType,
        heart_rate: u16,
        duration_seconds: f32,
        sampling_rate: u32,
    ) -> Vec<f32> {
        let count = sample_count(duration_seconds, sampling_rate);
        let rate = sampling_rate.max(1) as f32;
        if !rhythm.is_perfusing() {
            return (0..count)
                .map(|_| self.rng.next_f32_range(-0.01, 0.01))
                .collect();
        }

        let irregular = rhythm == RhythmType::FibrillationAtriale;
        let mut buffer = Vec::with_capacity(count);
        while buffer.len() < count {
            let jitter = if irregular { 0.25 } else { RR_JITTER };
            let rr_s = beat_period(heart_rate) * (1.0 + self.rng.next_f32_range(-jitter, jitter));
            let beat_len = ((rr_s * rate).round() as usize).max(1);
            let height = self.rng.next_f32_range(0.9, 1.0);
            buffer.extend((0..beat_len).map(|i| height * pleth_pulse(i as f32 / beat_len as f32)));
        }
        buffer.truncate(count);
        buffer
    }

    /// Display-ready pleth: configured window, seamlessly looped.
    pub fn pleth_data(&mut self, rhythm: RhythmType, heart_rate: u16) -> Vec<f32> {
        let WaveformConfig {
            sampling_rate,
            duration_seconds,
            blend_duration_ms,
            ..
        } = self.config;
        let mut buffer = self.generate_pleth(rhythm, heart_rate, duration_seconds, sampling_rate);
        create_seamless_loop(&mut buffer, blend_duration_ms, sampling_rate);
        buffer
    }

    /// Beat-by-beat synthesis: padding then motif, repeated until the window
    /// is full.
    fn synthesize(
        &mut self,
        pool: &[Motif],
        heart_rate: u16,
        count: usize,
        sampling_rate: u32,
    ) -> Vec<f32> {
        let rate = sampling_rate.max(1) as f32;
        let mut buffer = Vec::with_capacity(count);
        let mut beats = 0_usize;
        while buffer.len() < count {
            let rr_s = beat_period(heart_rate)
                * (1.0 + self.rng.next_f32_range(-RR_JITTER, RR_JITTER));
            let rr_len = ((rr_s * rate).round() as usize).max(1);
            let motif = &pool[self.rng.next_index(pool.len())];
            let beat = motif.render_within(sampling_rate, rr_s);

            let head = beat.first().copied().unwrap_or(0.0);
            let from = buffer.last().copied().unwrap_or(head);
            let pad_len = rr_len.saturating_sub(beat.len());
            self.ramp_padding(&mut buffer, from, head, pad_len);
            buffer.extend_from_slice(&beat);
            beats += 1;
        }
        buffer.truncate(count);
        trace!(beats, samples = count, "synthesized ECG");
        buffer
    }

    /// Linear ramp from `from` to `to` with noise under a sin(pi t) envelope,
    /// which vanishes at both ends.
    fn ramp_padding(&mut self, buffer: &mut Vec<f32>, from: f32, to: f32, len: usize) {
        let span = (len + 1) as f32;
        for i in 1..=len {
            let t = i as f32 / span;
            let envelope = (PI * t).sin();
            let noise = self.rng.next_f32_range(-PADDING_NOISE, PADDING_NOISE);
            buffer.push(from + (to - from) * t + noise * envelope);
        }
    }
}

fn beat_period(heart_rate: u16) -> f32 {
    60.0 / f32::from(heart_rate.max(1))
}

/// One pleth pulse over a unit beat: systolic rise, dicrotic notch, decay.
fn pleth_pulse(phase: f32) -> f32 {
    let g = |center: f32, width: f32| {
        let z = (phase - center) / width;
        (-0.5 * z * z).exp()
    };
    g(0.22, 0.08) + 0.35 * g(0.48, 0.09)
}

/// Blend the last `blend_duration_ms` of `buffer` toward its first sample so
/// the buffer can be scanned end-to-start without a jump.
///
/// The blend window is capped at `len - 1` samples; buffers shorter than two
/// samples are left untouched.
pub fn create_seamless_loop(buffer: &mut [f32], blend_duration_ms: u32, sampling_rate: u32) {
    let len = buffer.len();
    if len < 2 {
        return;
    }
    let window = (u64::from(blend_duration_ms) * u64::from(sampling_rate) / 1000) as usize;
    let window = window.clamp(1, len - 1);
    let head = buffer[0];
    let start = len - window;
    for (j, sample) in buffer[start..].iter_mut().enumerate() {
        let w = (j + 1) as f32 / window as f32;
        *sample = *sample * (1.0 - w) + head * w;
    }
}

/// Resample a looping source onto `count` output samples at `target_rate`,
/// wrapping around the source end with linear interpolation.
#[must_use]
pub fn resample_circular(
    source: &[f32],
    source_rate: u32,
    count: usize,
    target_rate: u32,
) -> Vec<f32> {
    if source.is_empty() || count == 0 {
        return Vec::new();
    }
    if source_rate == target_rate {
        return source.iter().copied().cycle().take(count).collect();
    }
    let len = source.len();
    let step = f64::from(source_rate) / f64::from(target_rate.max(1));
    (0..count)
        .map(|i| {
            let pos = (i as f64 * step) % len as f64;
            let index = pos.floor() as usize % len;
            let frac = (pos - pos.floor()) as f32;
            let a = source[index];
            let b = source[(index + 1) % len];
            a + (b - a) * frac
        })
        .collect()
}

/// ECG buffer from the default seed.
#[must_use]
pub fn generate(
    rhythm: RhythmType,
    heart_rate: u16,
    duration_seconds: f32,
    sampling_rate: u32,
) -> Vec<f32> {
    WaveformGenerator::default().generate(rhythm, heart_rate, duration_seconds, sampling_rate)
}

/// Pleth buffer from the default seed.
#[must_use]
pub fn generate_pleth(
    rhythm: RhythmType,
    heart_rate: u16,
    duration_seconds: f32,
    sampling_rate: u32,
) -> Vec<f32> {
    WaveformGenerator::default().generate_pleth(rhythm, heart_rate, duration_seconds, sampling_rate)
}

/// Display buffer at 250 Hz / 10 s, seamlessly looped.
#[must_use]
pub fn get_rhythm_data(rhythm: RhythmType, heart_rate: u16) -> Vec<f32> {
    WaveformGenerator::default().rhythm_data(rhythm, heart_rate)
}

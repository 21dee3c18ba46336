//! Waveform command handler

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::Reporter;
use crate::{SampleFormat, WaveformArgs};
use defib_sim::waveform::create_seamless_loop;
use defib_sim::{RecordedTrace, RhythmType, WaveformConfig, WaveformGenerator};
use serde::Serialize;
use std::fmt::Write as _;

/// What to render, after defaults from the configuration are applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformRequest {
    pub rhythm: RhythmType,
    pub heart_rate: u16,
    pub recorded: Option<RecordedTrace>,
    pub pleth: bool,
    pub looped: bool,
    pub waveform: WaveformConfig,
}

impl WaveformRequest {
    /// Merge command-line overrides into the configured waveform parameters.
    pub fn from_args(config: &CliConfig, args: &WaveformArgs) -> CliResult<Self> {
        let mut waveform = config.sim.waveform;
        if let Some(duration) = args.duration {
            waveform.duration_seconds = duration;
        }
        if let Some(rate) = args.sampling_rate {
            waveform.sampling_rate = rate;
        }
        if let Some(seed) = args.seed {
            waveform.seed = seed;
        }
        waveform.validate()?;

        Ok(Self {
            rhythm: args.rhythm,
            heart_rate: args.heart_rate,
            recorded: args.recorded,
            pleth: args.pleth,
            looped: !args.no_loop,
            waveform,
        })
    }

    /// Label for the sample header
    #[must_use]
    pub fn label(&self) -> String {
        match (self.recorded, self.pleth) {
            (Some(trace), _) => format!("recorded:{trace}"),
            (None, true) => format!("pleth:{}", self.rhythm),
            (None, false) => format!("ecg:{}", self.rhythm),
        }
    }

    /// Produce the samples.
    #[must_use]
    pub fn render(&self) -> Vec<f32> {
        let WaveformConfig {
            sampling_rate,
            duration_seconds,
            blend_duration_ms,
            ..
        } = self.waveform;
        let mut generator = WaveformGenerator::new(self.waveform);

        let mut samples = match (self.recorded, self.pleth) {
            (Some(trace), _) => {
                WaveformGenerator::recorded(trace, duration_seconds, sampling_rate)
            }
            (None, true) => generator.generate_pleth(
                self.rhythm,
                self.heart_rate,
                duration_seconds,
                sampling_rate,
            ),
            (None, false) => {
                generator.generate(self.rhythm, self.heart_rate, duration_seconds, sampling_rate)
            }
        };
        if self.looped {
            create_seamless_loop(&mut samples, blend_duration_ms, sampling_rate);
        }
        samples
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SampleDocument<'a> {
    waveform: String,
    heart_rate: u16,
    sampling_rate: u32,
    duration_seconds: f32,
    samples: &'a [f32],
}

/// Serialize samples in the requested format.
pub fn render_samples(
    request: &WaveformRequest,
    samples: &[f32],
    format: SampleFormat,
) -> CliResult<String> {
    match format {
        SampleFormat::Csv => {
            let rate = f64::from(request.waveform.sampling_rate.max(1));
            let mut out = String::with_capacity(samples.len() * 16);
            let _ = writeln!(out, "# {}", request.label());
            out.push_str("time_s,value\n");
            for (i, value) in samples.iter().enumerate() {
                let _ = writeln!(out, "{:.4},{value:.5}", i as f64 / rate);
            }
            Ok(out)
        }
        SampleFormat::Json => {
            let document = SampleDocument {
                waveform: request.label(),
                heart_rate: request.heart_rate,
                sampling_rate: request.waveform.sampling_rate,
                duration_seconds: request.waveform.duration_seconds,
                samples,
            };
            Ok(serde_json::to_string(&document)?)
        }
    }
}

/// Execute the waveform command
pub fn execute_waveform(config: &CliConfig, args: &WaveformArgs) -> CliResult<()> {
    let request = WaveformRequest::from_args(config, args)?;
    let samples = request.render();
    let text = render_samples(&request, &samples, args.format)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, text)?;
            Reporter::from_config(config).success(&format!(
                "{} samples of {} written to {}",
                samples.len(),
                request.label(),
                path.display()
            ));
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request(rhythm: RhythmType) -> WaveformRequest {
        WaveformRequest {
            rhythm,
            heart_rate: 75,
            recorded: None,
            pleth: false,
            looped: true,
            waveform: WaveformConfig::default(),
        }
    }

    #[test]
    fn test_default_window_length() {
        assert_eq!(request(RhythmType::Sinus).render().len(), 2500);
    }

    #[test]
    fn test_render_matches_library_display_buffer() {
        let mut generator = WaveformGenerator::default();
        assert_eq!(
            request(RhythmType::Bav1).render(),
            generator.rhythm_data(RhythmType::Bav1, 75)
        );
    }

    #[test]
    fn test_recorded_strip_ignores_rhythm() {
        let mut req = request(RhythmType::Sinus);
        req.recorded = Some(RecordedTrace::Asystole);
        req.looped = false;
        assert_eq!(req.label(), "recorded:asystole");
        assert_eq!(
            req.render(),
            WaveformGenerator::recorded(RecordedTrace::Asystole, 10.0, 250)
        );
    }

    #[test]
    fn test_csv_has_header_and_one_row_per_sample() {
        let mut req = request(RhythmType::Sinus);
        req.waveform.duration_seconds = 1.0;
        let samples = req.render();
        let csv = render_samples(&req, &samples, SampleFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "# ecg:sinus");
        assert_eq!(lines[1], "time_s,value");
        assert_eq!(lines.len(), samples.len() + 2);
        assert!(lines[2].starts_with("0.0000,"));
    }

    #[test]
    fn test_json_document() {
        let mut req = request(RhythmType::Asystole);
        req.pleth = true;
        let samples = req.render();
        let json = render_samples(&req, &samples, SampleFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["waveform"], "pleth:asystole");
        assert_eq!(value["samplingRate"], 250);
        assert_eq!(value["samples"].as_array().unwrap().len(), samples.len());
    }
}

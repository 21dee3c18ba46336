//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use defib_sim::{RecordedTrace, RhythmType};
use std::path::PathBuf;

/// defib: headless defibrillator/monitor training simulator
#[derive(Parser, Debug)]
#[command(name = "defib")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Simulator configuration file (YAML: device timing, waveform)
    #[arg(long, global = true, env = "DEFIB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check scenario documents for structural errors and unknown names
    Validate(ValidateArgs),

    /// Play a recorded session against a scenario
    Run(RunArgs),

    /// Write ECG or pleth samples for a rhythm
    Waveform(WaveformArgs),

    /// List or show the bundled scenarios
    Scenarios(ScenariosArgs),

    /// Drive the device interactively in (scaled) real time
    Console(ConsoleArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Scenario files or built-in ids
    #[arg(required = true)]
    pub scenarios: Vec<String>,

    /// Treat unknown property/event names as errors
    #[arg(long)]
    pub strict: bool,

    /// Report format
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario file or built-in id
    pub scenario: String,

    /// Action script to play (defaults to the built-in reference session)
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Print every device event
    #[arg(long)]
    pub trace: bool,

    /// Report format
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,
}

/// Arguments for the waveform command
#[derive(Parser, Debug)]
pub struct WaveformArgs {
    /// Rhythm to synthesize
    #[arg(short, long, default_value = "sinus")]
    pub rhythm: RhythmType,

    /// Heart rate in bpm (dynamic rhythms only)
    #[arg(long, default_value = "70")]
    pub heart_rate: u16,

    /// Emit a raw recorded strip instead of a rhythm
    #[arg(long, conflicts_with = "pleth")]
    pub recorded: Option<RecordedTrace>,

    /// Plethysmograph instead of ECG
    #[arg(long)]
    pub pleth: bool,

    /// Window length in seconds (defaults to the configured window)
    #[arg(long)]
    pub duration: Option<f32>,

    /// Sampling rate in Hz (defaults to the configured rate)
    #[arg(long)]
    pub sampling_rate: Option<u32>,

    /// PRNG seed (defaults to the configured seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the seamless-loop blend
    #[arg(long)]
    pub no_loop: bool,

    /// Output file (stdout when absent)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sample format
    #[arg(short, long, default_value = "csv")]
    pub format: SampleFormat,
}

/// Arguments for the scenarios command
#[derive(Parser, Debug)]
pub struct ScenariosArgs {
    /// Show one scenario in detail
    pub id: Option<String>,

    /// Print the scenario document as YAML
    #[arg(long, requires = "id")]
    pub yaml: bool,

    /// Report format
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,
}

/// Arguments for the console command
#[derive(Parser, Debug)]
pub struct ConsoleArgs {
    /// Scenario file or built-in id to run while driving the device
    #[arg(short, long)]
    pub scenario: Option<String>,

    /// Wall-clock tick in milliseconds
    #[arg(long, default_value = "100")]
    pub tick_ms: u64,

    /// Virtual milliseconds per wall-clock millisecond (0 pauses the clock)
    #[arg(long, default_value = "1.0")]
    pub speed: f64,
}

/// Report format for validate, run and scenarios
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document
    Json,
}

impl From<ReportFormat> for crate::config::OutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Text => Self::Text,
            ReportFormat::Json => Self::Json,
        }
    }
}

/// Sample format for the waveform command
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleFormat {
    /// `time_s,value` rows
    #[default]
    Csv,
    /// JSON object with rate and samples
    Json,
}

/// Color choice argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

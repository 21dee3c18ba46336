//! defib CLI library
//!
//! Command-line front end for the `defib-sim` training simulator: scenario
//! validation, headless session replay, waveform export and an interactive
//! console.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod output;

pub use commands::{
    Cli, ColorArg, Commands, ConsoleArgs, ReportFormat, RunArgs, SampleFormat, ScenariosArgs,
    ValidateArgs, WaveformArgs,
};
pub use config::{CliConfig, ColorChoice, OutputFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Reporter;

/// Install the `tracing` subscriber on stderr. `RUST_LOG` overrides the
/// level derived from `-q` / `-v`.
pub fn init_tracing(verbosity: Verbosity) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

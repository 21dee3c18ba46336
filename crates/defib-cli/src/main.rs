//! defib: command-line front end for the defibrillator training simulator
//!
//! ## Usage
//!
//! ```bash
//! defib scenarios                          # List bundled scenarios
//! defib validate my-scenario.yaml          # Check a scenario document
//! defib run vf-manual-shock                # Replay the reference session
//! defib run my.yaml --script session.yaml  # Replay a recorded session
//! defib waveform --rhythm bav3 -o bav3.csv # Export samples
//! defib console --scenario dae-vf          # Drive the device by hand
//! ```

use clap::Parser;
use defib_cli::{
    handlers, init_tracing, Cli, CliConfig, CliResult, ColorChoice, Commands, OutputFormat,
    ReportFormat, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_tracing(config.verbosity);

    match &cli.command {
        Commands::Validate(args) => {
            handlers::execute_validate(&with_format(config, args.format), args)
        }
        Commands::Run(args) => handlers::execute_run(&with_format(config, args.format), args),
        Commands::Waveform(args) => handlers::execute_waveform(&config, args),
        Commands::Scenarios(args) => {
            handlers::execute_scenarios(&with_format(config, args.format), args)
        }
        Commands::Console(args) => handlers::execute_console(&config, args),
    }
}

fn build_config(cli: &Cli) -> CliResult<CliConfig> {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.into();
    let config = CliConfig::new().with_verbosity(verbosity).with_color(color);

    match &cli.config {
        Some(path) => config.with_sim_file(path),
        None => Ok(config),
    }
}

fn with_format(config: CliConfig, format: ReportFormat) -> CliConfig {
    config.with_format(OutputFormat::from(format))
}

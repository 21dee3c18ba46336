//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains the execution logic for one CLI command and
//! the pure helpers it is built from.

pub mod console;
pub mod run;
pub mod scenarios;
pub mod validate;
pub mod waveform;

pub use console::{execute_console, parse_command, ConsoleCommand, ConsoleSession};
pub use run::{execute_run, play_session, RunReport};
pub use scenarios::{execute_scenarios, ScenarioSummary};
pub use validate::{execute_validate, validate_document, ValidationReport};
pub use waveform::{execute_waveform, render_samples, WaveformRequest};

use crate::error::{CliError, CliResult};
use defib_sim::scenario::{builtin, BuiltinScenario};
use defib_sim::ScenarioConfig;
use std::path::Path;

/// A scenario named on the command line.
#[derive(Debug, Clone)]
pub struct ResolvedScenario {
    pub config: ScenarioConfig,
    /// Set when the argument named a bundled scenario
    pub builtin: Option<&'static BuiltinScenario>,
}

/// Resolve a built-in id first, then a file path.
pub fn resolve_scenario(arg: &str) -> CliResult<ResolvedScenario> {
    if let Some(found) = builtin(arg) {
        return Ok(ResolvedScenario {
            config: found.config()?,
            builtin: Some(found),
        });
    }
    if Path::new(arg).exists() {
        return Ok(ResolvedScenario {
            config: ScenarioConfig::load(arg)?,
            builtin: None,
        });
    }
    Err(CliError::invalid_argument(format!(
        "'{arg}' is neither a scenario file nor a built-in id"
    )))
}

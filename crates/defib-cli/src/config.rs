//! CLI configuration

use crate::error::CliResult;
use defib_sim::SimConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - scenario progress
    Verbose,
    /// Debug - every guard rejection and timer
    Debug,
}

impl Verbosity {
    /// Map `-q` / `-v` flags onto a level
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Default `tracing` filter directive, overridden by `RUST_LOG`
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stdout().features().colors_supported(),
        }
    }
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document on stdout
    Json,
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Report format
    pub format: OutputFormat,
    /// Device timing and waveform parameters
    pub sim: SimConfig,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set report format
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set simulator configuration
    #[must_use]
    pub fn with_sim(mut self, sim: SimConfig) -> Self {
        self.sim = sim;
        self
    }

    /// Replace the simulator configuration with one read from `path`.
    pub fn with_sim_file(self, path: impl AsRef<Path>) -> CliResult<Self> {
        let sim = SimConfig::load(path)?;
        Ok(self.with_sim(sim))
    }

    /// Whether reports should be JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_default_verbosity() {
            assert_eq!(Verbosity::default(), Verbosity::Normal);
        }

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 2), Verbosity::Debug);
        }

        #[test]
        fn test_log_filter() {
            assert_eq!(Verbosity::Quiet.log_filter(), "error");
            assert_eq!(Verbosity::Normal.log_filter(), "warn");
            assert_eq!(Verbosity::Verbose.log_filter(), "info");
            assert_eq!(Verbosity::Debug.log_filter(), "debug");
        }

        #[test]
        fn test_is_verbose() {
            assert!(!Verbosity::Quiet.is_verbose());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Verbose.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
        }
    }

    mod color_choice_tests {
        use super::*;

        #[test]
        fn test_default_color() {
            assert_eq!(ColorChoice::default(), ColorChoice::Auto);
        }

        #[test]
        fn test_should_color_fixed() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }
    }

    mod cli_config_tests {
        use super::*;

        #[test]
        fn test_builder_chain() {
            let config = CliConfig::new()
                .with_verbosity(Verbosity::Debug)
                .with_color(ColorChoice::Never)
                .with_format(OutputFormat::Json);
            assert_eq!(config.verbosity, Verbosity::Debug);
            assert_eq!(config.color, ColorChoice::Never);
            assert!(config.is_json());
        }

        #[test]
        fn test_with_sim_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "device:\n  synchroDelayMs: 1200\nwaveform:\n  seed: 7").unwrap();
            let config = CliConfig::new().with_sim_file(file.path()).unwrap();
            assert_eq!(config.sim.device.synchro_delay_ms, 1200);
            assert_eq!(config.sim.waveform.seed, 7);
        }

        #[test]
        fn test_with_sim_file_rejects_invalid() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "device:\n  chargeIncrement: 0").unwrap();
            assert!(CliConfig::new().with_sim_file(file.path()).is_err());
        }
    }
}

//! Styled terminal output

use crate::config::CliConfig;
use console::{style, Term};
use serde::Serialize;

/// Writes status lines to stdout, styled when color is enabled.
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    /// Reporter matching the CLI flags
    #[must_use]
    pub fn from_config(config: &CliConfig) -> Self {
        Self::new(config.color.should_color(), config.verbosity.is_quiet())
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode.
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section heading
    pub fn heading(&self, message: &str) {
        if self.quiet {
            return;
        }
        let text = if self.use_color {
            style(message).bold().to_string()
        } else {
            message.to_string()
        };
        let _ = self.term.write_line(&text);
    }

    /// Print a secondary, dimmed line
    pub fn detail(&self, message: &str) {
        if self.quiet {
            return;
        }
        let text = if self.use_color {
            style(message).dim().to_string()
        } else {
            message.to_string()
        };
        let _ = self.term.write_line(&text);
    }

    /// Print a plain line
    pub fn line(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(message);
    }

    /// Print a value as pretty JSON, regardless of quiet mode
    pub fn json<T: Serialize>(&self, value: &T) -> serde_json::Result<()> {
        let text = serde_json::to_string_pretty(value)?;
        let _ = self.term.write_line(&text);
        Ok(())
    }
}

/// `mm:ss.mmm` for a virtual timestamp
#[must_use]
pub fn format_clock(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms / 1000) % 60;
    format!("{minutes:02}:{seconds:02}.{:03}", ms % 1000)
}

//! Error types for the CLI

use defib_sim::{ConfigError, ScenarioError, SimError};
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Simulator library error
    #[error("{0}")]
    Sim(#[from] SimError),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output could not be produced
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// A document loaded but did not pass the requested checks
    #[error("Validation failed: {message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// A played session did not complete its scenario
    #[error("Scenario not completed: {message}")]
    ScenarioFailed {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a scenario failure error
    #[must_use]
    pub fn scenario_failed(message: impl Into<String>) -> Self {
        Self::ScenarioFailed {
            message: message.into(),
        }
    }
}

impl From<ScenarioError> for CliError {
    fn from(err: ScenarioError) -> Self {
        Self::Sim(err.into())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Sim(err.into())
    }
}

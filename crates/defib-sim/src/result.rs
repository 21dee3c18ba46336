//! Result and error types for the simulator core.

use crate::config::ConfigError;
use crate::scenario::ScenarioError;
use thiserror::Error;

/// Result type for simulator operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors that can occur in the simulator core.
///
/// Guard rejections on the device (shock without charge, charging twice, ...)
/// are not errors: the device simply ignores the input. Only malformed input
/// documents and I/O problems surface here.
#[derive(Debug, Error)]
pub enum SimError {
    /// Scenario document could not be loaded or is malformed
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Simulator configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Action script could not be parsed
    #[error("Invalid action script: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Create a script error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path that caused it
    #[must_use]
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

//! Runner-specific error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Tests not found in {location}")]
    NoTestsFound { location: String },

    #[error("Environment setup failed: {message}")]
    EnvironmentSetup { message: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Could not list available tests for binary {binary}")]
    EnumerationFailed { binary: String, status: Option<i32> },

    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Pseudo-terminal error: {0}")]
    Pty(#[from] nix::Error),

    #[error("Shared component error")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RunnerError {
    pub fn config(field: impl Into<String>) -> Self {
        RunnerError::ConfigurationError { field: field.into() }
    }

    pub fn environment(message: impl Into<String>) -> Self {
        RunnerError::EnvironmentSetup {
            message: message.into(),
        }
    }

    /// Errors that abort the whole run rather than one binary's contribution
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RunnerError::NoTestsFound { .. }
                | RunnerError::EnvironmentSetup { .. }
                | RunnerError::ConfigurationError { .. }
                | RunnerError::SharedError(_)
                | RunnerError::JsonError(_)
        )
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;

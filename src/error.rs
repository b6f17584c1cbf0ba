//! Error taxonomy for a single auto-stop run.
//!
//! Every variant is fatal: the run aborts without stopping the instance.

use thiserror::Error;

/// Errors that abort an idle check.
#[derive(Error, Debug)]
pub enum AutostopError {
    /// Missing or invalid input, detected before any I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A local API or control-plane call failed or returned garbage.
    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// A timestamp did not match the expected wire format.
    #[error("Timestamp {value:?} does not match format {expected}")]
    Format {
        value: String,
        expected: &'static str,
    },

    /// The instance identity could not be read from local metadata.
    #[error("Instance identity not found: {0}")]
    NotFound(String),
}

impl AutostopError {
    pub(crate) fn transport(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = AutostopError> = std::result::Result<T, E>;

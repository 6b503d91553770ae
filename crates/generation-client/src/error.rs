//! Error types for generation-client

use thiserror::Error;

/// Errors that can occur while talking to the generation service
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Connection refused, reset, DNS failure and other transport faults
    #[error("Generation transport failed: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout
    #[error("Generation request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The service answered with a non-success HTTP status
    #[error("Generation service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service reported a failure inside an otherwise well-formed reply
    #[error("Generation service reported an error: {0}")]
    Service(String),

    /// The byte stream could not be split into frames
    #[error("Invalid reply framing: {0}")]
    Framing(String),

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    /// A scripted fake ran out of replies
    #[error("No scripted reply left for request")]
    ScriptExhausted,
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::from_reqwest(err, 0)
    }
}

impl GenerationError {
    /// Classify a `reqwest` failure; a timeout reports `timeout_secs`, which
    /// reqwest itself does not carry.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout { timeout_secs }
        } else if let Some(status) = err.status() {
            GenerationError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            GenerationError::Transport(err.to_string())
        }
    }

    /// Whether this error came from the network layer rather than the service itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GenerationError::Transport(_) | GenerationError::Timeout { .. }
        )
    }
}

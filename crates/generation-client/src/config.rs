//! Generation endpoint configuration

use serde::{Deserialize, Serialize};

/// Endpoint used when `REDLINE_ENDPOINT` is unset (a local Ollama daemon).
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Model used when `REDLINE_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "llama3";

/// Request timeout used when `REDLINE_TIMEOUT_SECS` is unset or unparsable.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Generation service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Full URL the prompt is POSTed to
    pub endpoint: String,
    /// Model name sent with every request
    pub model: String,
    /// Transport timeout; the core treats expiry like any other failure
    pub timeout_secs: u64,
    /// User agent header
    pub user_agent: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            endpoint: std::env::var("REDLINE_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            model: std::env::var("REDLINE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout_secs: std::env::var("REDLINE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("redline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GenerationConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint and model
    pub fn new(endpoint: &str, model: &str) -> Self {
        GenerationConfig {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("redline/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

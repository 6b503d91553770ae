//! HTTP generation client
//!
//! Talks to an Ollama-style `/api/generate` endpoint: one JSON POST, answered
//! either with a single JSON object or with newline-delimited fragments.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::framing::frame_ndjson;
use crate::service::{GenerationReply, GenerationService};
use crate::wire::GenerationRequest;
use crate::Result;

/// Longest error body kept in a `Status` error.
const MAX_ERROR_BODY: usize = 512;

/// Generation client over HTTP
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    config: GenerationConfig,
    http_client: reqwest::Client,
}

impl HttpGenerationClient {
    /// Create a new client
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::ClientSetup(e.to_string()))?;

        Ok(HttpGenerationClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GenerationConfig::from_env())
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn map_send_error(&self, err: reqwest::Error) -> GenerationError {
        GenerationError::from_reqwest(err, self.config.timeout_secs)
    }
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    async fn send(&self, request: &GenerationRequest) -> Result<GenerationReply> {
        debug!(
            endpoint = %self.config.endpoint,
            model = %request.model,
            stream = request.stream,
            prompt_len = request.prompt.len(),
            "posting generation request"
        );

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            warn!(status = status.as_u16(), "generation service rejected request");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if request.stream {
            let timeout_secs = self.config.timeout_secs;
            let chunks = response.bytes_stream().map(move |chunk| {
                chunk.map_err(|e| GenerationError::from_reqwest(e, timeout_secs))
            });
            Ok(GenerationReply::Streamed(frame_ndjson(chunks)))
        } else {
            let body = response.text().await.map_err(|e| self.map_send_error(e))?;
            Ok(GenerationReply::Atomic(body))
        }
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_config() {
        let config = GenerationConfig::new("http://127.0.0.1:9/api", "m");
        let client = HttpGenerationClient::new(config).unwrap();
        assert_eq!(client.config().model, "m");
    }

    #[test]
    fn test_floor_char_boundary() {
        assert_eq!(floor_char_boundary("abc", 10), 3);
        assert_eq!(floor_char_boundary("a\u{e9}", 2), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) is essentially never listening on loopback.
        let client =
            HttpGenerationClient::new(GenerationConfig::new("http://127.0.0.1:9/api/generate", "m"))
                .unwrap();
        let err = client
            .send(&GenerationRequest::new("m", "hi", false))
            .await
            .unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err:?}");
    }
}

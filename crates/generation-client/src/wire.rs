//! JSON shapes exchanged with the generation endpoint.
//!
//! The request is a single JSON object. The reply is either one JSON object
//! (atomic) or newline-delimited JSON fragments (streamed), selected by the
//! `stream` flag the client set in the request.

use serde::{Deserialize, Serialize};

/// Body POSTed to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier understood by the service
    pub model: String,
    /// Fully rendered prompt text
    #[serde(alias = "promptText")]
    pub prompt: String,
    /// Ask for a newline-delimited fragment stream instead of one payload
    #[serde(alias = "streaming")]
    pub stream: bool,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, stream: bool) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream,
        }
    }
}

/// Reply body in atomic mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicReply {
    #[serde(alias = "responseText")]
    pub response: String,
}

/// One framed object of a streamed reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFragment {
    /// Incremental text, absent on pure status frames
    #[serde(default, alias = "fragmentText", skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Set on the final fragment
    #[serde(default)]
    pub done: bool,

    /// Service-side failure reported mid-stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamFragment {
    /// Build a text fragment.
    pub fn text(text: impl Into<String>, done: bool) -> Self {
        Self {
            response: Some(text.into()),
            done,
            error: None,
        }
    }
}

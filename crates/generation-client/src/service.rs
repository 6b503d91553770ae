//! The generation service seam.
//!
//! Implementations deliver raw reply text; decoding it into feedback is the
//! caller's job. In-memory fakes live in the `fakes` module.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::GenerationError;
use crate::wire::GenerationRequest;

/// Ordered stream of framed reply objects, one item per NDJSON line.
pub type FrameStream = BoxStream<'static, Result<String, GenerationError>>;

/// Raw reply from the generation service.
pub enum GenerationReply {
    /// Entire body, delivered at once
    Atomic(String),
    /// Framed fragments, delivered as they arrive
    Streamed(FrameStream),
}

impl GenerationReply {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationReply::Atomic(_) => "atomic",
            GenerationReply::Streamed(_) => "streamed",
        }
    }
}

impl fmt::Debug for GenerationReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationReply::Atomic(body) => f.debug_tuple("Atomic").field(body).finish(),
            GenerationReply::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// A text-generation backend: prompt in, text out.
///
/// The reply variant must follow the request's `stream` flag.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Send one request and return the undecoded reply.
    async fn send(&self, request: &GenerationRequest) -> Result<GenerationReply, GenerationError>;
}

#[async_trait]
impl<T: GenerationService + ?Sized> GenerationService for std::sync::Arc<T> {
    async fn send(&self, request: &GenerationRequest) -> Result<GenerationReply, GenerationError> {
        (**self).send(request).await
    }
}

//! In-memory fakes for the generation service (testing only)
//!
//! `ScriptedGenerationService` replays queued replies, records every request
//! it receives and can hold an exchange open until the test releases it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Notify;

use crate::error::GenerationError;
use crate::service::{GenerationReply, GenerationService};
use crate::wire::{AtomicReply, GenerationRequest, StreamFragment};

/// One scripted outcome, consumed by one `send`.
#[derive(Debug)]
pub enum ScriptedReply {
    /// Raw atomic body
    Atomic(String),
    /// Raw frames, yielded one by one
    Frames(Vec<Result<String, GenerationError>>),
    /// Fail the send itself
    Fail(GenerationError),
}

impl ScriptedReply {
    /// Atomic body `{"response": text}`.
    pub fn atomic_text(text: &str) -> Self {
        let body = serde_json::to_string(&AtomicReply {
            response: text.to_string(),
        })
        .unwrap_or_default();
        ScriptedReply::Atomic(body)
    }

    /// Well-formed fragments built from `(text, done)` pairs.
    pub fn fragments(parts: &[(&str, bool)]) -> Self {
        let frames = parts
            .iter()
            .map(|(text, done)| {
                Ok(serde_json::to_string(&StreamFragment::text(*text, *done))
                    .unwrap_or_default())
            })
            .collect();
        ScriptedReply::Frames(frames)
    }

    /// Frames given verbatim.
    pub fn raw_frames(frames: &[&str]) -> Self {
        ScriptedReply::Frames(frames.iter().map(|f| Ok(f.to_string())).collect())
    }
}

/// Scripted generation service.
#[derive(Debug, Default)]
pub struct ScriptedGenerationService {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
    frames_pulled: Arc<AtomicUsize>,
    received: Notify,
    hold: Option<Arc<Notify>>,
}

impl ScriptedGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next request.
    pub fn with_reply(self, reply: ScriptedReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Block every `send` after recording the request until `gate` is notified.
    pub fn with_hold(mut self, gate: Arc<Notify>) -> Self {
        self.hold = Some(gate);
        self
    }

    /// Queue a reply on a shared instance.
    pub fn push_reply(&self, reply: ScriptedReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Frames the consumer has pulled from streamed replies.
    pub fn frames_pulled(&self) -> usize {
        self.frames_pulled.load(Ordering::SeqCst)
    }

    /// Resolves once a request has been recorded.
    pub async fn request_received(&self) {
        self.received.notified().await;
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerationService {
    async fn send(&self, request: &GenerationRequest) -> Result<GenerationReply, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.received.notify_one();

        if let Some(gate) = &self.hold {
            gate.notified().await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(GenerationError::ScriptExhausted)?;

        match reply {
            ScriptedReply::Atomic(body) => Ok(GenerationReply::Atomic(body)),
            ScriptedReply::Fail(err) => Err(err),
            ScriptedReply::Frames(frames) => {
                let pulled = Arc::clone(&self.frames_pulled);
                let frames = stream::iter(frames).inspect(move |_| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                });
                Ok(GenerationReply::Streamed(frames.boxed()))
            }
        }
    }
}

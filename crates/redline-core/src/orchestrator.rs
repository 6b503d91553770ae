//! Feedback orchestration: prompt out, decoded feedback back.
//!
//! One exchange = build a [`FeedbackRequest`] from annotations, send it to a
//! [`GenerationService`], decode the reply with the request's
//! [`DecodeStrategy`], and split it into sections when rewrites were asked for.
//!
//! Streamed replies publish the growing feedback text on a `watch` channel
//! after every fragment. That channel is observation only: on failure the
//! last partial text stays visible there, but the exchange result is an error.

use std::fmt;
use std::time::Instant;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use generation_client::{
    AtomicReply, FrameStream, GenerationError, GenerationReply, GenerationRequest,
    GenerationService, StreamFragment,
};

use crate::annotation::{Annotation, RenderSurface};
use crate::error::FeedbackError;
use crate::feedback::FeedbackResult;
use crate::obs;
use crate::prompt::{FeedbackRequest, ReviseMode};
use crate::sections::{split, REWRITE_MARKER_PREFIX};
use crate::workbench::{lock_workbench, SharedWorkbench};

/// How the service's reply is framed, chosen once per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// One JSON object `{ "response": ... }`
    #[default]
    Atomic,
    /// Newline-delimited `{ "response": ..., "done": ... }` fragments
    Streamed,
}

impl DecodeStrategy {
    pub fn is_streamed(self) -> bool {
        self == DecodeStrategy::Streamed
    }
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStrategy::Atomic => f.write_str("atomic"),
            DecodeStrategy::Streamed => f.write_str("streamed"),
        }
    }
}

/// Drives feedback exchanges against one generation service.
///
/// Not reentrant by itself: concurrent `revise` calls on the same workbench
/// are refused by the workbench's edit-mode guard.
pub struct FeedbackOrchestrator<S> {
    service: S,
    model: String,
    strategy: DecodeStrategy,
    partial: watch::Sender<String>,
}

impl<S: GenerationService> FeedbackOrchestrator<S> {
    pub fn new(service: S, model: impl Into<String>) -> Self {
        let (partial, _) = watch::channel(String::new());
        Self {
            service,
            model: model.into(),
            strategy: DecodeStrategy::default(),
            partial,
        }
    }

    pub fn with_strategy(mut self, strategy: DecodeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> DecodeStrategy {
        self.strategy
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Observe the feedback text as it grows during an exchange.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.partial.subscribe()
    }

    /// Run a full guarded revise cycle on `bench`.
    ///
    /// Refused without any network call when nothing is marked
    /// (`EmptyInput`) or an exchange is already in flight
    /// (`AlreadyRequesting`). Whatever the outcome, the workbench is back in
    /// viewing mode afterwards and only a success replaces its result. That
    /// includes the future being dropped before the exchange finishes.
    pub async fn revise<R: RenderSurface>(
        &self,
        bench: &SharedWorkbench<R>,
        mode: ReviseMode,
    ) -> Result<FeedbackResult, FeedbackError> {
        let pending = lock_workbench(bench).begin_revise()?;
        let in_flight = InFlight::new(bench, pending.source_revision);

        let outcome = self
            .exchange(&pending.annotations, mode, pending.source_revision)
            .await;

        in_flight.disarm();
        let mut bench = lock_workbench(bench);
        match outcome {
            Ok(result) => {
                bench.complete_revise(result.clone())?;
                Ok(result)
            }
            Err(err) => {
                bench.fail_revise()?;
                Err(err)
            }
        }
    }

    /// One exchange for already-extracted annotations, with no workbench.
    pub async fn exchange(
        &self,
        annotations: &[Annotation],
        mode: ReviseMode,
        source_revision: u64,
    ) -> Result<FeedbackResult, FeedbackError> {
        let request = FeedbackRequest::new(annotations, mode, self.strategy, source_revision)?;
        let exchange_id = Uuid::new_v4();
        let started = Instant::now();

        obs::emit_exchange_started(
            exchange_id,
            &request.decode.to_string(),
            request.mode.label(),
            annotations.len(),
        );

        let outcome = self
            .run(exchange_id, &request)
            .instrument(obs::exchange_span(exchange_id))
            .await;

        match &outcome {
            Ok(result) => obs::emit_exchange_finished(
                exchange_id,
                started.elapsed().as_millis() as u64,
                result.feedback_text.len(),
                result.rewrites.len(),
            ),
            Err(err) => obs::emit_exchange_failed(exchange_id, err),
        }
        outcome
    }

    async fn run(
        &self,
        exchange_id: Uuid,
        request: &FeedbackRequest,
    ) -> Result<FeedbackResult, FeedbackError> {
        self.partial.send_replace(String::new());

        let wire = GenerationRequest::new(
            self.model.clone(),
            request.prompt(),
            request.decode.is_streamed(),
        );
        let reply = self.service.send(&wire).await?;

        let raw = match (request.decode, reply) {
            (DecodeStrategy::Atomic, GenerationReply::Atomic(body)) => {
                let text = decode_atomic(&body)?;
                self.partial.send_replace(text.clone());
                text
            }
            (DecodeStrategy::Streamed, GenerationReply::Streamed(frames)) => {
                decode_streamed(frames, |seq, text| {
                    self.partial.send_replace(text.to_string());
                    obs::emit_fragment_received(exchange_id, seq, text.len());
                })
                .await?
            }
            (expected, reply) => {
                return Err(FeedbackError::Decode(format!(
                    "expected {expected} reply, service sent {}",
                    reply.kind()
                )));
            }
        };

        Ok(match request.mode {
            ReviseMode::FeedbackOnly => {
                FeedbackResult::new(raw.trim(), Vec::new(), request.source_revision)
            }
            ReviseMode::FeedbackWithRewrites { count } => {
                let sections = split(&raw, REWRITE_MARKER_PREFIX, count);
                FeedbackResult::new(sections.feedback, sections.rewrites, request.source_revision)
            }
        })
    }
}

/// Ends a revise whose future is dropped mid-exchange (timeout, `select!`,
/// shutdown) so the workbench does not stay in `Requesting`.
struct InFlight<'a, R: RenderSurface> {
    bench: &'a SharedWorkbench<R>,
    source_revision: u64,
    armed: bool,
}

impl<'a, R: RenderSurface> InFlight<'a, R> {
    fn new(bench: &'a SharedWorkbench<R>, source_revision: u64) -> Self {
        Self {
            bench,
            source_revision,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<R: RenderSurface> Drop for InFlight<'_, R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if lock_workbench(self.bench).fail_revise().is_ok() {
            obs::emit_exchange_abandoned(self.source_revision);
        }
    }
}

/// Parse an atomic reply body into its text.
pub fn decode_atomic(body: &str) -> Result<String, FeedbackError> {
    serde_json::from_str::<AtomicReply>(body)
        .map(|reply| reply.response)
        .map_err(|e| FeedbackError::Decode(format!("atomic reply: {e}")))
}

/// Concatenate streamed fragments in arrival order.
///
/// `on_partial` sees the accumulated text after every fragment. Stops at the
/// first fragment with `done` set, or at end-of-data, without pulling more
/// frames. A malformed fragment fails the whole decode.
pub async fn decode_streamed(
    mut frames: FrameStream,
    mut on_partial: impl FnMut(u64, &str),
) -> Result<String, FeedbackError> {
    let mut text = String::new();
    let mut seq = 0u64;

    while let Some(frame) = frames.next().await {
        let frame = frame.map_err(|err| match err {
            GenerationError::Framing(msg) => FeedbackError::Decode(msg),
            other => FeedbackError::Generation(other),
        })?;

        let fragment: StreamFragment = serde_json::from_str(&frame)
            .map_err(|e| FeedbackError::Decode(format!("fragment {seq}: {e}")))?;

        if let Some(message) = fragment.error {
            return Err(GenerationError::Service(message).into());
        }

        match fragment.response {
            Some(piece) => {
                text.push_str(&piece);
                on_partial(seq, &text);
            }
            None if fragment.done => {}
            None => {
                return Err(FeedbackError::Decode(format!(
                    "fragment {seq} carries no text"
                )));
            }
        }
        seq += 1;

        if fragment.done {
            break;
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Span;
    use crate::edit_mode::EditMode;
    use crate::workbench::Workbench;
    use futures::stream;
    use generation_client::fakes::{ScriptedGenerationService, ScriptedReply};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tracing_test::traced_test;

    fn frames(lines: &[&str]) -> FrameStream {
        let items: Vec<Result<String, GenerationError>> =
            lines.iter().map(|l| Ok(l.to_string())).collect();
        stream::iter(items).boxed()
    }

    #[test]
    fn test_decode_atomic() {
        assert_eq!(decode_atomic(r#"{"response":"hi"}"#).unwrap(), "hi");
        assert!(matches!(
            decode_atomic(r#"{"text":"hi"}"#),
            Err(FeedbackError::Decode(_))
        ));
        assert!(matches!(decode_atomic("not json"), Err(FeedbackError::Decode(_))));
    }

    #[tokio::test]
    async fn test_decode_streamed_accumulates_and_reports_partials() {
        let mut seen = Vec::new();
        let text = decode_streamed(
            frames(&[
                r#"{"response":"Go","done":false}"#,
                r#"{"response":"od.","done":true}"#,
            ]),
            |_, partial| seen.push(partial.to_string()),
        )
        .await
        .unwrap();
        assert_eq!(text, "Good.");
        assert_eq!(seen, vec!["Go", "Good."]);
    }

    #[tokio::test]
    async fn test_decode_streamed_ends_at_end_of_data() {
        let text = decode_streamed(frames(&[r#"{"response":"partial"}"#]), |_, _| {})
            .await
            .unwrap();
        assert_eq!(text, "partial");
    }

    #[tokio::test]
    async fn test_decode_streamed_malformed_fragment() {
        let err = decode_streamed(
            frames(&[r#"{"response":"ok","done":false}"#, "{oops"]),
            |_, _| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FeedbackError::Decode(_)));

        let err = decode_streamed(frames(&[r#"{"done":false}"#]), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, FeedbackError::Decode(_)));
    }

    #[tokio::test]
    async fn test_decode_streamed_service_error_fragment() {
        let err = decode_streamed(frames(&[r#"{"error":"model crashed"}"#]), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FeedbackError::Generation(GenerationError::Service(_))
        ));
    }

    #[tokio::test]
    async fn test_decode_streamed_framing_error_is_decode_error() {
        let items: Vec<Result<String, GenerationError>> =
            vec![Err(GenerationError::Framing("bad utf-8".into()))];
        let err = decode_streamed(stream::iter(items).boxed(), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, FeedbackError::Decode(_)));
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(DecodeStrategy::Atomic.to_string(), "atomic");
        assert!(DecodeStrategy::Streamed.is_streamed());
    }

    fn annotation(text: &str) -> Annotation {
        Annotation {
            span: Span::new(0, text.len()),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_exchange_logs_lifecycle_events() {
        let fake = ScriptedGenerationService::new().with_reply(ScriptedReply::atomic_text("fine"));
        let orchestrator = FeedbackOrchestrator::new(fake, "llama3");

        let result = orchestrator
            .exchange(&[annotation("Some words")], ReviseMode::FeedbackOnly, 3)
            .await
            .unwrap();

        assert_eq!(result.feedback_text, "fine");
        assert_eq!(result.source_revision, 3);
        assert!(logs_contain("exchange.started"));
        assert!(logs_contain("exchange.finished"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_exchange_logs_warning() {
        let fake = ScriptedGenerationService::new()
            .with_reply(ScriptedReply::Fail(GenerationError::Transport("refused".into())));
        let orchestrator = FeedbackOrchestrator::new(fake, "llama3");

        let err = orchestrator
            .exchange(&[annotation("Some words")], ReviseMode::default(), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, FeedbackError::Generation(_)));
        assert!(logs_contain("exchange.failed"));
        assert!(logs_contain("refused"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_dropped_revise_is_abandoned_not_stuck() {
        let gate = Arc::new(Notify::new());
        let fake = ScriptedGenerationService::new()
            .with_reply(ScriptedReply::atomic_text("fine"))
            .with_hold(gate);
        let orchestrator = FeedbackOrchestrator::new(fake, "llama3");
        let mut bench = Workbench::new("Some words here.");
        bench.mark_selection(Span::new(0, 10)).unwrap();
        let bench = bench.into_shared();

        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            orchestrator.revise(&bench, ReviseMode::FeedbackOnly),
        )
        .await;

        assert!(timed_out.is_err());
        assert_eq!(lock_workbench(&bench).mode(), EditMode::Viewing);
        assert!(logs_contain("exchange.abandoned"));
    }

    #[tokio::test]
    async fn test_completed_revise_does_not_report_abandoned() {
        let fake = ScriptedGenerationService::new().with_reply(ScriptedReply::atomic_text("fine"));
        let orchestrator = FeedbackOrchestrator::new(fake, "llama3");
        let mut bench = Workbench::new("Some words here.");
        bench.mark_selection(Span::new(0, 10)).unwrap();
        let bench = bench.into_shared();

        let result = orchestrator
            .revise(&bench, ReviseMode::FeedbackOnly)
            .await
            .unwrap();

        let bench = lock_workbench(&bench);
        assert_eq!(bench.mode(), EditMode::Viewing);
        assert_eq!(bench.feedback(), &result);
    }
}

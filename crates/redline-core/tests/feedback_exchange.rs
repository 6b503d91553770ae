//! Integration tests for the guarded revise cycle against a scripted service.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use generation_client::fakes::{ScriptedGenerationService, ScriptedReply};
use generation_client::GenerationError;
use redline_core::{
    lock_workbench, DecodeStrategy, EditMode, FeedbackError, FeedbackOrchestrator, ReviseMode,
    SharedWorkbench, Span, Workbench, WorkbenchError,
};

const STORY: &str = "The cat sat. It was tired. Then it slept.";
const FULL_REPLY: &str = "FEEDBACK:\nGood.\nREWRITE 1:\nA\nREWRITE 2:\nB\nREWRITE 3:\nC";

fn bench_with_marks(spans: &[(usize, usize)]) -> SharedWorkbench {
    let mut bench = Workbench::new(STORY);
    for &(a, b) in spans {
        bench.mark_selection(Span::new(a, b)).unwrap();
    }
    bench.into_shared()
}

fn orchestrator(
    fake: &Arc<ScriptedGenerationService>,
    strategy: DecodeStrategy,
) -> FeedbackOrchestrator<Arc<ScriptedGenerationService>> {
    FeedbackOrchestrator::new(Arc::clone(fake), "llama3").with_strategy(strategy)
}

// ── Guards ──

#[tokio::test]
async fn revise_without_marks_fails_with_empty_input_and_sends_nothing() {
    let fake = Arc::new(ScriptedGenerationService::new());
    let bench = bench_with_marks(&[]);

    let err = orchestrator(&fake, DecodeStrategy::Atomic)
        .revise(&bench, ReviseMode::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::EmptyInput));
    assert_eq!(fake.request_count(), 0);
    assert_eq!(lock_workbench(&bench).mode(), EditMode::Viewing);
}

#[tokio::test]
async fn revise_while_editing_is_refused_without_request() {
    let fake = Arc::new(ScriptedGenerationService::new());
    let bench = bench_with_marks(&[(0, 12)]);
    lock_workbench(&bench).start_edit().unwrap();

    let err = orchestrator(&fake, DecodeStrategy::Atomic)
        .revise(&bench, ReviseMode::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::Guard(_)));
    assert_eq!(fake.request_count(), 0);
    assert_eq!(lock_workbench(&bench).mode(), EditMode::Editing);
}

#[tokio::test]
async fn dropped_revise_returns_workbench_to_viewing() {
    let gate = Arc::new(Notify::new());
    let fake = Arc::new(
        ScriptedGenerationService::new()
            .with_reply(ScriptedReply::atomic_text(FULL_REPLY))
            .with_hold(Arc::clone(&gate)),
    );
    let orchestrator = orchestrator(&fake, DecodeStrategy::Atomic);
    let bench = bench_with_marks(&[(0, 12)]);

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        orchestrator.revise(&bench, ReviseMode::default()),
    )
    .await;
    assert!(timed_out.is_err());
    assert_eq!(fake.request_count(), 1);

    {
        let bench = lock_workbench(&bench);
        assert_eq!(bench.mode(), EditMode::Viewing);
        assert!(bench.feedback().is_empty());
        assert_eq!(bench.document().revision(), 0);
        assert_eq!(bench.annotations().unwrap().len(), 1);
    }

    gate.notify_one();
    let result = orchestrator
        .revise(&bench, ReviseMode::default())
        .await
        .unwrap();
    assert_eq!(result.rewrites, vec!["A", "B", "C"]);
    lock_workbench(&bench).start_edit().unwrap();
}

#[tokio::test]
async fn second_revise_while_requesting_is_rejected_not_queued() {
    let gate = Arc::new(Notify::new());
    let fake = Arc::new(
        ScriptedGenerationService::new()
            .with_reply(ScriptedReply::atomic_text(FULL_REPLY))
            .with_hold(Arc::clone(&gate)),
    );
    let orchestrator = orchestrator(&fake, DecodeStrategy::Atomic);
    let bench = bench_with_marks(&[(0, 12)]);

    let first = orchestrator.revise(&bench, ReviseMode::default());
    let second = async {
        fake.request_received().await;
        assert!(lock_workbench(&bench).is_requesting());
        assert!(lock_workbench(&bench).apply_rewrite("sneaky").is_err());

        let err = orchestrator
            .revise(&bench, ReviseMode::default())
            .await
            .unwrap_err();
        gate.notify_one();
        err
    };

    let (first, second) = tokio::join!(first, second);

    assert!(matches!(second, FeedbackError::AlreadyRequesting));
    assert_eq!(first.unwrap().rewrites, vec!["A", "B", "C"]);
    assert_eq!(fake.request_count(), 1);
    assert_eq!(lock_workbench(&bench).mode(), EditMode::Viewing);
    assert_eq!(lock_workbench(&bench).document().revision(), 0);
}

// ── Atomic decode ──

#[tokio::test]
async fn atomic_reply_is_split_into_feedback_and_rewrites() {
    let fake = Arc::new(
        ScriptedGenerationService::new().with_reply(ScriptedReply::atomic_text(FULL_REPLY)),
    );
    let bench = bench_with_marks(&[(27, 41), (0, 12)]);

    let result = orchestrator(&fake, DecodeStrategy::Atomic)
        .revise(&bench, ReviseMode::default())
        .await
        .unwrap();

    assert_eq!(result.feedback_text, "Good.");
    assert_eq!(result.rewrites, vec!["A", "B", "C"]);
    assert_eq!(lock_workbench(&bench).feedback(), &result);

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "llama3");
    assert!(!requests[0].stream);
    assert!(requests[0]
        .prompt
        .contains("\"The cat sat.\nThen it slept.\""));
}

#[tokio::test]
async fn partial_markers_yield_fewer_rewrites_without_error() {
    let fake = Arc::new(ScriptedGenerationService::new().with_reply(ScriptedReply::atomic_text(
        "FEEDBACK:\nOk.\nREWRITE 1:\nfirst\nREWRITE 2:\nsecond",
    )));
    let bench = bench_with_marks(&[(0, 12)]);

    let result = orchestrator(&fake, DecodeStrategy::Atomic)
        .revise(&bench, ReviseMode::FeedbackWithRewrites { count: 3 })
        .await
        .unwrap();

    assert_eq!(result.rewrites, vec!["first", "second"]);
}

#[tokio::test]
async fn feedback_only_mode_keeps_markers_as_text() {
    let fake = Arc::new(
        ScriptedGenerationService::new().with_reply(ScriptedReply::atomic_text("  Solid.\n")),
    );
    let bench = bench_with_marks(&[(0, 12)]);

    let result = orchestrator(&fake, DecodeStrategy::Atomic)
        .revise(&bench, ReviseMode::FeedbackOnly)
        .await
        .unwrap();

    assert_eq!(result.feedback_text, "Solid.");
    assert!(result.rewrites.is_empty());
    assert!(!fake.requests()[0].prompt.contains("REWRITE 1:"));
}

#[tokio::test]
async fn malformed_atomic_reply_is_decode_error() {
    let fake = Arc::new(
        ScriptedGenerationService::new()
            .with_reply(ScriptedReply::Atomic(r#"{"unexpected":true}"#.into())),
    );
    let bench = bench_with_marks(&[(0, 12)]);

    let err = orchestrator(&fake, DecodeStrategy::Atomic)
        .revise(&bench, ReviseMode::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::Decode(_)));
    assert_eq!(lock_workbench(&bench).mode(), EditMode::Viewing);
    assert!(lock_workbench(&bench).feedback().is_empty());
}

// ── Streamed decode ──

#[tokio::test]
async fn streamed_fragments_accumulate_and_stop_at_done() {
    let fake = Arc::new(ScriptedGenerationService::new().with_reply(ScriptedReply::fragments(&[
        ("Go", false),
        ("od.", true),
        ("never read", false),
    ])));
    let orchestrator = orchestrator(&fake, DecodeStrategy::Streamed);
    let partial = orchestrator.subscribe();
    let bench = bench_with_marks(&[(0, 12)]);

    let result = orchestrator
        .revise(&bench, ReviseMode::FeedbackOnly)
        .await
        .unwrap();

    assert_eq!(result.feedback_text, "Good.");
    assert_eq!(fake.frames_pulled(), 2);
    assert_eq!(*partial.borrow(), "Good.");
    assert!(fake.requests()[0].stream);
}

#[tokio::test]
async fn streamed_reply_in_rewrites_mode_is_split_after_completion() {
    let fake = Arc::new(ScriptedGenerationService::new().with_reply(ScriptedReply::fragments(&[
        ("FEEDBACK:\nNi", false),
        ("ce.\nREWRITE 1:\nA\nREW", false),
        ("RITE 2:\nB", false),
        ("", true),
    ])));
    let bench = bench_with_marks(&[(0, 12)]);

    let result = orchestrator(&fake, DecodeStrategy::Streamed)
        .revise(&bench, ReviseMode::default())
        .await
        .unwrap();

    assert_eq!(result.feedback_text, "Nice.");
    assert_eq!(result.rewrites, vec!["A", "B"]);
}

#[tokio::test]
async fn malformed_fragment_discards_result_but_partial_stays_visible() {
    let fake = Arc::new(ScriptedGenerationService::new().with_reply(ScriptedReply::raw_frames(&[
        r#"{"response":"Go","done":false}"#,
        r#"{"response": 42}"#,
    ])));
    let orchestrator = orchestrator(&fake, DecodeStrategy::Streamed);
    let partial = orchestrator.subscribe();
    let bench = bench_with_marks(&[(0, 12)]);

    let err = orchestrator
        .revise(&bench, ReviseMode::FeedbackOnly)
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::Decode(_)));
    assert_eq!(*partial.borrow(), "Go");
    let bench = lock_workbench(&bench);
    assert!(bench.feedback().is_empty());
    assert_eq!(bench.mode(), EditMode::Viewing);
}

#[tokio::test]
async fn reply_framing_mismatch_is_decode_error() {
    let fake = Arc::new(
        ScriptedGenerationService::new().with_reply(ScriptedReply::atomic_text("whole")),
    );
    let bench = bench_with_marks(&[(0, 12)]);

    let err = orchestrator(&fake, DecodeStrategy::Streamed)
        .revise(&bench, ReviseMode::FeedbackOnly)
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::Decode(_)));
}

// ── Failure isolation ──

#[tokio::test]
async fn transport_error_leaves_document_untouched() {
    let fake = Arc::new(ScriptedGenerationService::new().with_reply(ScriptedReply::Fail(
        GenerationError::Timeout { timeout_secs: 30 },
    )));
    let bench = bench_with_marks(&[(0, 12)]);

    let err = orchestrator(&fake, DecodeStrategy::Atomic)
        .revise(&bench, ReviseMode::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::Generation(_)));
    assert_eq!(err.user_message(), "Error getting feedback.");

    let bench = lock_workbench(&bench);
    assert_eq!(bench.document().text(), STORY);
    assert_eq!(bench.document().revision(), 0);
    assert_eq!(bench.mode(), EditMode::Viewing);
    // Marks survive a failed exchange, so the author can retry.
    assert_eq!(bench.annotations().unwrap().len(), 1);
}

#[tokio::test]
async fn mid_stream_transport_error_is_generation_error() {
    let fake = Arc::new(ScriptedGenerationService::new().with_reply(ScriptedReply::Frames(vec![
        Ok(r#"{"response":"Go"}"#.to_string()),
        Err(GenerationError::Transport("connection reset".into())),
    ])));
    let bench = bench_with_marks(&[(0, 12)]);

    let err = orchestrator(&fake, DecodeStrategy::Streamed)
        .revise(&bench, ReviseMode::FeedbackOnly)
        .await
        .unwrap_err();

    assert!(matches!(err, FeedbackError::Generation(GenerationError::Transport(_))));
    assert_eq!(lock_workbench(&bench).mode(), EditMode::Viewing);
}

// ── Apply ──

#[tokio::test]
async fn apply_then_clear() {
    let fake = Arc::new(ScriptedGenerationService::new().with_reply(ScriptedReply::atomic_text(
        "FEEDBACK:\nShorter.\nREWRITE 1:\nNew text\nREWRITE 2:\nOther text",
    )));
    let bench = bench_with_marks(&[(0, 12)]);

    orchestrator(&fake, DecodeStrategy::Atomic)
        .revise(&bench, ReviseMode::default())
        .await
        .unwrap();

    let mut bench = lock_workbench(&bench);
    assert_eq!(bench.apply_rewrite("New text").unwrap(), 1);
    assert_eq!(bench.document().text(), "New text");
    assert_eq!(bench.document().revision(), 1);
    assert!(bench.feedback().feedback_text.is_empty());
    assert!(bench.feedback().rewrites.is_empty());
    assert!(matches!(bench.apply_rewrite_index(1), Err(WorkbenchError::NoResult)));
}

#[tokio::test]
async fn exchange_rejects_empty_annotations_directly() {
    let fake = Arc::new(ScriptedGenerationService::new());
    let err = orchestrator(&fake, DecodeStrategy::Atomic)
        .exchange(&[], ReviseMode::default(), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedbackError::EmptyInput));
    assert_eq!(fake.request_count(), 0);
}

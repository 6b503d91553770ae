//! Redline Core Library
//!
//! Mark spans of prose, send exactly those spans to a text-generation
//! service, and fold the critique and rewrite candidates back into the
//! document.
//!
//! - [`annotation`]: extracting ordered marked spans from a surface
//! - [`edit_mode`]: the Viewing / Editing / Requesting state machine
//! - [`workbench`]: document, surface, machine and current result together
//! - [`orchestrator`]: the request/response exchange, atomic or streamed
//! - [`sections`]: splitting a reply into feedback and rewrites

pub mod annotation;
pub mod document;
pub mod edit_mode;
pub mod error;
pub mod feedback;
pub mod obs;
pub mod orchestrator;
pub mod prompt;
pub mod sections;
pub mod telemetry;
pub mod workbench;

pub use annotation::{
    extract, join_annotations, parse_markup, Annotation, MarkedSurface, RenderSurface, Span,
    DEFAULT_CLOSE_TAG, DEFAULT_OPEN_TAG,
};
pub use document::Document;
pub use edit_mode::{EditMode, EditModeMachine, EditSession};
pub use error::{AnnotationError, FeedbackError, GuardError, Result, WorkbenchError};
pub use feedback::FeedbackResult;
pub use orchestrator::{decode_atomic, decode_streamed, DecodeStrategy, FeedbackOrchestrator};
pub use prompt::{render_prompt, FeedbackRequest, ReviseMode, DEFAULT_REWRITE_COUNT};
pub use sections::{split, Sections, FEEDBACK_MARKER, REWRITE_MARKER_PREFIX};
pub use workbench::{lock_workbench, PendingRevise, SharedWorkbench, Workbench, PLACEHOLDER_TEXT};

pub use generation_client::{
    GenerationConfig, GenerationError, GenerationReply, GenerationService, HttpGenerationClient,
};

pub use obs::{
    emit_document_committed, emit_exchange_abandoned, emit_exchange_failed,
    emit_exchange_finished, emit_exchange_started, emit_fragment_received, emit_guard_refused,
    exchange_span,
};
pub use telemetry::init_tracing;

/// Redline version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

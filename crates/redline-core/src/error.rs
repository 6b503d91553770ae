//! Error taxonomy for Redline.
//!
//! Every error here ends an operation without touching the document; none of
//! them is fatal to the process.

use generation_client::GenerationError;

use crate::annotation::Span;
use crate::edit_mode::EditMode;

/// Errors produced while marking spans on a surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotationError {
    #[error("selection {requested} overlaps existing annotation {existing}")]
    Overlap { requested: Span, existing: Span },

    #[error("selection {span} is outside the text or splits a character (text length {len})")]
    OutOfBounds { span: Span, len: usize },

    #[error("invalid annotation markup: {0}")]
    Markup(String),
}

/// Refusals from the edit-mode state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("no annotations to send")]
    NoAnnotations,

    #[error("a feedback request is already in flight")]
    AlreadyRequesting,

    #[error("operation requires viewing mode (currently {mode})")]
    NotViewing { mode: EditMode },

    #[error("operation requires editing mode (currently {mode})")]
    NotEditing { mode: EditMode },

    #[error("operation requires a request in flight (currently {mode})")]
    NotRequesting { mode: EditMode },

    #[error("document cannot be committed while a request is in flight")]
    CommitWhileRequesting,
}

/// Errors from workbench operations other than the feedback exchange.
#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error("no feedback result to apply")]
    NoResult,

    #[error("rewrite {index} does not exist ({available} available)")]
    CandidateOutOfRange { index: usize, available: usize },

    #[error("feedback was produced for revision {result_revision} but the document is at revision {document_revision}")]
    StaleResult {
        result_revision: u64,
        document_revision: u64,
    },
}

/// Errors from one feedback exchange.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("no annotated text to send")]
    EmptyInput,

    #[error("a feedback request is already in flight")]
    AlreadyRequesting,

    #[error("request refused: {0}")]
    Guard(GuardError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("malformed generation reply: {0}")]
    Decode(String),
}

impl From<GuardError> for FeedbackError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::NoAnnotations => FeedbackError::EmptyInput,
            GuardError::AlreadyRequesting => FeedbackError::AlreadyRequesting,
            other => FeedbackError::Guard(other),
        }
    }
}

impl FeedbackError {
    /// Author-facing text for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            FeedbackError::EmptyInput => "Please mark text before requesting feedback.",
            FeedbackError::AlreadyRequesting => "Feedback is already on its way.",
            FeedbackError::Guard(_) => "Finish editing before requesting feedback.",
            FeedbackError::Generation(_) | FeedbackError::Decode(_) => "Error getting feedback.",
        }
    }
}

/// Result type for workbench operations.
pub type Result<T> = std::result::Result<T, WorkbenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_annotations_aliases_empty_input() {
        let err: FeedbackError = GuardError::NoAnnotations.into();
        assert!(matches!(err, FeedbackError::EmptyInput));

        let err: FeedbackError = GuardError::AlreadyRequesting.into();
        assert!(matches!(err, FeedbackError::AlreadyRequesting));

        let err: FeedbackError = GuardError::NotViewing {
            mode: EditMode::Editing,
        }
        .into();
        assert!(matches!(err, FeedbackError::Guard(_)));
    }

    #[test]
    fn test_user_messages() {
        assert!(FeedbackError::EmptyInput.user_message().contains("mark text"));
        assert_eq!(
            FeedbackError::Decode("bad".into()).user_message(),
            "Error getting feedback."
        );
        assert_eq!(
            FeedbackError::Generation(GenerationError::Timeout { timeout_secs: 1 }).user_message(),
            "Error getting feedback."
        );
    }

    #[test]
    fn test_stale_result_display() {
        let err = WorkbenchError::StaleResult {
            result_revision: 2,
            document_revision: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("revision 2"));
        assert!(msg.contains("revision 3"));
    }
}

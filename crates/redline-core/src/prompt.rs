//! Feedback requests and the instructional prompt sent with them.

use serde::{Deserialize, Serialize};

use crate::annotation::{join_annotations, Annotation};
use crate::error::FeedbackError;
use crate::orchestrator::DecodeStrategy;
use crate::sections::{FEEDBACK_MARKER, REWRITE_MARKER_PREFIX};

/// Rewrite candidates asked for unless configured otherwise.
pub const DEFAULT_REWRITE_COUNT: usize = 3;

/// What the author asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReviseMode {
    /// Critique only, no rewrites
    FeedbackOnly,
    /// Critique followed by `count` rewrite candidates
    FeedbackWithRewrites { count: usize },
}

impl Default for ReviseMode {
    fn default() -> Self {
        ReviseMode::FeedbackWithRewrites {
            count: DEFAULT_REWRITE_COUNT,
        }
    }
}

impl ReviseMode {
    /// Feedback with `count` rewrites; asking for none means feedback only.
    pub fn with_rewrites(count: usize) -> Self {
        if count == 0 {
            ReviseMode::FeedbackOnly
        } else {
            ReviseMode::FeedbackWithRewrites { count }
        }
    }

    pub fn expected_rewrites(&self) -> usize {
        match self {
            ReviseMode::FeedbackOnly => 0,
            ReviseMode::FeedbackWithRewrites { count } => *count,
        }
    }

    /// One feedback section plus one per rewrite.
    pub fn expected_sections(&self) -> usize {
        1 + self.expected_rewrites()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReviseMode::FeedbackOnly => "feedback_only",
            ReviseMode::FeedbackWithRewrites { .. } => "feedback_with_rewrites",
        }
    }
}

/// One revise action, built from extracted annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// Annotation texts, newline-joined and trimmed
    pub source_text: String,
    pub mode: ReviseMode,
    pub decode: DecodeStrategy,
    pub expected_sections: usize,
    /// Document revision the annotations came from
    pub source_revision: u64,
}

impl FeedbackRequest {
    /// Fails with `EmptyInput` when there is no annotated text.
    pub fn new(
        annotations: &[Annotation],
        mode: ReviseMode,
        decode: DecodeStrategy,
        source_revision: u64,
    ) -> Result<Self, FeedbackError> {
        let source_text = join_annotations(annotations);
        if source_text.is_empty() {
            return Err(FeedbackError::EmptyInput);
        }
        Ok(Self {
            source_text,
            mode,
            decode,
            expected_sections: mode.expected_sections(),
            source_revision,
        })
    }

    pub fn prompt(&self) -> String {
        render_prompt(&self.source_text, self.mode)
    }
}

/// Render the writing-coach prompt for `source_text`.
pub fn render_prompt(source_text: &str, mode: ReviseMode) -> String {
    let mut prompt = format!(
        "You are a writing coach.\n\nFor the following text:\n\"{source_text}\"\n\n\
         1. Give brief feedback on grammar and clarity.\n\
         2. Suggest what could be added or improved.\n"
    );

    match mode {
        ReviseMode::FeedbackOnly => {
            prompt.push_str(
                "\nDo not rewrite the text. Reply with the feedback only, as plain prose.\n",
            );
        }
        ReviseMode::FeedbackWithRewrites { count } => {
            prompt.push_str(&format!(
                "3. Provide EXACTLY {count} rewritten versions of the text.\n\n\
                 Format your response exactly like this:\n\n{FEEDBACK_MARKER}\n- ...\n"
            ));
            for n in 1..=count {
                prompt.push_str(&format!("\n{REWRITE_MARKER_PREFIX} {n}:\n...\n"));
            }
        }
    }
    prompt
}

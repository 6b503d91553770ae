//! The outcome of one feedback exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feedback text plus zero or more rewrite candidates.
///
/// Immutable once returned by the orchestrator; the workbench keeps the
/// current one until it is applied or replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub feedback_text: String,
    pub rewrites: Vec<String>,
    /// Document revision the annotations were extracted from
    pub source_revision: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FeedbackResult {
    pub fn new(
        feedback_text: impl Into<String>,
        rewrites: Vec<String>,
        source_revision: u64,
    ) -> Self {
        Self {
            feedback_text: feedback_text.into(),
            rewrites,
            source_revision,
            completed_at: Some(Utc::now()),
        }
    }

    /// Nothing to show and nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.feedback_text.is_empty() && self.rewrites.is_empty()
    }

    pub fn rewrite(&self, index: usize) -> Option<&str> {
        self.rewrites.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let result = FeedbackResult::default();
        assert!(result.is_empty());
        assert!(result.completed_at.is_none());
    }

    #[test]
    fn test_new_stamps_completion() {
        let result = FeedbackResult::new("Good.", vec!["A".into()], 4);
        assert!(!result.is_empty());
        assert!(result.completed_at.is_some());
        assert_eq!(result.rewrite(0), Some("A"));
        assert_eq!(result.rewrite(1), None);
    }
}

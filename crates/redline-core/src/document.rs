//! The canonical document.

use serde::{Deserialize, Serialize};

/// The single canonical text and its revision counter.
///
/// Only the workbench can commit, and only when the edit-mode machine allows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    text: String,
    revision: u64,
}

impl Document {
    /// Create a document at revision 0.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            revision: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the text and bump the revision by exactly one.
    pub(crate) fn commit(&mut self, text: String) -> u64 {
        self.text = text;
        self.revision += 1;
        self.revision
    }
}

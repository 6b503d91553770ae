//! Edit-mode state machine.
//!
//! ```text
//!            startEdit             revise (>= 1 annotation)
//!  Editing <----------- Viewing -------------------------> Requesting
//!     |   save / cancel   ^  ^      completed | failed         |
//!     +-------------------+  +-----------------------------------+
//! ```
//!
//! The machine only tracks mode and the draft; committing text is the
//! workbench's job, after consulting the guards here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GuardError;

/// Interaction mode of the workbench.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    Viewing,
    Editing,
    Requesting,
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditMode::Viewing => "viewing",
            EditMode::Editing => "editing",
            EditMode::Requesting => "requesting",
        };
        f.write_str(s)
    }
}

/// The draft being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSession {
    pub draft_text: String,
    pub active: bool,
}

/// Transition table for [`EditMode`].
#[derive(Debug, Clone, Default)]
pub struct EditModeMachine {
    mode: EditMode,
    session: Option<EditSession>,
}

impl EditModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// The active edit session, if any.
    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    /// Annotations exist and can be extracted only while viewing.
    pub fn can_extract(&self) -> bool {
        self.mode == EditMode::Viewing
    }

    /// Commits are forbidden while a request is in flight.
    pub fn can_commit(&self) -> bool {
        self.mode != EditMode::Requesting
    }

    pub fn can_revise(&self) -> bool {
        self.mode == EditMode::Viewing
    }

    pub fn ensure_can_extract(&self) -> Result<(), GuardError> {
        if self.can_extract() {
            Ok(())
        } else {
            Err(GuardError::NotViewing { mode: self.mode })
        }
    }

    pub fn ensure_can_commit(&self) -> Result<(), GuardError> {
        if self.can_commit() {
            Ok(())
        } else {
            Err(GuardError::CommitWhileRequesting)
        }
    }

    /// `AlreadyRequesting` takes precedence over any other refusal.
    pub fn ensure_can_revise(&self) -> Result<(), GuardError> {
        match self.mode {
            EditMode::Viewing => Ok(()),
            EditMode::Requesting => Err(GuardError::AlreadyRequesting),
            EditMode::Editing => Err(GuardError::NotViewing { mode: self.mode }),
        }
    }

    /// `Viewing -> Editing`, snapshotting `document_text` as the draft.
    pub fn start_edit(&mut self, document_text: &str) -> Result<&EditSession, GuardError> {
        if self.mode != EditMode::Viewing {
            return Err(GuardError::NotViewing { mode: self.mode });
        }
        self.mode = EditMode::Editing;
        Ok(self.session.insert(EditSession {
            draft_text: document_text.to_string(),
            active: true,
        }))
    }

    pub fn draft_mut(&mut self) -> Result<&mut String, GuardError> {
        match (self.mode, self.session.as_mut()) {
            (EditMode::Editing, Some(session)) => Ok(&mut session.draft_text),
            (mode, _) => Err(GuardError::NotEditing { mode }),
        }
    }

    /// `Editing -> Viewing`, handing back the finished session for commit.
    pub fn save(&mut self) -> Result<EditSession, GuardError> {
        let mut session = self.leave_edit()?;
        session.active = false;
        Ok(session)
    }

    /// `Editing -> Viewing`, dropping the draft.
    pub fn cancel(&mut self) -> Result<(), GuardError> {
        self.leave_edit().map(drop)
    }

    fn leave_edit(&mut self) -> Result<EditSession, GuardError> {
        if self.mode != EditMode::Editing {
            return Err(GuardError::NotEditing { mode: self.mode });
        }
        let session = self
            .session
            .take()
            .ok_or(GuardError::NotEditing { mode: self.mode })?;
        self.mode = EditMode::Viewing;
        Ok(session)
    }

    /// `Viewing -> Requesting`, given how many annotations were extracted.
    pub fn begin_request(&mut self, annotation_count: usize) -> Result<(), GuardError> {
        self.ensure_can_revise()?;
        if annotation_count == 0 {
            return Err(GuardError::NoAnnotations);
        }
        self.mode = EditMode::Requesting;
        Ok(())
    }

    /// `Requesting -> Viewing`, on success and failure alike.
    pub fn finish_request(&mut self) -> Result<(), GuardError> {
        if self.mode != EditMode::Requesting {
            return Err(GuardError::NotRequesting { mode: self.mode });
        }
        self.mode = EditMode::Viewing;
        Ok(())
    }
}

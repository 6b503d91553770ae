//! The authoring workbench.
//!
//! Owns the canonical [`Document`], the rendered surface with its marks, the
//! [`EditModeMachine`] and the current [`FeedbackResult`]. Every mutation
//! goes through the machine's guards; the document is committed from
//! exactly two places: `save` and `apply_rewrite`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::annotation::{extract, Annotation, MarkedSurface, RenderSurface, Span};
use crate::document::Document;
use crate::edit_mode::{EditMode, EditModeMachine};
use crate::error::{GuardError, Result, WorkbenchError};
use crate::feedback::FeedbackResult;
use crate::obs;

/// Text shown before the author has written anything.
pub const PLACEHOLDER_TEXT: &str = "Add your story here. Underline any part you want feedback on.";

/// A workbench shared between the author-facing side and an in-flight exchange.
///
/// Never hold the lock across an `.await`.
pub type SharedWorkbench<S = MarkedSurface> = Arc<Mutex<Workbench<S>>>;

/// Lock a shared workbench, recovering from a poisoned lock.
pub fn lock_workbench<S>(bench: &SharedWorkbench<S>) -> MutexGuard<'_, Workbench<S>> {
    bench.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot handed to the orchestrator when a revise begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRevise {
    pub annotations: Vec<Annotation>,
    pub source_revision: u64,
}

#[derive(Debug)]
pub struct Workbench<S = MarkedSurface> {
    document: Document,
    surface: S,
    machine: EditModeMachine,
    feedback: FeedbackResult,
}

impl Default for Workbench<MarkedSurface> {
    fn default() -> Self {
        Self::new(PLACEHOLDER_TEXT)
    }
}

impl Workbench<MarkedSurface> {
    pub fn new(text: impl Into<String>) -> Self {
        let document = Document::new(text);
        let surface = MarkedSurface::new(document.text());
        Self::with_surface(document, surface)
    }
}

impl<S: RenderSurface> Workbench<S> {
    /// Build from an existing document and surface. The surface is expected to
    /// render `document`; its marks are kept.
    pub fn with_surface(document: Document, surface: S) -> Self {
        Self {
            document,
            surface,
            machine: EditModeMachine::new(),
            feedback: FeedbackResult::default(),
        }
    }

    pub fn into_shared(self) -> SharedWorkbench<S> {
        Arc::new(Mutex::new(self))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn mode(&self) -> EditMode {
        self.machine.mode()
    }

    /// The loading flag: a feedback request is in flight.
    pub fn is_requesting(&self) -> bool {
        self.machine.mode() == EditMode::Requesting
    }

    pub fn feedback(&self) -> &FeedbackResult {
        &self.feedback
    }

    /// Draft text while editing.
    pub fn draft(&self) -> Option<&str> {
        self.machine.session().map(|s| s.draft_text.as_str())
    }

    /// Mark a span of the rendered text. Only valid while viewing.
    pub fn mark_selection(&mut self, selection: Span) -> Result<()> {
        self.guard("mark_selection", |m| m.ensure_can_extract())?;
        self.surface.wrap_selection(selection)?;
        Ok(())
    }

    /// Current annotations in document order. Only valid while viewing.
    pub fn annotations(&self) -> Result<Vec<Annotation>> {
        self.machine.ensure_can_extract()?;
        Ok(extract(&self.surface))
    }

    /// `Viewing -> Editing`. The surface shows the plain document text.
    pub fn start_edit(&mut self) -> Result<()> {
        let text = self.document.text().to_string();
        self.guard("start_edit", |m| m.start_edit(&text).map(|_| ()))?;
        self.surface.replace_content(&text);
        Ok(())
    }

    /// Replace the draft while editing.
    pub fn update_draft(&mut self, text: impl Into<String>) -> Result<()> {
        match self.machine.draft_mut() {
            Ok(draft) => {
                *draft = text.into();
                Ok(())
            }
            Err(err) => {
                obs::emit_guard_refused("update_draft", &err);
                Err(err.into())
            }
        }
    }

    /// `Editing -> Viewing`, committing the draft. Returns the new revision.
    pub fn save(&mut self) -> Result<u64> {
        self.guard("save", |m| m.ensure_can_commit())?;
        let session = self.guard("save", |m| m.save())?;
        let revision = self.document.commit(session.draft_text);
        self.surface.replace_content(self.document.text());
        obs::emit_document_committed(revision, self.document.text().len(), "save");
        Ok(revision)
    }

    /// `Editing -> Viewing`, discarding the draft.
    pub fn cancel(&mut self) -> Result<()> {
        self.guard("cancel", |m| m.cancel())?;
        self.surface.replace_content(self.document.text());
        Ok(())
    }

    /// `Viewing -> Requesting`. Refused with `AlreadyRequesting` during an
    /// exchange and with `NoAnnotations` when nothing is marked.
    ///
    /// The previous result is cleared.
    pub fn begin_revise(&mut self) -> std::result::Result<PendingRevise, GuardError> {
        if let Err(err) = self.machine.ensure_can_revise() {
            obs::emit_guard_refused("revise", &err);
            return Err(err);
        }
        let annotations = extract(&self.surface);
        if let Err(err) = self.machine.begin_request(annotations.len()) {
            obs::emit_guard_refused("revise", &err);
            return Err(err);
        }
        self.feedback = FeedbackResult::default();
        Ok(PendingRevise {
            annotations,
            source_revision: self.document.revision(),
        })
    }

    /// `Requesting -> Viewing` with a result.
    pub fn complete_revise(
        &mut self,
        result: FeedbackResult,
    ) -> std::result::Result<(), GuardError> {
        self.machine.finish_request()?;
        self.feedback = result;
        Ok(())
    }

    /// `Requesting -> Viewing` after a failure. The document is untouched.
    pub fn fail_revise(&mut self) -> std::result::Result<(), GuardError> {
        self.machine.finish_request()
    }

    /// Commit `candidate` as the new document text and clear the result.
    ///
    /// Refused unless viewing, and refused when the current result was
    /// produced from an older revision than the document.
    pub fn apply_rewrite(&mut self, candidate: &str) -> Result<u64> {
        self.guard("apply_rewrite", |m| m.ensure_can_commit())?;
        self.guard("apply_rewrite", |m| m.ensure_can_extract())?;

        if !self.feedback.is_empty() && self.feedback.source_revision != self.document.revision() {
            return Err(WorkbenchError::StaleResult {
                result_revision: self.feedback.source_revision,
                document_revision: self.document.revision(),
            });
        }

        let revision = self.document.commit(candidate.to_string());
        self.surface.replace_content(self.document.text());
        self.feedback = FeedbackResult::default();
        obs::emit_document_committed(revision, self.document.text().len(), "apply_rewrite");
        Ok(revision)
    }

    /// Apply the rewrite at `index` of the current result.
    pub fn apply_rewrite_index(&mut self, index: usize) -> Result<u64> {
        if self.feedback.rewrites.is_empty() {
            return Err(WorkbenchError::NoResult);
        }
        let candidate = self
            .feedback
            .rewrite(index)
            .ok_or(WorkbenchError::CandidateOutOfRange {
                index,
                available: self.feedback.rewrites.len(),
            })?
            .to_string();
        self.apply_rewrite(&candidate)
    }

    fn guard<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut EditModeMachine) -> std::result::Result<T, GuardError>,
    ) -> std::result::Result<T, GuardError> {
        f(&mut self.machine).inspect_err(|err| obs::emit_guard_refused(operation, err))
    }
}

//! Annotations: marked spans of document text slated for feedback.
//!
//! The rendering collaborator is abstracted as [`RenderSurface`]. The core
//! only relies on "text plus a list of marked ranges"; [`MarkedSurface`] is
//! the in-memory interval-list realization used by the workbench and CLI.
//!
//! Marking policy: overlapping marks are refused. A selection that overlaps,
//! contains or is contained by an existing mark fails with
//! [`AnnotationError::Overlap`]. Zero-length selections are accepted and
//! silently ignored at extraction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AnnotationError;

/// Tag that opens a marked span in markup input.
pub const DEFAULT_OPEN_TAG: &str = "<u>";

/// Tag that closes a marked span in markup input.
pub const DEFAULT_CLOSE_TAG: &str = "</u>";

/// Half-open byte range `[start, end)` into the surface text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Build a span from two selection ends in either order.
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether two non-empty spans share at least one byte.
    pub fn overlaps(&self, other: &Span) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A marked span together with the text it covered at extraction time.
///
/// Annotations are snapshots: later edits to the surface do not change them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub span: Span,
    pub text: String,
}

/// The rendering and input collaborator.
pub trait RenderSurface {
    /// Currently rendered text.
    fn text(&self) -> &str;

    /// Marked ranges, in whatever order the surface keeps them.
    fn marks(&self) -> &[Span];

    /// Mark the current selection.
    fn wrap_selection(&mut self, selection: Span) -> Result<(), AnnotationError>;

    /// Replace the whole content with plain text, dropping all marks.
    fn replace_content(&mut self, text: &str);
}

/// In-memory surface: text plus marks in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkedSurface {
    text: String,
    marks: Vec<Span>,
}

impl MarkedSurface {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    /// Adopt marks reported by another surface without re-validating them.
    pub fn with_marks(text: impl Into<String>, marks: Vec<Span>) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    /// Parse `<u>…</u>` markup into plain text and marks.
    pub fn from_markup(markup: &str) -> Result<Self, AnnotationError> {
        let (text, marks) = parse_markup(markup, DEFAULT_OPEN_TAG, DEFAULT_CLOSE_TAG)?;
        Ok(Self { text, marks })
    }
}

impl RenderSurface for MarkedSurface {
    fn text(&self) -> &str {
        &self.text
    }

    fn marks(&self) -> &[Span] {
        &self.marks
    }

    fn wrap_selection(&mut self, selection: Span) -> Result<(), AnnotationError> {
        if selection.end > self.text.len()
            || !self.text.is_char_boundary(selection.start)
            || !self.text.is_char_boundary(selection.end)
        {
            return Err(AnnotationError::OutOfBounds {
                span: selection,
                len: self.text.len(),
            });
        }

        if let Some(existing) = self.marks.iter().find(|m| m.overlaps(&selection)) {
            return Err(AnnotationError::Overlap {
                requested: selection,
                existing: *existing,
            });
        }

        self.marks.push(selection);
        Ok(())
    }

    fn replace_content(&mut self, text: &str) {
        self.text = text.to_string();
        self.marks.clear();
    }
}

/// Split markup into plain text and the byte ranges enclosed by the tags.
///
/// Nested, unopened and unclosed tags are errors.
pub fn parse_markup(
    markup: &str,
    open_tag: &str,
    close_tag: &str,
) -> Result<(String, Vec<Span>), AnnotationError> {
    if open_tag.is_empty() || close_tag.is_empty() || open_tag == close_tag {
        return Err(AnnotationError::Markup(
            "open and close tags must be distinct and non-empty".to_string(),
        ));
    }

    let mut text = String::with_capacity(markup.len());
    let mut marks = Vec::new();
    let mut open_at: Option<usize> = None;
    let mut rest = markup;

    loop {
        let next_open = rest.find(open_tag);
        let next_close = rest.find(close_tag);

        let opens_first = match (next_open, next_close) {
            (None, None) => {
                text.push_str(rest);
                break;
            }
            (Some(o), Some(c)) => o < c,
            (Some(_), None) => true,
            (None, Some(_)) => false,
        };

        if opens_first {
            let at = next_open.unwrap_or_default();
            text.push_str(&rest[..at]);
            if open_at.is_some() {
                return Err(AnnotationError::Markup(format!(
                    "nested {open_tag} at byte {}",
                    text.len()
                )));
            }
            open_at = Some(text.len());
            rest = &rest[at + open_tag.len()..];
        } else {
            let at = next_close.unwrap_or_default();
            text.push_str(&rest[..at]);
            let start = open_at.take().ok_or_else(|| {
                AnnotationError::Markup(format!(
                    "{close_tag} without {open_tag} at byte {}",
                    text.len()
                ))
            })?;
            marks.push(Span::new(start, text.len()));
            rest = &rest[at + close_tag.len()..];
        }
    }

    if let Some(start) = open_at {
        return Err(AnnotationError::Markup(format!(
            "unclosed {open_tag} opened at byte {start}"
        )));
    }

    Ok((text, marks))
}

/// Read the marked spans of a surface in document order.
///
/// Pure: the surface is only read. Zero-length marks, marks that do not
/// address valid text, and marks overlapping an earlier kept mark are dropped.
pub fn extract<S: RenderSurface + ?Sized>(surface: &S) -> Vec<Annotation> {
    let text = surface.text();
    let mut spans: Vec<Span> = surface.marks().iter().copied().filter(|s| !s.is_empty()).collect();
    spans.sort();

    let mut annotations: Vec<Annotation> = Vec::with_capacity(spans.len());
    for span in spans {
        if annotations.last().is_some_and(|prev| prev.span.overlaps(&span)) {
            continue;
        }
        if let Some(slice) = text.get(span.start..span.end) {
            annotations.push(Annotation {
                span,
                text: slice.to_string(),
            });
        }
    }
    annotations
}

/// Newline-joined, trimmed annotation text: the body sent for feedback.
pub fn join_annotations(annotations: &[Annotation]) -> String {
    annotations
        .iter()
        .map(|a| a.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

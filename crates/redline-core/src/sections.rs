//! Response-section parser.
//!
//! A rewrites-mode reply looks like
//!
//! ```text
//! FEEDBACK:
//! - ...
//!
//! REWRITE 1:
//! ...
//!
//! REWRITE 2:
//! ...
//! ```
//!
//! Text before the first rewrite marker is the feedback; each following
//! segment is one candidate.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Literal that introduces the feedback section.
pub const FEEDBACK_MARKER: &str = "FEEDBACK:";

/// Word that starts each rewrite marker (`REWRITE <n>:`).
pub const REWRITE_MARKER_PREFIX: &str = "REWRITE";

/// Feedback and rewrite candidates split out of a raw reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sections {
    pub feedback: String,
    pub rewrites: Vec<String>,
}

fn default_marker() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| marker_regex(REWRITE_MARKER_PREFIX).ok())
        .as_ref()
}

fn marker_regex(prefix: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"{} \d+:", regex::escape(prefix)))
}

/// Split `raw` on `<marker_prefix> <n>:` markers.
///
/// Missing markers are not an error: fewer than `expected_count` candidates
/// are returned as found, and a reply with no markers is all feedback.
/// Candidates beyond `expected_count` are dropped.
pub fn split(raw: &str, marker_prefix: &str, expected_count: usize) -> Sections {
    let custom;
    let marker = if marker_prefix == REWRITE_MARKER_PREFIX {
        default_marker()
    } else {
        custom = marker_regex(marker_prefix).ok();
        custom.as_ref()
    };

    let Some(marker) = marker else {
        debug!(prefix = marker_prefix, "unusable rewrite marker, treating reply as feedback");
        return Sections {
            feedback: strip_feedback_marker(raw),
            rewrites: Vec::new(),
        };
    };

    let mut parts = marker.split(raw);
    let feedback = strip_feedback_marker(parts.next().unwrap_or_default());
    let mut rewrites: Vec<String> = parts.map(|p| p.trim().to_string()).collect();

    if rewrites.len() > expected_count {
        debug!(
            found = rewrites.len(),
            expected = expected_count,
            "dropping surplus rewrite candidates"
        );
        rewrites.truncate(expected_count);
    }

    Sections { feedback, rewrites }
}

fn strip_feedback_marker(section: &str) -> String {
    section.replacen(FEEDBACK_MARKER, "", 1).trim().to_string()
}

//! Content classification
//!
//! Pure functions that inspect one page's extracted elements and decide, per
//! link: candidate artifact, page worth queueing, or noise. The heuristics
//! are priority-ordered and first-match-wins:
//!
//! 1. Direct artifact match (extension or explicit download tag)
//! 2. Attachment-holder match (file-store paths, content-type markers)
//! 3. Structural pattern-group match (sibling series scoring)
//! 4. Lexical keyword match
//! 5. Default: queue in-scope pages as exploratory
//!
//! Template/placeholder targets are rejected before any rule runs.

pub mod elements;
pub mod patterns;
pub mod rules;
pub mod title;

pub use elements::{ElementSet, EmbedRef, PageLink};
pub use rules::{scan, QueueRequest, ScanOutcome, Sighting};

/// The artifact file extension this crawler hunts for
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// Keywords whose presence marks a link as likely pointing at course material
const ARTIFACT_KEYWORDS: &[&str] = &[
    "lecture",
    "slides",
    "slide deck",
    "notes",
    "handout",
    "syllabus",
    "worksheet",
    "problem set",
    "pset",
    "exercise",
    "exercises",
    "reading",
    "readings",
    "chapter",
    "assignment",
    "homework",
    "hw",
    "lab",
    "tutorial",
    "exam",
    "midterm",
    "quiz",
    "solutions",
    "skript",
    "folien",
    "apuntes",
    "poly",
];

/// Checks text for artifact-indicating keywords
///
/// Single-word keywords match on word boundaries (so `hw` does not fire
/// inside `show`); multi-word phrases match as substrings.
pub(crate) fn has_artifact_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for keyword in ARTIFACT_KEYWORDS {
        if keyword.contains(' ') {
            if lower.contains(keyword) {
                return true;
            }
        } else if words.iter().any(|w| w == keyword) {
            return true;
        }
    }
    false
}

//! Canonical artifact records
//!
//! An artifact is one discovered document. Overlapping sightings from many
//! pages collapse onto one record per canonical key; the merge rules live in
//! [`dedup`].

pub mod dedup;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Provenance tag: how the classifier decided this was an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// The link pointed at the document itself
    Direct,
    /// Found by fetching an indirect reference
    ResolvedIndirect,
    /// Referenced by an iframe/embed/object element
    Embedded,
    /// A known attachment holder (file store entry)
    Attachment,
    /// Member of a structural sibling group
    PatternDetected,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Direct => "direct",
            SourceType::ResolvedIndirect => "resolved-indirect",
            SourceType::Embedded => "embedded",
            SourceType::Attachment => "attachment",
            SourceType::PatternDetected => "pattern-detected",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One canonical discovered document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Merge key: `file:<id>` when the source exposes a stable file id,
    /// otherwise the normalized location
    pub canonical_key: String,
    /// Resolved, fetchable address
    pub location: String,
    /// Best-known human-readable name
    pub title: String,
    pub source: SourceType,
    /// Classifier-assigned score, used for tie-breaking during merge
    pub confidence: f32,
    /// The page this artifact was discovered on
    pub discovered_on: String,
    pub first_seen: DateTime<Utc>,
}

/// Derives the merge key for a sighting
///
/// A stable numeric file id beats the location: the same file is frequently
/// reachable under several addresses (`/files/42`, `/files/42/download`,
/// `/courses/101/files/42`) that all share the id.
pub fn canonical_key_for(file_id: Option<u64>, location: &str) -> String {
    match file_id {
        Some(id) => format!("file:{}", id),
        None => location.to_string(),
    }
}

/// Extracts a stable file id from a file-store path
///
/// Matches a numeric segment immediately following a `files` segment, e.g.
/// `/courses/101/files/42` or `/files/42/download`.
pub fn file_id_from(url: &Url) -> Option<u64> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    segments
        .windows(2)
        .find(|w| w[0] == "files")
        .and_then(|w| w[1].parse().ok())
}

/// Converts a file-store reference into its explicit download address
///
/// `/files/42` becomes `/files/42/download`; addresses already in download
/// form are returned unchanged.
pub fn download_address(url: &Url) -> Url {
    let is_download = url
        .path_segments()
        .and_then(|s| s.filter(|seg| !seg.is_empty()).last())
        .map(|last| last == "download")
        .unwrap_or(false);
    if is_download {
        return url.clone();
    }

    let mut out = url.clone();
    let path = url.path().trim_end_matches('/');
    out.set_path(&format!("{}/download", path));
    out
}

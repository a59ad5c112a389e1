//! Artifact merge rules
//!
//! The same document surfaces many times during a crawl: on the file index,
//! behind a module item, embedded in a page. All sightings of one document
//! share a canonical key, and [`merge`] decides what the surviving record
//! looks like. Merges only ever improve a record; a worse sighting of a
//! known document is dropped.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};
use url::Url;

use super::Artifact;
use crate::classify::title::is_generic_title;

/// What [`merge`] did with an incoming artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First sighting of this canonical key
    Inserted,
    /// The existing record was replaced with a better one
    Upgraded,
    /// The existing record already was at least as good
    Dropped,
}

/// Merges one incoming artifact into the session's artifact map
///
/// The incoming location is always recorded as seen, whatever the outcome,
/// so the same address is never re-examined later in the crawl. An existing
/// record is replaced when the incoming one improves it: a real title over a
/// generic label, or an explicit download address over an indirect one. On
/// replacement the original discovery time is kept, the best title of the
/// two survives, and confidence never decreases.
pub fn merge(
    artifacts: &mut BTreeMap<String, Artifact>,
    seen_locations: &mut BTreeSet<String>,
    incoming: Artifact,
) -> MergeOutcome {
    seen_locations.insert(incoming.location.clone());

    let Some(existing) = artifacts.get(&incoming.canonical_key) else {
        debug!("artifact '{}' recorded as {}", incoming.title, incoming.canonical_key);
        artifacts.insert(incoming.canonical_key.clone(), incoming);
        return MergeOutcome::Inserted;
    };

    let title_improves = is_generic_title(&existing.title) && !is_generic_title(&incoming.title);
    let location_improves =
        is_download_form(&incoming.location) && !is_download_form(&existing.location);

    if !title_improves && !location_improves {
        return MergeOutcome::Dropped;
    }

    let mut upgraded = incoming;
    upgraded.first_seen = existing.first_seen;
    upgraded.confidence = upgraded.confidence.max(existing.confidence);
    if is_generic_title(&upgraded.title) && !is_generic_title(&existing.title) {
        upgraded.title = existing.title.clone();
    }

    debug!(
        "artifact {} upgraded: '{}' at {}",
        upgraded.canonical_key, upgraded.title, upgraded.location
    );
    artifacts.insert(upgraded.canonical_key.clone(), upgraded);
    MergeOutcome::Upgraded
}

/// Whether a location is an explicit download address
pub fn is_download_form(location: &str) -> bool {
    let Ok(url) = Url::parse(location) else {
        return false;
    };
    let path = url.path().to_lowercase();
    path.ends_with("/download")
        || path.ends_with(".pdf")
        || url.query_pairs().any(|(k, _)| k == "download")
}

/// Produces the final artifact listing for reporting
///
/// Two different canonical keys can end up at the same resolved location
/// (an id-keyed record and a location-keyed one). The listing keeps one
/// record per location, preferring higher confidence, and is sorted by
/// title (case-insensitive) with location as tie-break.
pub fn finalize(artifacts: &BTreeMap<String, Artifact>) -> Vec<Artifact> {
    let mut by_location: BTreeMap<String, Artifact> = BTreeMap::new();

    for artifact in artifacts.values() {
        match by_location.get(&artifact.location) {
            Some(kept) => {
                warn!(
                    "duplicate location {} ({} and {}), keeping higher confidence",
                    artifact.location, kept.canonical_key, artifact.canonical_key
                );
                if artifact.confidence > kept.confidence {
                    by_location.insert(artifact.location.clone(), artifact.clone());
                }
            }
            None => {
                by_location.insert(artifact.location.clone(), artifact.clone());
            }
        }
    }

    let mut listing: Vec<Artifact> = by_location.into_values().collect();
    listing.sort_by(|a, b| {
        (a.title.to_lowercase(), &a.location).cmp(&(b.title.to_lowercase(), &b.location))
    });
    listing
}

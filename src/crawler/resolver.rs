//! One-hop resolution of indirect sightings
//!
//! A pending sighting points at something that references the document
//! rather than the document itself: a module item page, an attachment
//! holder, a viewer frame. Resolution fetches the location and follows at
//! most one further reference. Anything buried deeper is dropped; the
//! navigator marks the location as seen so it is never tried again.

use chrono::Utc;
use scraper::{Html, Selector};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::artifact::{canonical_key_for, download_address, file_id_from, Artifact};
use crate::classify::title::{is_generic_title, title_from_location};
use crate::classify::Sighting;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::pool::{paced_fetch, Pacer};
use crate::target::{has_template_marker, normalize_target, CrawlScope};

/// Fetches one resolution may spend: the location itself plus one hop
const MAX_FETCHES: usize = 2;

/// A reference found while resolving
enum Reference {
    /// A direct file address; no further fetch needed
    File(Url),
    /// A secondary page worth one more fetch
    Follow(Url),
}

/// Resolves one pending sighting into a concrete artifact
///
/// # Returns
///
/// * `Some(artifact)` - The document was found within the hop budget
/// * `None` - Unresolvable; dropped after a log line, never an error
pub(crate) async fn resolve(
    fetcher: &Fetcher,
    pacer: &Mutex<Pacer>,
    scope: &CrawlScope,
    discovered_on: &str,
    sighting: Sighting,
) -> Option<Artifact> {
    let mut current = match Url::parse(&sighting.location) {
        Ok(url) => url,
        Err(e) => {
            debug!("dropping unresolvable sighting '{}': {}", sighting.location, e);
            return None;
        }
    };

    if !scope.same_host(&current) {
        debug!("dropping off-host sighting '{}'", sighting.location);
        return None;
    }

    for _ in 0..MAX_FETCHES {
        let outcome = match paced_fetch(fetcher, pacer, current.as_str()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("resolution fetch failed for {}: {}", current, e);
                return None;
            }
        };

        let reference = match outcome {
            FetchOutcome::Page {
                content_type, body, ..
            } => {
                if content_type.contains("application/pdf") {
                    // the fetched location is the document itself
                    return Some(artifact_for(&sighting, discovered_on, &current));
                }
                match find_file_reference(&body, &current, scope) {
                    Some(reference) => reference,
                    None => {
                        debug!("no document reference found at {}", current);
                        return None;
                    }
                }
            }
            FetchOutcome::Redirect { location } => {
                match join_reference(&current, &location, scope) {
                    Some(reference) => reference,
                    None => {
                        debug!("unusable redirect from {} to '{}'", current, location);
                        return None;
                    }
                }
            }
            FetchOutcome::RateLimited => {
                debug!("rate limit persisted while resolving {}", current);
                return None;
            }
            FetchOutcome::HttpError { status } => {
                debug!("HTTP {} while resolving {}", status, current);
                return None;
            }
        };

        match reference {
            Reference::File(url) => return Some(artifact_for(&sighting, discovered_on, &url)),
            Reference::Follow(url) => current = url,
        }
    }

    debug!("resolution hop budget exhausted for '{}'", sighting.location);
    None
}

/// Scans a fetched body for the document reference
///
/// Preference order: file-like anchors, then a meta refresh directive, then
/// embedded viewers. A same-host frame that is not itself file-like is
/// returned as a follow reference worth one hop.
fn find_file_reference(body: &str, base: &Url, scope: &CrawlScope) -> Option<Reference> {
    let document = Html::parse_document(body);

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(url) = absolutize(base, href) else {
                continue;
            };
            if is_file_like(&url) || element.value().attr("download").is_some() {
                return Some(Reference::File(url));
            }
        }
    }

    if let Ok(selector) = Selector::parse("meta[http-equiv]") {
        for element in document.select(&selector) {
            let equiv = element.value().attr("http-equiv").unwrap_or("");
            if !equiv.eq_ignore_ascii_case("refresh") {
                continue;
            }
            if let Some(target) = element.value().attr("content").and_then(refresh_target) {
                return join_reference(base, &target, scope);
            }
        }
    }

    let mut follow = None;
    for (css, attr) in [("iframe[src]", "src"), ("embed[src]", "src"), ("object[data]", "data")] {
        if let Ok(selector) = Selector::parse(css) {
            for element in document.select(&selector) {
                let Some(src) = element.value().attr(attr) else {
                    continue;
                };
                let Some(url) = absolutize(base, src) else {
                    continue;
                };
                if is_file_like(&url) {
                    return Some(Reference::File(url));
                }
                if follow.is_none() && scope.same_host(&url) {
                    follow = Some(Reference::Follow(url));
                }
            }
        }
    }
    follow
}

/// Classifies a raw reference as file or follow, dropping anything else
fn join_reference(base: &Url, raw: &str, scope: &CrawlScope) -> Option<Reference> {
    let url = absolutize(base, raw)?;
    if is_file_like(&url) {
        return Some(Reference::File(url));
    }
    if scope.same_host(&url) {
        return Some(Reference::Follow(url));
    }
    None
}

fn absolutize(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || has_template_marker(raw) {
        return None;
    }
    let joined = base.join(raw).ok()?;
    normalize_target(joined.as_str()).ok()
}

fn is_file_like(url: &Url) -> bool {
    url.path().to_lowercase().ends_with(".pdf") || file_id_from(url).is_some()
}

/// Extracts the target of a meta refresh content attribute
///
/// Accepts the common shapes: `0; url=/x`, `5;URL='/x'`, with or without
/// quotes around the address.
fn refresh_target(content: &str) -> Option<String> {
    for part in content.split(';') {
        let part = part.trim();
        if let Some(prefix) = part.get(..4) {
            if prefix.eq_ignore_ascii_case("url=") {
                let raw = part[4..].trim().trim_matches(|c| c == '\'' || c == '"');
                if !raw.is_empty() {
                    return Some(raw.to_string());
                }
            }
        }
    }
    None
}

/// Builds the artifact record for a resolved location
fn artifact_for(sighting: &Sighting, discovered_on: &str, resolved: &Url) -> Artifact {
    let file_id = file_id_from(resolved).or(sighting.file_id);
    let location = if file_id.is_some() && !resolved.path().to_lowercase().ends_with(".pdf") {
        download_address(resolved)
    } else {
        resolved.clone()
    };

    let mut title = sighting.title.clone();
    if is_generic_title(&title) {
        if let Some(better) = title_from_location(location.as_str()) {
            title = better;
        }
    }

    Artifact {
        canonical_key: canonical_key_for(file_id, location.as_str()),
        location: location.as_str().to_string(),
        title,
        source: sighting.source,
        confidence: sighting.confidence,
        discovered_on: discovered_on.to_string(),
        first_seen: Utc::now(),
    }
}

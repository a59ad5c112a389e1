//! The priority-ordered classification rules
//!
//! [`scan`] turns one page's [`ElementSet`] into artifact sightings and
//! navigation queue requests. Rules run first-match-wins per link: a link
//! claimed as a direct artifact never re-surfaces as a pattern member or a
//! queue candidate.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use url::Url;

use super::elements::{ElementSet, EmbedRef, PageLink};
use super::patterns;
use super::title::best_title;
use super::{has_artifact_keyword, ARTIFACT_EXTENSION};
use crate::artifact::{canonical_key_for, download_address, file_id_from, SourceType};
use crate::queue::Phase;
use crate::target::{has_template_marker, normalize_target, CrawlScope};

/// Confidence for links that point at the document itself
pub const CONFIDENCE_DIRECT: f32 = 0.95;
/// Confidence for known attachment holders
pub const CONFIDENCE_ATTACHMENT: f32 = 0.85;
/// Confidence for bare lexical matches
pub const CONFIDENCE_LEXICAL: f32 = 0.50;

/// Queue priority for section listings and file indexes
pub const PRIORITY_SECTION: u32 = 10;
/// Queue priority for content pages below a section
pub const PRIORITY_DETAIL: u32 = 20;
/// Queue priority for everything else in scope
pub const PRIORITY_EXPLORATORY: u32 = 50;

/// Section path segments the default rule recognizes
const SECTION_SEGMENTS: &[&str] = &["modules", "assignments", "announcements", "pages"];

/// Link schemes that are never navigable
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// One observed artifact candidate, not yet merged into the session
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    /// Normalized candidate location
    pub location: String,
    pub title: String,
    pub source: SourceType,
    pub confidence: f32,
    /// Stable file-store id, when the location exposes one
    pub file_id: Option<u64>,
    /// Whether the location must be fetched once to find the real document
    pub needs_resolution: bool,
}

/// A page the classifier wants visited
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    pub target: String,
    pub priority: u32,
    pub phase: Phase,
    pub metadata: BTreeMap<String, String>,
}

/// Everything one scan produced
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub sightings: Vec<Sighting>,
    pub to_queue: Vec<QueueRequest>,
}

/// Classifies every element extracted from one page
///
/// Links are resolved against the page address and normalized, then run
/// through the rules in priority order. Embedded object references are
/// checked separately. Sightings are deduplicated by canonical key within
/// the page; queue requests are pre-filtered to the crawl scope.
pub fn scan(elements: &ElementSet, scope: &CrawlScope) -> ScanOutcome {
    let page_url = match Url::parse(&elements.page) {
        Ok(url) => url,
        Err(e) => {
            debug!("cannot scan page with unparseable address '{}': {}", elements.page, e);
            return ScanOutcome::default();
        }
    };

    let resolved: Vec<Option<Url>> = elements
        .links
        .iter()
        .map(|link| resolve_href(&page_url, &link.href))
        .collect();

    let mut outcome = ScanOutcome::default();
    let mut consumed = vec![false; elements.links.len()];
    let mut seen_keys: BTreeSet<String> = BTreeSet::new();

    // Rules 1 and 2: links that are themselves artifact evidence.
    for (index, link) in elements.links.iter().enumerate() {
        let Some(url) = &resolved[index] else { continue };
        let sighting =
            direct_sighting(url, link).or_else(|| attachment_sighting(url, link, scope));
        if let Some(sighting) = sighting {
            consumed[index] = true;
            push_sighting(&mut outcome.sightings, &mut seen_keys, sighting);
        }
    }

    for embed in &elements.embeds {
        let Some(url) = resolve_href(&page_url, &embed.src) else {
            continue;
        };
        if let Some(sighting) = embed_sighting(&url, embed, scope) {
            push_sighting(&mut outcome.sightings, &mut seen_keys, sighting);
        }
    }

    // Rule 3: structural sibling groups. Groups are detected over all links
    // so already-claimed members still contribute structure, but only
    // unclaimed members produce sightings.
    for group in patterns::detect_groups(&elements.links) {
        for &index in &group.members {
            if consumed[index] {
                continue;
            }
            let Some(url) = &resolved[index] else { continue };
            if url.as_str() == elements.page || !scope.same_host(url) {
                continue;
            }
            consumed[index] = true;

            let link = &elements.links[index];
            let file_id = file_id_from(url);
            push_sighting(
                &mut outcome.sightings,
                &mut seen_keys,
                Sighting {
                    location: url.as_str().to_string(),
                    title: best_title(&link.text, url.as_str(), file_id),
                    source: SourceType::PatternDetected,
                    confidence: group.score as f32,
                    file_id,
                    needs_resolution: true,
                },
            );
        }
    }

    // Rule 4: lexical fallback for links whose text reads like material.
    for (index, link) in elements.links.iter().enumerate() {
        if consumed[index] {
            continue;
        }
        let Some(url) = &resolved[index] else { continue };
        if url.as_str() == elements.page || !scope.same_host(url) {
            continue;
        }
        if !lexical_match(link, url) {
            continue;
        }
        consumed[index] = true;

        let file_id = file_id_from(url);
        push_sighting(
            &mut outcome.sightings,
            &mut seen_keys,
            Sighting {
                location: url.as_str().to_string(),
                title: best_title(&link.text, url.as_str(), file_id),
                source: SourceType::ResolvedIndirect,
                confidence: CONFIDENCE_LEXICAL,
                file_id,
                needs_resolution: true,
            },
        );
    }

    // Rule 5: remaining in-scope links become navigation work.
    let mut requested: BTreeSet<String> = BTreeSet::new();
    for (index, link) in elements.links.iter().enumerate() {
        if consumed[index] {
            continue;
        }
        let Some(url) = &resolved[index] else { continue };
        if url.as_str() == elements.page || !scope.in_scope(url) {
            continue;
        }
        let target = url.as_str().to_string();
        if !requested.insert(target.clone()) {
            continue;
        }

        let (phase, priority) = queue_shape(url);
        let mut metadata = BTreeMap::new();
        let text = link.text.trim();
        if !text.is_empty() {
            metadata.insert("link-text".to_string(), text.chars().take(80).collect());
        }
        metadata.insert("parent".to_string(), elements.page.clone());

        outcome.to_queue.push(QueueRequest {
            target,
            priority,
            phase,
            metadata,
        });
    }

    outcome
}

/// Resolves a raw href against the page address into a normalized URL
fn resolve_href(page: &Url, raw: &str) -> Option<Url> {
    let href = raw.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_lowercase();
    if SKIPPED_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        return None;
    }
    if has_template_marker(href) {
        debug!("rejected link with template marker: '{}'", href);
        return None;
    }

    let joined = page.join(href).ok()?;
    normalize_target(joined.as_str()).ok()
}

/// Rule 1: the link points at the document itself
fn direct_sighting(url: &Url, link: &PageLink) -> Option<Sighting> {
    if !is_artifact_path(url) && !link.download_attr {
        return None;
    }
    let file_id = file_id_from(url);
    Some(Sighting {
        location: url.as_str().to_string(),
        title: best_title(&link.text, url.as_str(), file_id),
        source: SourceType::Direct,
        confidence: CONFIDENCE_DIRECT,
        file_id,
        needs_resolution: false,
    })
}

/// Rule 2: the link points at a known attachment holder
///
/// File-store references are rewritten to their explicit download address
/// and need no resolution. Content-kind markers and `/attachments/` paths
/// mark the document as real but hidden behind one indirection, so those
/// sightings need a resolution fetch and stay on the crawl host.
fn attachment_sighting(url: &Url, link: &PageLink, scope: &CrawlScope) -> Option<Sighting> {
    if let Some(id) = file_id_from(url) {
        let address = download_address(url);
        return Some(Sighting {
            location: address.as_str().to_string(),
            title: best_title(&link.text, address.as_str(), Some(id)),
            source: SourceType::Attachment,
            confidence: CONFIDENCE_ATTACHMENT,
            file_id: Some(id),
            needs_resolution: false,
        });
    }

    let kind = link
        .content_kind
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let kind_match = kind.contains(ARTIFACT_EXTENSION) || kind == "attachment" || kind == "file";
    let holder_path = url
        .path_segments()
        .map(|mut s| s.any(|seg| seg == "attachments"))
        .unwrap_or(false);

    if (kind_match || holder_path) && scope.same_host(url) {
        return Some(Sighting {
            location: url.as_str().to_string(),
            title: best_title(&link.text, url.as_str(), None),
            source: SourceType::Attachment,
            confidence: CONFIDENCE_ATTACHMENT,
            file_id: None,
            needs_resolution: true,
        });
    }
    None
}

/// Classifies an embedded object reference
fn embed_sighting(url: &Url, embed: &EmbedRef, scope: &CrawlScope) -> Option<Sighting> {
    let text = embed.title.as_deref().unwrap_or("");

    if is_artifact_path(url) {
        let file_id = file_id_from(url);
        return Some(Sighting {
            location: url.as_str().to_string(),
            title: best_title(text, url.as_str(), file_id),
            source: SourceType::Embedded,
            confidence: CONFIDENCE_ATTACHMENT,
            file_id,
            needs_resolution: false,
        });
    }
    if let Some(id) = file_id_from(url) {
        let address = download_address(url);
        return Some(Sighting {
            location: address.as_str().to_string(),
            title: best_title(text, address.as_str(), Some(id)),
            source: SourceType::Embedded,
            confidence: CONFIDENCE_ATTACHMENT,
            file_id: Some(id),
            needs_resolution: false,
        });
    }

    let holder_path = url
        .path_segments()
        .map(|mut s| s.any(|seg| seg == "attachments"))
        .unwrap_or(false);
    if holder_path && scope.same_host(url) {
        return Some(Sighting {
            location: url.as_str().to_string(),
            title: best_title(text, url.as_str(), None),
            source: SourceType::Embedded,
            confidence: CONFIDENCE_ATTACHMENT,
            file_id: None,
            needs_resolution: true,
        });
    }
    None
}

/// Rule 4 predicate: the link text (or filename) reads like course material
fn lexical_match(link: &PageLink, url: &Url) -> bool {
    if has_artifact_keyword(&link.text) {
        return true;
    }
    let last = url
        .path_segments()
        .and_then(|s| s.filter(|seg| !seg.is_empty()).last())
        .unwrap_or("");
    has_artifact_keyword(&last.replace(['_', '-'], " "))
}

fn is_artifact_path(url: &Url) -> bool {
    url.path()
        .to_lowercase()
        .ends_with(&format!(".{}", ARTIFACT_EXTENSION))
}

/// Assigns a queue phase and priority from the target's path shape
fn queue_shape(url: &Url) -> (Phase, u32) {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.last() {
        Some(&"files") => (Phase::AttachmentIndex, PRIORITY_SECTION),
        Some(last) if SECTION_SEGMENTS.contains(last) => (Phase::Index, PRIORITY_SECTION),
        _ if segments
            .iter()
            .any(|s| SECTION_SEGMENTS.contains(s) || *s == "files") =>
        {
            (Phase::Detail, PRIORITY_DETAIL)
        }
        _ => (Phase::Exploratory, PRIORITY_EXPLORATORY),
    }
}

fn push_sighting(sightings: &mut Vec<Sighting>, seen: &mut BTreeSet<String>, sighting: Sighting) {
    let key = canonical_key_for(sighting.file_id, &sighting.location);
    if seen.insert(key) {
        sightings.push(sighting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://lms.example.edu/courses/101/index";

    fn scope() -> CrawlScope {
        CrawlScope::new("https://lms.example.edu/courses/101", "course-101").unwrap()
    }

    fn page_with_links(links: Vec<PageLink>) -> ElementSet {
        ElementSet {
            page: PAGE.to_string(),
            links,
            embeds: Vec::new(),
        }
    }

    fn link(href: &str, text: &str) -> PageLink {
        PageLink {
            href: href.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_index_page_yields_sighting_and_queue_request() {
        let elements = page_with_links(vec![
            link("/courses/101/files", "Files"),
            link("/courses/101/syllabus.pdf", "Syllabus"),
        ]);
        let outcome = scan(&elements, &scope());

        assert_eq!(outcome.sightings.len(), 1);
        let sighting = &outcome.sightings[0];
        assert_eq!(sighting.source, SourceType::Direct);
        assert_eq!(sighting.confidence, CONFIDENCE_DIRECT);
        assert_eq!(
            sighting.location,
            "https://lms.example.edu/courses/101/syllabus.pdf"
        );
        assert!(!sighting.needs_resolution);

        assert_eq!(outcome.to_queue.len(), 1);
        let request = &outcome.to_queue[0];
        assert_eq!(request.target, "https://lms.example.edu/courses/101/files");
        assert_eq!(request.phase, Phase::AttachmentIndex);
        assert_eq!(request.priority, PRIORITY_SECTION);
    }

    #[test]
    fn test_cross_host_direct_artifact_accepted() {
        let elements = page_with_links(vec![link("https://cdn.other.example/slides.pdf", "Slides")]);
        let outcome = scan(&elements, &scope());

        assert_eq!(outcome.sightings.len(), 1);
        assert_eq!(outcome.sightings[0].source, SourceType::Direct);
        assert!(outcome.to_queue.is_empty());
    }

    #[test]
    fn test_file_store_link_rewritten_to_download_address() {
        let elements = page_with_links(vec![link("/files/42", "Download")]);
        let outcome = scan(&elements, &scope());

        assert_eq!(outcome.sightings.len(), 1);
        let sighting = &outcome.sightings[0];
        assert_eq!(sighting.source, SourceType::Attachment);
        assert_eq!(sighting.location, "https://lms.example.edu/files/42/download");
        assert_eq!(sighting.file_id, Some(42));
        assert!(!sighting.needs_resolution);
        // "Download" is pure boilerplate, the id fallback names the record
        assert_eq!(sighting.title, "File 42");
    }

    #[test]
    fn test_attachments_path_needs_resolution() {
        let elements = page_with_links(vec![link(
            "/courses/101/attachments/99-week1",
            "Week 1 Handout",
        )]);
        let outcome = scan(&elements, &scope());

        assert_eq!(outcome.sightings.len(), 1);
        let sighting = &outcome.sightings[0];
        assert_eq!(sighting.source, SourceType::Attachment);
        assert!(sighting.needs_resolution);
        assert_eq!(sighting.title, "Week 1 Handout");
    }

    #[test]
    fn test_content_kind_marker() {
        let mut l = link("/courses/101/getfile?id=9", "Reader");
        l.content_kind = Some("application/pdf".to_string());
        let outcome = scan(&page_with_links(vec![l]), &scope());

        assert_eq!(outcome.sightings.len(), 1);
        assert_eq!(outcome.sightings[0].source, SourceType::Attachment);
        assert!(outcome.sightings[0].needs_resolution);
    }

    #[test]
    fn test_download_attribute_is_direct() {
        let mut l = link("/courses/101/export", "Course notes");
        l.download_attr = true;
        let outcome = scan(&page_with_links(vec![l]), &scope());

        assert_eq!(outcome.sightings.len(), 1);
        assert_eq!(outcome.sightings[0].source, SourceType::Direct);
        assert!(!outcome.sightings[0].needs_resolution);
    }

    #[test]
    fn test_pattern_members_become_pending_sightings() {
        let make = |href: &str, text: &str, id: u64| PageLink {
            href: href.to_string(),
            text: text.to_string(),
            class_attr: Some("item-link".to_string()),
            container: Some("module-items".to_string()),
            item_id: Some(id),
            ..Default::default()
        };
        let elements = page_with_links(vec![
            make("/courses/101/items/101", "Lecture 1", 101),
            make("/courses/101/items/102", "Lecture 2", 102),
        ]);
        let outcome = scan(&elements, &scope());

        assert_eq!(outcome.sightings.len(), 2);
        for sighting in &outcome.sightings {
            assert_eq!(sighting.source, SourceType::PatternDetected);
            assert!(sighting.needs_resolution);
            assert!(sighting.confidence > 0.6);
        }
        // claimed members never double as navigation work
        assert!(outcome.to_queue.is_empty());
    }

    #[test]
    fn test_lexical_fallback() {
        let elements = page_with_links(vec![link("/courses/101/materials/week3", "Week 3 Lecture")]);
        let outcome = scan(&elements, &scope());

        assert_eq!(outcome.sightings.len(), 1);
        let sighting = &outcome.sightings[0];
        assert_eq!(sighting.source, SourceType::ResolvedIndirect);
        assert_eq!(sighting.confidence, CONFIDENCE_LEXICAL);
        assert!(sighting.needs_resolution);
    }

    #[test]
    fn test_default_queue_shapes() {
        let elements = page_with_links(vec![
            link("/courses/101/modules", "Overview"),
            link("/courses/101/modules/3", "Week 3"),
            link("/courses/101/about", "About"),
        ]);
        let outcome = scan(&elements, &scope());

        assert!(outcome.sightings.is_empty());
        let shapes: Vec<(Phase, u32)> = outcome
            .to_queue
            .iter()
            .map(|r| (r.phase, r.priority))
            .collect();
        assert_eq!(
            shapes,
            vec![
                (Phase::Index, PRIORITY_SECTION),
                (Phase::Detail, PRIORITY_DETAIL),
                (Phase::Exploratory, PRIORITY_EXPLORATORY),
            ]
        );
    }

    #[test]
    fn test_template_markers_rejected_everywhere() {
        let elements = page_with_links(vec![
            link("/courses/101/files/{{ file.id }}", "Download"),
            link("/courses/101/%7B%7Bid%7D%7D", "Lecture 1"),
        ]);
        let outcome = scan(&elements, &scope());
        assert!(outcome.sightings.is_empty());
        assert!(outcome.to_queue.is_empty());
    }

    #[test]
    fn test_inert_schemes_skipped() {
        let elements = page_with_links(vec![
            link("javascript:void(0)", "Expand"),
            link("mailto:prof@example.edu", "Contact"),
            link("#section-2", "Jump"),
        ]);
        let outcome = scan(&elements, &scope());
        assert!(outcome.sightings.is_empty());
        assert!(outcome.to_queue.is_empty());
    }

    #[test]
    fn test_self_link_not_queued() {
        let elements = page_with_links(vec![link("/courses/101/index", "This page")]);
        let outcome = scan(&elements, &scope());
        assert!(outcome.to_queue.is_empty());
    }

    #[test]
    fn test_out_of_scope_page_not_queued() {
        let elements = page_with_links(vec![link(
            "https://lms.example.edu/courses/999/modules",
            "Other course",
        )]);
        let outcome = scan(&elements, &scope());
        assert!(outcome.to_queue.is_empty());
    }

    #[test]
    fn test_embedded_pdf() {
        let elements = ElementSet {
            page: PAGE.to_string(),
            links: Vec::new(),
            embeds: vec![EmbedRef {
                src: "/courses/101/preview/notes.pdf".to_string(),
                title: Some("Notes".to_string()),
            }],
        };
        let outcome = scan(&elements, &scope());

        assert_eq!(outcome.sightings.len(), 1);
        assert_eq!(outcome.sightings[0].source, SourceType::Embedded);
        assert!(!outcome.sightings[0].needs_resolution);
    }

    #[test]
    fn test_same_file_sighted_once_per_page() {
        let elements = page_with_links(vec![
            link("/files/42", "Handout"),
            link("/files/42/download", "Download"),
        ]);
        let outcome = scan(&elements, &scope());

        // both resolve to canonical key file:42
        assert_eq!(outcome.sightings.len(), 1);
        assert_eq!(outcome.sightings[0].file_id, Some(42));
    }

    #[test]
    fn test_queue_request_metadata() {
        let elements = page_with_links(vec![link("/courses/101/modules", "Course modules")]);
        let outcome = scan(&elements, &scope());

        let metadata = &outcome.to_queue[0].metadata;
        assert_eq!(metadata.get("link-text").map(String::as_str), Some("Course modules"));
        assert_eq!(metadata.get("parent").map(String::as_str), Some(PAGE));
    }
}

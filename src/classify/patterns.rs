//! Structural pattern-group scoring
//!
//! File listings rendered from templates produce sibling links that share a
//! container and class and differ only in name and id ("Lecture 1",
//! "Lecture 2", ...). A single weak signal proves nothing, so groups are
//! scored across several signals and only kept above a threshold.

use std::collections::BTreeMap;

use super::has_artifact_keyword;
use crate::classify::elements::PageLink;

/// Score for sharing a container element and class attribute
pub const STRUCTURAL_WEIGHT: f64 = 0.35;
/// Score per group member beyond the first
pub const GROUP_SIZE_WEIGHT: f64 = 0.10;
/// Cap on the accumulated group-size score
pub const GROUP_SIZE_CAP: f64 = 0.30;
/// Score for link texts forming a lexical series
pub const LEXICAL_WEIGHT: f64 = 0.30;
/// Score for item ids forming a plausible ascending sequence
pub const SEQUENTIAL_WEIGHT: f64 = 0.25;
/// Minimum score for a group to be reported
pub const PATTERN_THRESHOLD: f64 = 0.60;
/// Scores never reach certainty
pub const MAX_SCORE: f64 = 0.99;

/// Largest allowed gap between consecutive ids in a sequence
const MAX_ID_GAP: u64 = 10;

/// A detected sibling series within one page
#[derive(Debug, Clone)]
pub struct PatternGroup {
    /// Indices into the link slice the group was detected over
    pub members: Vec<usize>,
    pub score: f64,
}

/// Detects pattern groups among a page's links
///
/// Links are grouped by (container id, class attribute); links missing
/// either never group. Each group of two or more is scored, and groups at
/// or above [`PATTERN_THRESHOLD`] are returned in document order.
pub fn detect_groups(links: &[PageLink]) -> Vec<PatternGroup> {
    let mut buckets: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();

    for (index, link) in links.iter().enumerate() {
        if let (Some(container), Some(class)) = (&link.container, &link.class_attr) {
            buckets
                .entry((container.clone(), class.clone()))
                .or_default()
                .push(index);
        }
    }

    let mut groups = Vec::new();
    for (_, members) in buckets {
        if members.len() < 2 {
            continue;
        }
        let group_links: Vec<&PageLink> = members.iter().map(|&i| &links[i]).collect();
        let score = score_group(&group_links);
        if score >= PATTERN_THRESHOLD {
            groups.push(PatternGroup { members, score });
        }
    }

    groups.sort_by_key(|g| g.members[0]);
    groups
}

fn score_group(members: &[&PageLink]) -> f64 {
    let mut score = STRUCTURAL_WEIGHT;

    let size_bonus = (members.len() - 1) as f64 * GROUP_SIZE_WEIGHT;
    score += size_bonus.min(GROUP_SIZE_CAP);

    if lexical_series(members) {
        score += LEXICAL_WEIGHT;
    }
    if sequential_ids(members) {
        score += SEQUENTIAL_WEIGHT;
    }

    score.min(MAX_SCORE)
}

/// Whether the member texts read like a series of course material
///
/// True when at least half the texts carry an artifact keyword, or when all
/// texts share a common stem followed by a number.
fn lexical_series(members: &[&PageLink]) -> bool {
    let hits = members
        .iter()
        .filter(|l| has_artifact_keyword(&l.text))
        .count();
    if hits * 2 >= members.len() {
        return true;
    }
    shared_numbered_stem(members)
}

fn shared_numbered_stem(members: &[&PageLink]) -> bool {
    let mut stem: Option<String> = None;

    for link in members {
        let text = link.text.trim();
        let digits = text
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if digits == 0 {
            return false;
        }
        let this_stem = text[..text.len() - digits].trim_end().to_lowercase();
        if this_stem.is_empty() {
            return false;
        }
        match &stem {
            None => stem = Some(this_stem),
            Some(existing) if *existing == this_stem => {}
            Some(_) => return false,
        }
    }
    stem.is_some()
}

/// Whether member ids form an ascending sequence with bounded gaps
fn sequential_ids(members: &[&PageLink]) -> bool {
    let ids: Vec<u64> = members.iter().filter_map(|l| link_id(l)).collect();
    if ids.len() < 2 {
        return false;
    }
    ids.windows(2)
        .all(|pair| pair[1] > pair[0] && pair[1] - pair[0] <= MAX_ID_GAP)
}

/// The link's numeric identity: its data id, else the last numeric path
/// segment of its href
fn link_id(link: &PageLink) -> Option<u64> {
    if link.item_id.is_some() {
        return link.item_id;
    }
    let path = link
        .href
        .split(['?', '#'])
        .next()
        .unwrap_or(&link.href);
    path.rsplit('/')
        .filter(|s| !s.is_empty())
        .find_map(|segment| segment.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(text: &str, container: &str, class: &str, item_id: Option<u64>) -> PageLink {
        PageLink {
            href: "/files/0".to_string(),
            text: text.to_string(),
            class_attr: Some(class.to_string()),
            container: Some(container.to_string()),
            item_id,
            ..Default::default()
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "score {} != {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_lecture_series_detected() {
        let links = vec![
            link("Lecture 1", "module-items", "item-link", Some(101)),
            link("Lecture 2", "module-items", "item-link", Some(102)),
        ];
        let groups = detect_groups(&links);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![0, 1]);
        // all four signals fire, capped below certainty
        assert_close(groups[0].score, MAX_SCORE);
        assert!(groups[0].score >= PATTERN_THRESHOLD);
    }

    #[test]
    fn test_unrelated_links_not_grouped() {
        let links = vec![
            link("About", "nav", "nav-link", None),
            link("Contact", "nav", "nav-link", None),
        ];
        assert!(detect_groups(&links).is_empty());
    }

    #[test]
    fn test_container_required() {
        let mut a = link("Lecture 1", "x", "item-link", Some(1));
        let mut b = link("Lecture 2", "x", "item-link", Some(2));
        a.container = None;
        b.container = None;
        assert!(detect_groups(&[a, b]).is_empty());
    }

    #[test]
    fn test_mixed_classes_not_grouped() {
        let links = vec![
            link("Lecture 1", "items", "link-a", Some(1)),
            link("Lecture 2", "items", "link-b", Some(2)),
        ];
        assert!(detect_groups(&links).is_empty());
    }

    #[test]
    fn test_large_id_gap_breaks_sequence() {
        let links = vec![
            link("Alpha", "items", "row", Some(1)),
            link("Beta", "items", "row", Some(50)),
        ];
        // neither lexical nor sequential, structural alone stays below threshold
        assert!(detect_groups(&links).is_empty());
    }

    #[test]
    fn test_numbered_stem_without_keywords() {
        let links = vec![
            link("Übung 1", "sheet-list", "sheet", None),
            link("Übung 2", "sheet-list", "sheet", None),
            link("Übung 3", "sheet-list", "sheet", None),
        ];
        let groups = detect_groups(&links);
        assert_eq!(groups.len(), 1);
        assert_close(
            groups[0].score,
            STRUCTURAL_WEIGHT + 2.0 * GROUP_SIZE_WEIGHT + LEXICAL_WEIGHT,
        );
    }

    #[test]
    fn test_group_size_bonus_capped() {
        let links: Vec<PageLink> = (1..=6)
            .map(|n| link(&format!("Lecture {}", n), "items", "row", Some(100 + n)))
            .collect();
        let groups = detect_groups(&links);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 6);
        assert_close(groups[0].score, MAX_SCORE);
    }

    #[test]
    fn test_id_fallback_from_href() {
        let mut a = link("Handout 1", "items", "row", None);
        let mut b = link("Handout 2", "items", "row", None);
        a.href = "/courses/1/files/201".to_string();
        b.href = "/courses/1/files/202".to_string();
        let groups = detect_groups(&[a, b]);
        assert_eq!(groups.len(), 1);
        assert_close(groups[0].score, MAX_SCORE);
    }
}

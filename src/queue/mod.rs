//! Navigation queue: the priority-ordered, deduplicated list of pages to visit
//!
//! The queue is deliberately simple: a `Vec` re-sorted with a stable sort on
//! every insert. Priorities are small integers (lower = more urgent) and ties
//! keep insertion order, so high-value sections drain before exploratory
//! pages without a separate scheduler. The queue is bounded by the size of
//! one site, which keeps the re-sort cheap.

use crate::target::{normalize_target, CrawlScope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Diagnostic tag describing why a queue item exists
///
/// Phases feed priority assignment and logging; control flow never branches
/// on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// A section listing (modules, assignments, announcements)
    Index,
    /// A single content page below a section
    Detail,
    /// A file-listing section, the highest-value page kind
    AttachmentIndex,
    /// An in-scope page queued by the default rule
    Exploratory,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Index => "index",
            Phase::Detail => "detail",
            Phase::AttachmentIndex => "attachment-index",
            Phase::Exploratory => "exploratory",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the navigation queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Normalized location identifier
    pub target: String,
    /// Lower is more urgent; ties keep insertion order
    pub priority: u32,
    /// Why this item was queued
    pub phase: Phase,
    /// Whether the navigator has processed this item
    pub visited: bool,
    /// Free-form context (originating link text, parent target)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Queue statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueStats {
    pub total: usize,
    pub visited: usize,
    pub remaining: usize,
    pub progress_pct: f64,
}

/// Priority-ordered, deduplicated work list with a visited set
///
/// Serialized as part of the session record: the item list keeps its order,
/// the visited set is order-independent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationQueue {
    items: Vec<QueueItem>,
    visited: BTreeSet<String>,
}

impl NavigationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target to the queue
    ///
    /// The raw target is normalized first. Candidates are rejected when they
    /// cannot be normalized (malformed, bad scheme, template marker), fall
    /// outside the crawl scope, were already visited, or are already queued.
    ///
    /// # Returns
    ///
    /// `true` if the item was newly added
    pub fn enqueue(
        &mut self,
        scope: &CrawlScope,
        raw: &str,
        priority: u32,
        phase: Phase,
        metadata: BTreeMap<String, String>,
    ) -> bool {
        let url = match normalize_target(raw) {
            Ok(url) => url,
            Err(e) => {
                debug!("rejected queue candidate '{}': {}", raw, e);
                return false;
            }
        };

        if !scope.in_scope(&url) {
            debug!("rejected queue candidate '{}': outside crawl scope", url);
            return false;
        }

        let target = String::from(url);
        if self.visited.contains(&target) {
            return false;
        }
        if self.items.iter().any(|item| item.target == target) {
            return false;
        }

        self.items.push(QueueItem {
            target,
            priority,
            phase,
            visited: false,
            metadata,
        });

        // Vec::sort_by_key is stable, so equal priorities keep FIFO order
        // across repeated re-sorts.
        self.items.sort_by_key(|item| item.priority);
        true
    }

    /// Returns the first unvisited item, or `None` when the queue is drained
    pub fn next_unvisited(&self) -> Option<&QueueItem> {
        self.items.iter().find(|item| !item.visited)
    }

    /// Marks a target as visited
    ///
    /// The target is normalized, added to the visited set, and any matching
    /// queue item is flagged.
    ///
    /// # Returns
    ///
    /// `true` if the target was not already in the visited set
    pub fn mark_visited(&mut self, target: &str) -> bool {
        let target = match normalize_target(target) {
            Ok(url) => String::from(url),
            Err(_) => target.to_string(),
        };

        let newly_visited = self.visited.insert(target.clone());
        for item in self.items.iter_mut() {
            if item.target == target {
                item.visited = true;
            }
        }
        newly_visited
    }

    /// Whether a target has been visited already
    pub fn is_visited(&self, target: &str) -> bool {
        match normalize_target(target) {
            Ok(url) => self.visited.contains(url.as_str()),
            Err(_) => false,
        }
    }

    /// Queue statistics for progress reporting
    pub fn stats(&self) -> QueueStats {
        let total = self.items.len();
        let visited = self.items.iter().filter(|item| item.visited).count();
        let remaining = total - visited;
        let progress_pct = if total == 0 {
            0.0
        } else {
            (visited as f64 / total as f64) * 100.0
        };
        QueueStats {
            total,
            visited,
            remaining,
            progress_pct,
        }
    }

    /// All queue items in priority order
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// The set of visited normalized targets
    pub fn visited_set(&self) -> &BTreeSet<String> {
        &self.visited
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> CrawlScope {
        CrawlScope::new("https://lms.example.edu/courses/101", "course-101").unwrap()
    }

    fn url(path: &str) -> String {
        format!("https://lms.example.edu/courses/101{}", path)
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        assert!(queue.enqueue(&s, &url("/modules"), 1, Phase::Index, BTreeMap::new()));
        assert!(!queue.enqueue(&s, &url("/modules"), 1, Phase::Index, BTreeMap::new()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_enqueue_dedupes_across_normalization() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        assert!(queue.enqueue(&s, &url("/modules"), 1, Phase::Index, BTreeMap::new()));
        // Trailing slash and fragment normalize to the same target
        assert!(!queue.enqueue(&s, &url("/modules/#top"), 1, Phase::Index, BTreeMap::new()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_priority_ordering() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        queue.enqueue(&s, &url("/three"), 3, Phase::Exploratory, BTreeMap::new());
        queue.enqueue(&s, &url("/one"), 1, Phase::Index, BTreeMap::new());
        queue.enqueue(&s, &url("/two"), 2, Phase::Detail, BTreeMap::new());

        let mut drained = Vec::new();
        while let Some(item) = queue.next_unvisited() {
            drained.push(item.target.clone());
            let target = item.target.clone();
            queue.mark_visited(&target);
        }
        assert_eq!(drained, vec![url("/one"), url("/two"), url("/three")]);
    }

    #[test]
    fn test_fifo_within_priority_tier() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        queue.enqueue(&s, &url("/a"), 5, Phase::Exploratory, BTreeMap::new());
        queue.enqueue(&s, &url("/b"), 5, Phase::Exploratory, BTreeMap::new());
        queue.enqueue(&s, &url("/urgent"), 1, Phase::Index, BTreeMap::new());
        queue.enqueue(&s, &url("/c"), 5, Phase::Exploratory, BTreeMap::new());

        let order: Vec<&str> = queue.items().iter().map(|i| i.target.as_str()).collect();
        assert_eq!(
            order,
            vec![url("/urgent"), url("/a"), url("/b"), url("/c")]
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_enqueue_rejects_visited() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        queue.mark_visited(&url("/modules"));
        assert!(!queue.enqueue(&s, &url("/modules"), 1, Phase::Index, BTreeMap::new()));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_rejects_out_of_scope() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        assert!(!queue.enqueue(
            &s,
            "https://elsewhere.example.com/files/1.pdf",
            1,
            Phase::Index,
            BTreeMap::new()
        ));
        // Same host but outside the container path
        assert!(!queue.enqueue(
            &s,
            "https://lms.example.edu/courses/999/modules",
            1,
            Phase::Index,
            BTreeMap::new()
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_rejects_template_markers() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        assert!(!queue.enqueue(
            &s,
            &url("/files/{{file_id}}"),
            1,
            Phase::Index,
            BTreeMap::new()
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_visited_and_unvisited_queue_are_disjoint() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        for (i, path) in ["/a", "/b", "/c", "/d"].iter().enumerate() {
            queue.enqueue(&s, &url(path), i as u32, Phase::Exploratory, BTreeMap::new());
        }
        queue.mark_visited(&url("/a"));
        queue.mark_visited(&url("/c"));

        for item in queue.items().iter().filter(|item| !item.visited) {
            assert!(
                !queue.visited_set().contains(&item.target),
                "{} is both visited and pending",
                item.target
            );
        }
    }

    #[test]
    fn test_mark_visited_normalizes() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        queue.enqueue(&s, &url("/files"), 1, Phase::AttachmentIndex, BTreeMap::new());
        queue.mark_visited(&url("/files/"));
        assert!(queue.next_unvisited().is_none());
    }

    #[test]
    fn test_mark_visited_returns_newness() {
        let mut queue = NavigationQueue::new();
        assert!(queue.mark_visited(&url("/a")));
        assert!(!queue.mark_visited(&url("/a")));
    }

    #[test]
    fn test_stats() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        queue.enqueue(&s, &url("/a"), 1, Phase::Index, BTreeMap::new());
        queue.enqueue(&s, &url("/b"), 2, Phase::Detail, BTreeMap::new());
        queue.enqueue(&s, &url("/c"), 3, Phase::Detail, BTreeMap::new());
        queue.enqueue(&s, &url("/d"), 4, Phase::Exploratory, BTreeMap::new());
        queue.mark_visited(&url("/a"));

        let stats = queue.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.visited, 1);
        assert_eq!(stats.remaining, 3);
        assert!((stats.progress_pct - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_empty_queue() {
        let queue = NavigationQueue::new();
        let stats = queue.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.progress_pct, 0.0);
    }

    #[test]
    fn test_next_unvisited_skips_visited() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        queue.enqueue(&s, &url("/a"), 1, Phase::Index, BTreeMap::new());
        queue.enqueue(&s, &url("/b"), 2, Phase::Detail, BTreeMap::new());
        queue.mark_visited(&url("/a"));
        assert_eq!(queue.next_unvisited().map(|i| i.target.as_str()), Some(url("/b")).as_deref());
    }

    #[test]
    fn test_serde_round_trip_preserves_order() {
        let s = scope();
        let mut queue = NavigationQueue::new();
        queue.enqueue(&s, &url("/b"), 2, Phase::Detail, BTreeMap::new());
        queue.enqueue(&s, &url("/a"), 1, Phase::Index, BTreeMap::new());
        queue.mark_visited(&url("/a"));

        let blob = serde_json::to_string(&queue).unwrap();
        let restored: NavigationQueue = serde_json::from_str(&blob).unwrap();
        assert_eq!(restored, queue);
    }
}

//! The persisted session record and its component types

use crate::artifact::Artifact;
use crate::queue::NavigationQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Terminal and non-terminal crawl outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// The crawl is still running (or suspended mid-run)
    InProgress,
    /// The queue drained
    Completed,
    /// A limit was hit or a stop was requested
    Stopped,
    /// The global retry budget was exhausted
    Failed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::InProgress => "in_progress",
            CompletionStatus::Completed => "completed",
            CompletionStatus::Stopped => "stopped",
            CompletionStatus::Failed => "failed",
        }
    }

    /// Whether this status ends the session
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CompletionStatus::InProgress)
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded navigation or fetch failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub target: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(target: &str, message: &str) -> Self {
        Self {
            target: target.to_string(),
            message: message.to_string(),
            at: Utc::now(),
        }
    }
}

/// Monotonic counters mutated by the navigator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Pages the navigator has processed (successfully or not)
    pub pages_visited: u64,
    /// Page transitions requested, including re-requests after a resume
    pub navigation_attempts: u32,
    /// Global failure count against the retry budget
    pub retries: u32,
}

/// Limits the session was started under
///
/// Stored with the session so a resumed crawl behaves like the run that
/// created it. Only an actual configuration change (a new config hash)
/// replaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_navigation_attempts: u32,
    pub max_retries: u32,
    pub navigation_timeout_ms: u64,
}

/// The unit of persisted state for one crawl run
///
/// Set-valued fields use ordered collections (`BTreeSet`/`BTreeMap`) so the
/// serialized form is independent of insertion order and a save/load round
/// trip is value-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlSession {
    /// Opaque identifier generated at session start
    pub session_id: String,
    /// False once the session reached a terminal status
    pub is_active: bool,
    /// Identifier of the root container being crawled
    pub root_id: String,
    /// Pages to visit plus the visited set
    pub queue: NavigationQueue,
    /// Canonical artifact set keyed by canonical key
    pub artifacts: BTreeMap<String, Artifact>,
    /// Locations already merged or attempted, never reprocessed
    pub seen_locations: BTreeSet<String>,
    /// Per-target soft failures in occurrence order
    pub failed_targets: Vec<FailureRecord>,
    pub counters: Counters,
    pub limits: Limits,
    pub completion: CompletionStatus,
    /// Most recent failure, if any
    pub last_error: Option<FailureRecord>,
    /// Hash of the configuration the session was started under
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
}

impl CrawlSession {
    /// Creates a fresh, active session for a root container
    pub fn new(root_id: &str, limits: Limits, config_hash: &str) -> Self {
        Self {
            session_id: generate_session_id(),
            is_active: true,
            root_id: root_id.to_string(),
            queue: NavigationQueue::new(),
            artifacts: BTreeMap::new(),
            seen_locations: BTreeSet::new(),
            failed_targets: Vec::new(),
            counters: Counters::default(),
            limits,
            completion: CompletionStatus::InProgress,
            last_error: None,
            config_hash: config_hash.to_string(),
            started_at: Utc::now(),
        }
    }

    /// Marks a page as processed: visited set, queue item flag, and the
    /// `pages_visited` counter move together
    pub fn record_visit(&mut self, target: &str) {
        if self.queue.mark_visited(target) {
            self.counters.pages_visited += 1;
        }
    }

    /// Transitions the session into a terminal status
    pub fn finish(&mut self, status: CompletionStatus) {
        self.completion = status;
        self.is_active = !status.is_terminal();
    }

    /// Milliseconds elapsed since the session started
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }
}

fn generate_session_id() -> String {
    format!(
        "{}-{:08x}",
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u32>()
    )
}

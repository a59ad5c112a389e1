//! Crawl reporting: the final report and the event sink interface
//!
//! Reporting is push-based: the navigator emits [`ReportEvent`]s as it goes
//! and a [`ReportSink`] decides what to do with them. Sinks are best-effort;
//! a failing sink never fails the crawl.

pub mod summary;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::{dedup, Artifact};
use crate::session::{CompletionStatus, CrawlSession, FailureRecord};

/// Errors that can occur while emitting report events
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to emit report event: {0}")]
    Emit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The final outcome of one crawl run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub session_id: String,
    pub root_id: String,
    pub pages_visited: u64,
    /// Finalized artifact listing, one record per location
    pub artifacts: Vec<Artifact>,
    pub duration_ms: u64,
    pub completion: CompletionStatus,
    pub failed_targets: Vec<FailureRecord>,
}

impl CrawlReport {
    /// Builds the report for a session's current state
    ///
    /// Works for terminal and suspended sessions alike, so a stopped crawl
    /// can still report what it found so far.
    pub fn from_session(session: &CrawlSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            root_id: session.root_id.clone(),
            pages_visited: session.counters.pages_visited,
            artifacts: dedup::finalize(&session.artifacts),
            duration_ms: session.elapsed_ms(),
            completion: session.completion,
            failed_targets: session.failed_targets.clone(),
        }
    }
}

/// Events emitted while a crawl runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ReportEvent {
    /// One page's scan produced new or upgraded artifacts
    ArtifactsFound { page: String, artifacts: Vec<Artifact> },
    /// The crawl reached a terminal status
    CrawlComplete { report: CrawlReport },
}

/// Receives report events as the crawl progresses
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn emit(&self, event: &ReportEvent) -> Result<(), SinkError>;
}

/// Sink that writes events to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportSink for LogSink {
    async fn emit(&self, event: &ReportEvent) -> Result<(), SinkError> {
        match event {
            ReportEvent::ArtifactsFound { page, artifacts } => {
                info!("{} artifact(s) on {}", artifacts.len(), page);
                for artifact in artifacts {
                    info!(
                        "  '{}' at {} ({}, confidence {:.2})",
                        artifact.title, artifact.location, artifact.source, artifact.confidence
                    );
                }
            }
            ReportEvent::CrawlComplete { report } => {
                info!(
                    "crawl {} for '{}' finished: {} ({} pages, {} artifacts, {} failures, {:.1}s)",
                    report.session_id,
                    report.root_id,
                    report.completion,
                    report.pages_visited,
                    report.artifacts.len(),
                    report.failed_targets.len(),
                    report.duration_ms as f64 / 1000.0
                );
            }
        }
        Ok(())
    }
}

/// Fans events out to several sinks, isolating their failures
pub struct CompositeSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ReportSink for CompositeSink {
    async fn emit(&self, event: &ReportEvent) -> Result<(), SinkError> {
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event).await {
                warn!("report sink failed, continuing: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::SourceType;
    use crate::session::Limits;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    struct RecordingSink {
        events: Arc<Mutex<Vec<ReportEvent>>>,
    }

    impl RecordingSink {
        fn new() -> (Self, Arc<Mutex<Vec<ReportEvent>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    events: events.clone(),
                },
                events,
            )
        }
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn emit(&self, event: &ReportEvent) -> Result<(), SinkError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ReportSink for FailingSink {
        async fn emit(&self, _event: &ReportEvent) -> Result<(), SinkError> {
            Err(SinkError::Emit("broken pipe".to_string()))
        }
    }

    fn session_with_artifact() -> CrawlSession {
        let mut session = CrawlSession::new(
            "course-101",
            Limits {
                max_navigation_attempts: 100,
                max_retries: 5,
                navigation_timeout_ms: 30_000,
            },
            "hash",
        );
        session.counters.pages_visited = 3;
        let artifact = Artifact {
            canonical_key: "file:42".to_string(),
            location: "https://lms.example.edu/files/42/download".to_string(),
            title: "Lecture 3 Slides".to_string(),
            source: SourceType::Attachment,
            confidence: 0.85,
            discovered_on: "https://lms.example.edu/courses/101/files".to_string(),
            first_seen: Utc::now(),
        };
        session.artifacts.insert(artifact.canonical_key.clone(), artifact);
        session.finish(CompletionStatus::Completed);
        session
    }

    #[test]
    fn test_report_from_session() {
        let session = session_with_artifact();
        let report = CrawlReport::from_session(&session);

        assert_eq!(report.session_id, session.session_id);
        assert_eq!(report.root_id, "course-101");
        assert_eq!(report.pages_visited, 3);
        assert_eq!(report.completion, CompletionStatus::Completed);
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].title, "Lecture 3 Slides");
    }

    #[tokio::test]
    async fn test_composite_continues_after_sink_failure() {
        let (recording, events) = RecordingSink::new();
        let report = CrawlReport::from_session(&session_with_artifact());
        let event = ReportEvent::CrawlComplete { report };

        // the failing sink comes first, the recording sink must still see
        // the event
        let composite = CompositeSink::new(vec![Box::new(FailingSink), Box::new(recording)]);
        assert!(composite.emit(&event).await.is_ok());

        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], event);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = ReportEvent::ArtifactsFound {
            page: "https://lms.example.edu/courses/101/files".to_string(),
            artifacts: Vec::new(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"artifacts-found\""));
    }
}

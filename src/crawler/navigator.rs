//! The lock-step navigation loop
//!
//! Execution context does not survive a page transition, so the navigator
//! never trusts its own memory across one: the session is reloaded from the
//! store at the top of every tick and saved around every transition. One
//! tick is: pick the next unvisited queue item, request the transition,
//! resume with the delivered page, scan it, persist. Exactly one navigation
//! is in flight at any time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::artifact::dedup::{self, MergeOutcome};
use crate::artifact::{canonical_key_for, Artifact};
use crate::classify::{self, Sighting};
use crate::config::{CrawlerConfig, EntryPoint};
use crate::crawler::{failure, CrawlMode, ResolverPool, TransitionDriver};
use crate::extract::{ContentExtractor, PageHandle};
use crate::report::{CrawlReport, ReportEvent, ReportSink};
use crate::session::{CompletionStatus, CrawlSession, Limits, SessionStore};
use crate::target::CrawlScope;
use crate::{ConfigError, Result, SatchelError};

/// Drives one crawl session to a terminal status
///
/// The navigator is the single writer of the session record. Everything it
/// holds in memory is either immutable wiring or reloaded from the store
/// each tick.
pub struct Navigator {
    scope: CrawlScope,
    store: SessionStore,
    driver: Arc<dyn TransitionDriver>,
    extractor: Arc<dyn ContentExtractor>,
    pool: ResolverPool,
    sink: Arc<dyn ReportSink>,
    stop: watch::Receiver<bool>,
    limits: Limits,
    entry_points: Vec<EntryPoint>,
    config_hash: String,
    progress_interval: u64,
}

impl Navigator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scope: CrawlScope,
        store: SessionStore,
        driver: Arc<dyn TransitionDriver>,
        extractor: Arc<dyn ContentExtractor>,
        pool: ResolverPool,
        sink: Arc<dyn ReportSink>,
        stop: watch::Receiver<bool>,
        crawler: &CrawlerConfig,
        entry_points: Vec<EntryPoint>,
        config_hash: &str,
    ) -> Self {
        Self {
            scope,
            store,
            driver,
            extractor,
            pool,
            sink,
            stop,
            limits: crawler.limits(),
            entry_points,
            config_hash: config_hash.to_string(),
            progress_interval: crawler.progress_interval,
        }
    }

    /// Runs the crawl until the session reaches a terminal status
    ///
    /// # Returns
    ///
    /// The final report, whatever the terminal status. Callers distinguish
    /// success from failure through [`CrawlReport::completion`].
    pub async fn run(&self, mode: CrawlMode) -> Result<CrawlReport> {
        self.initialize(mode).await?;

        let mut since_progress = 0u64;
        loop {
            let mut session = self.load_required().await?;

            if !session.is_active {
                return self.complete(session).await;
            }
            if self.stop_requested() {
                info!("stop requested, suspending session {}", session.session_id);
                session.finish(CompletionStatus::Stopped);
                self.store.save(&session).await?;
                return self.complete(session).await;
            }

            let Some(item) = session.queue.next_unvisited() else {
                info!("queue drained, crawl complete");
                session.finish(CompletionStatus::Completed);
                self.store.save(&session).await?;
                return self.complete(session).await;
            };
            let target = item.target.clone();
            let phase = item.phase;

            if session.counters.navigation_attempts >= session.limits.max_navigation_attempts {
                warn!(
                    "navigation attempt limit reached ({}), suspending",
                    session.limits.max_navigation_attempts
                );
                session.finish(CompletionStatus::Stopped);
                self.store.save(&session).await?;
                return self.complete(session).await;
            }

            session.counters.navigation_attempts += 1;
            let timeout_ms = session.limits.navigation_timeout_ms;

            // Persisted before the transition: if the process dies mid-way,
            // the attempt still counts after a resume.
            self.store.save(&session).await?;
            drop(session);

            debug!("navigating to {} ({})", target, phase);
            let delivered = self.navigate(&target, timeout_ms).await;

            // Everything in memory predates the transition. Reload.
            let mut session = self.load_required().await?;
            if !session.is_active {
                debug!("session no longer active, discarding delivery for {}", target);
                return self.complete(session).await;
            }

            match delivered {
                Ok(page) => {
                    self.scan_page(&mut session, &target, &page).await?;
                }
                Err(SatchelError::TransitionTimeout { waited_ms, .. }) => {
                    failure::handle_timeout(&mut session, &target, waited_ms);
                    session.record_visit(&target);
                }
                Err(e) => {
                    failure::handle_failure(&mut session, &target, &e.to_string());
                    session.record_visit(&target);
                }
            }

            self.store.save(&session).await?;

            since_progress += 1;
            if since_progress >= self.progress_interval {
                since_progress = 0;
                let stats = session.queue.stats();
                info!(
                    "progress: {} pages visited, {}/{} queue items done ({:.0}%), {} artifacts",
                    session.counters.pages_visited,
                    stats.visited,
                    stats.total,
                    stats.progress_pct,
                    session.artifacts.len()
                );
            }
        }
    }

    /// Requests one page transition and waits for its delivery
    async fn navigate(&self, target: &str, timeout_ms: u64) -> Result<PageHandle> {
        if let Some(page) = self.driver.cached(target) {
            debug!("driver already holds {}, skipping transition", target);
            return Ok(page);
        }

        self.driver.request_transition(target);

        let deadline = Duration::from_millis(timeout_ms);
        match tokio::time::timeout(deadline, self.driver.resumption(target)).await {
            Ok(result) => result,
            Err(_) => Err(SatchelError::TransitionTimeout {
                target: target.to_string(),
                waited_ms: timeout_ms,
            }),
        }
    }

    /// Scans one delivered page: classify, enqueue, merge, resolve
    async fn scan_page(
        &self,
        session: &mut CrawlSession,
        target: &str,
        page: &PageHandle,
    ) -> Result<()> {
        let elements = self.extractor.extract(page);
        let outcome = classify::scan(&elements, &self.scope);

        let mut queued = 0;
        for request in outcome.to_queue {
            if session.queue.enqueue(
                &self.scope,
                &request.target,
                request.priority,
                request.phase,
                request.metadata,
            ) {
                queued += 1;
            }
        }
        if queued > 0 {
            debug!("queued {} new page(s) from {}", queued, page.target);
        }

        let (ready, pending): (Vec<Sighting>, Vec<Sighting>) = outcome
            .sightings
            .into_iter()
            .partition(|s| !s.needs_resolution);

        let mut changed = Vec::new();
        for sighting in ready {
            let key = canonical_key_for(sighting.file_id, &sighting.location);
            let artifact = Artifact {
                canonical_key: key.clone(),
                location: sighting.location,
                title: sighting.title,
                source: sighting.source,
                confidence: sighting.confidence,
                discovered_on: page.target.clone(),
                first_seen: Utc::now(),
            };
            let merged = dedup::merge(&mut session.artifacts, &mut session.seen_locations, artifact);
            if merged != MergeOutcome::Dropped {
                if let Some(record) = session.artifacts.get(&key) {
                    changed.push(record.clone());
                }
            }
        }

        // Pending sightings whose location was already attempted, or whose
        // document is already on record, are finished business.
        let pending: Vec<Sighting> = pending
            .into_iter()
            .filter(|s| !session.seen_locations.contains(&s.location))
            .filter(|s| {
                let key = canonical_key_for(s.file_id, &s.location);
                !session.artifacts.contains_key(&key)
            })
            .collect();

        if !pending.is_empty() {
            debug!(
                "resolving {} pending sighting(s) from {}",
                pending.len(),
                page.target
            );
            let attempted: Vec<String> = pending.iter().map(|s| s.location.clone()).collect();
            let resolved = self.pool.resolve_batch(&page.target, pending, &self.scope).await;

            if self.stop_requested() {
                // Leave the page unvisited and the locations unseen; the
                // resumed run redoes this tick from scratch.
                debug!(
                    "stop requested during resolution, discarding {} result(s)",
                    resolved.len()
                );
                return Ok(());
            }

            for artifact in resolved {
                let key = artifact.canonical_key.clone();
                let merged =
                    dedup::merge(&mut session.artifacts, &mut session.seen_locations, artifact);
                if merged != MergeOutcome::Dropped {
                    if let Some(record) = session.artifacts.get(&key) {
                        changed.push(record.clone());
                    }
                }
            }

            // Attempted locations stay seen whether they resolved or not;
            // unresolvable indirections are never retried.
            for location in attempted {
                session.seen_locations.insert(location);
            }
        }

        session.record_visit(target);
        if page.target != target {
            // the post-redirect address is an alias of the queued one
            session.queue.mark_visited(&page.target);
        }

        if !changed.is_empty() {
            let event = ReportEvent::ArtifactsFound {
                page: page.target.clone(),
                artifacts: changed,
            };
            if let Err(e) = self.sink.emit(&event).await {
                warn!("report sink failed: {}", e);
            }
        }
        Ok(())
    }

    /// Establishes the session this run operates on
    ///
    /// Fresh mode discards any stored session first. A stored session for a
    /// different root is discarded with a warning. An active or stopped
    /// session is resumed; stopped ones are reactivated. Completed and
    /// failed sessions are terminal, a new session replaces them. Resume
    /// mode refuses to create anything new.
    async fn initialize(&self, mode: CrawlMode) -> Result<()> {
        if matches!(mode, CrawlMode::Fresh) {
            debug!("fresh start requested, clearing any stored session");
            self.store.clear().await?;
        }

        let session = match self.store.peek().await? {
            Some(session) if session.root_id != self.store.root_id() => {
                warn!(
                    "stored session {} belongs to root '{}', discarding",
                    session.session_id, session.root_id
                );
                self.store.clear().await?;
                if matches!(mode, CrawlMode::Resume) {
                    return Err(self.no_session());
                }
                self.new_session()?
            }
            Some(session) if session.is_active => {
                info!(
                    "resuming session {} ({} pages visited, {} artifacts)",
                    session.session_id,
                    session.counters.pages_visited,
                    session.artifacts.len()
                );
                self.adopt_limits(session)
            }
            Some(mut session) if session.completion == CompletionStatus::Stopped => {
                info!("reactivating stopped session {}", session.session_id);
                session.is_active = true;
                session.completion = CompletionStatus::InProgress;
                self.adopt_limits(session)
            }
            Some(session) => {
                info!(
                    "previous session {} ended as {}, starting over",
                    session.session_id, session.completion
                );
                if matches!(mode, CrawlMode::Resume) {
                    return Err(self.no_session());
                }
                self.store.clear().await?;
                self.new_session()?
            }
            None => {
                if matches!(mode, CrawlMode::Resume) {
                    return Err(self.no_session());
                }
                self.new_session()?
            }
        };

        self.store.save(&session).await?;
        Ok(())
    }

    /// Refreshes session limits when the configuration changed under it
    fn adopt_limits(&self, mut session: CrawlSession) -> CrawlSession {
        if session.config_hash != self.config_hash {
            info!("configuration changed since the session started, adopting current limits");
            session.limits = self.limits;
            session.config_hash = self.config_hash.clone();
        }
        session
    }

    /// Creates a new session seeded with the configured entry points
    fn new_session(&self) -> Result<CrawlSession> {
        let mut session = CrawlSession::new(self.store.root_id(), self.limits, &self.config_hash);

        for entry in &self.entry_points {
            let url = self.scope.entry_target(&entry.path)?;
            let mut metadata = BTreeMap::new();
            metadata.insert("origin".to_string(), "entry-point".to_string());
            session
                .queue
                .enqueue(&self.scope, url.as_str(), entry.priority, entry.phase, metadata);
        }

        if session.queue.is_empty() {
            return Err(ConfigError::Validation(
                "No entry point survived normalization; nothing to crawl".to_string(),
            )
            .into());
        }

        info!(
            "created session {} for root '{}' with {} entry point(s)",
            session.session_id,
            session.root_id,
            session.queue.len()
        );
        Ok(session)
    }

    async fn load_required(&self) -> Result<CrawlSession> {
        self.store.load().await?.ok_or_else(|| self.no_session())
    }

    fn no_session(&self) -> SatchelError {
        SatchelError::NoSession {
            root: self.store.root_id().to_string(),
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Emits the final report and hands it back
    async fn complete(&self, session: CrawlSession) -> Result<CrawlReport> {
        let report = CrawlReport::from_session(&session);
        let event = ReportEvent::CrawlComplete {
            report: report.clone(),
        };
        if let Err(e) = self.sink.emit(&event).await {
            warn!("report sink failed: {}", e);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::Fetcher;
    use crate::crawler::pool::Pacer;
    use crate::extract::HtmlExtractor;
    use crate::queue::Phase;
    use crate::report::LogSink;
    use crate::storage::{KvBackend, MemoryKv};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex;

    const BASE: &str = "https://lms.example.edu/courses/101";

    struct ScriptedDriver {
        pages: HashMap<String, String>,
        requested: StdMutex<Vec<String>>,
    }

    impl ScriptedDriver {
        fn new(pages: Vec<(&str, &str)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(t, b)| (t.to_string(), b.to_string()))
                    .collect(),
                requested: StdMutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransitionDriver for ScriptedDriver {
        fn request_transition(&self, target: &str) {
            self.requested.lock().unwrap().push(target.to_string());
        }

        async fn resumption(&self, target: &str) -> Result<PageHandle> {
            match self.pages.get(target) {
                Some(body) => Ok(PageHandle {
                    target: target.to_string(),
                    body: body.clone(),
                }),
                None => Err(SatchelError::Fetch {
                    target: target.to_string(),
                    message: "HTTP 404".to_string(),
                }),
            }
        }

        fn cached(&self, _target: &str) -> Option<PageHandle> {
            None
        }
    }

    fn crawler_config(max_attempts: u32, max_retries: u32) -> CrawlerConfig {
        CrawlerConfig {
            max_navigation_attempts: max_attempts,
            max_retries,
            navigation_timeout_ms: 5_000,
            fetch_timeout_ms: 5_000,
            resolver_concurrency: 2,
            politeness_delay_ms: 0,
            progress_interval: 10,
        }
    }

    fn entry(path: &str) -> EntryPoint {
        EntryPoint {
            path: path.to_string(),
            priority: 0,
            phase: Phase::Index,
        }
    }

    fn navigator(
        backend: Arc<dyn KvBackend>,
        driver: Arc<ScriptedDriver>,
        config: &CrawlerConfig,
        config_hash: &str,
        stop: watch::Receiver<bool>,
    ) -> Navigator {
        let scope = CrawlScope::new(BASE, "course-101").unwrap();
        let pacer = Arc::new(Mutex::new(Pacer::new(0)));
        Navigator::new(
            scope,
            SessionStore::new(backend, "course-101"),
            driver,
            Arc::new(HtmlExtractor::new()),
            ResolverPool::new(Fetcher::new(reqwest::Client::new()), 2, pacer),
            Arc::new(LogSink::new()),
            stop,
            config,
            vec![entry("files")],
            config_hash,
        )
    }

    fn fixture_pages() -> Vec<(&'static str, &'static str)> {
        vec![
            (
                "https://lms.example.edu/courses/101/files",
                r#"<html><body>
                    <a href="/files/7">Week 1 Handout</a>
                    <a href="/courses/101/syllabus.pdf">Syllabus</a>
                    <a href="/courses/101/modules">Modules</a>
                </body></html>"#,
            ),
            (
                "https://lms.example.edu/courses/101/modules",
                r#"<html><body>
                    <a href="/courses/101/modules/3">Week 3</a>
                </body></html>"#,
            ),
            (
                "https://lms.example.edu/courses/101/modules/3",
                r#"<html><body><p>nothing here</p></body></html>"#,
            ),
        ]
    }

    #[tokio::test]
    async fn test_full_crawl_collects_artifacts() {
        let backend = Arc::new(MemoryKv::new());
        let driver = Arc::new(ScriptedDriver::new(fixture_pages()));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let config = crawler_config(100, 5);
        let nav = navigator(backend, driver.clone(), &config, "hash-1", stop_rx);

        let report = nav.run(CrawlMode::Auto).await.unwrap();

        assert_eq!(report.completion, CompletionStatus::Completed);
        assert_eq!(report.pages_visited, 3);
        assert!(report.failed_targets.is_empty());

        let keys: Vec<&str> = report.artifacts.iter().map(|a| a.canonical_key.as_str()).collect();
        assert!(keys.contains(&"file:7"));
        assert!(keys.contains(&"https://lms.example.edu/courses/101/syllabus.pdf"));

        let handout = report
            .artifacts
            .iter()
            .find(|a| a.canonical_key == "file:7")
            .unwrap();
        assert_eq!(handout.location, "https://lms.example.edu/files/7/download");
        assert_eq!(handout.title, "Week 1 Handout");
    }

    #[tokio::test]
    async fn test_scan_results_persisted_mid_crawl() {
        let backend: Arc<MemoryKv> = Arc::new(MemoryKv::new());
        let driver = Arc::new(ScriptedDriver::new(vec![(
            "https://lms.example.edu/courses/101/index",
            r#"<html><body>
                <a href="/files/7">Problem Set 1</a>
                <a href="/courses/101/detail/1">First</a>
                <a href="/courses/101/detail/2">Second</a>
            </body></html>"#,
        )]));
        let (_stop_tx, stop_rx) = watch::channel(false);

        // One navigation allowed: the run suspends right after the first scan.
        let config = crawler_config(1, 5);
        let scope = CrawlScope::new(BASE, "course-101").unwrap();
        let pacer = Arc::new(Mutex::new(Pacer::new(0)));
        let nav = Navigator::new(
            scope,
            SessionStore::new(backend.clone(), "course-101"),
            driver,
            Arc::new(HtmlExtractor::new()),
            ResolverPool::new(Fetcher::new(reqwest::Client::new()), 2, pacer),
            Arc::new(LogSink::new()),
            stop_rx,
            &config,
            vec![
                EntryPoint {
                    path: "index".to_string(),
                    priority: 1,
                    phase: Phase::Index,
                },
                EntryPoint {
                    path: "detail/1".to_string(),
                    priority: 2,
                    phase: Phase::Detail,
                },
            ],
            "hash-1",
        );

        let report = nav.run(CrawlMode::Auto).await.unwrap();
        assert_eq!(report.completion, CompletionStatus::Stopped);
        assert_eq!(report.pages_visited, 1);
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].canonical_key, "file:7");

        // The stored session carries the mid-crawl queue: the re-discovered
        // detail/1 stayed a single entry, detail/2 was newly queued.
        let store = SessionStore::new(backend, "course-101");
        let session = store.load().await.unwrap().unwrap();
        let stats = session.queue.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.visited, 1);
        assert_eq!(stats.remaining, 2);
        assert!(session.queue.is_visited(&format!("{}/index", BASE)));
        assert_eq!(
            session.queue.next_unvisited().map(|i| i.target.as_str()),
            Some(format!("{}/detail/1", BASE)).as_deref()
        );
    }

    #[tokio::test]
    async fn test_resume_continues_same_session() {
        let backend: Arc<MemoryKv> = Arc::new(MemoryKv::new());
        let (_stop_tx, stop_rx) = watch::channel(false);

        // First run is cut short by a tiny navigation attempt limit.
        let first_driver = Arc::new(ScriptedDriver::new(fixture_pages()));
        let tight = crawler_config(1, 5);
        let nav = navigator(
            backend.clone(),
            first_driver.clone(),
            &tight,
            "hash-1",
            stop_rx.clone(),
        );
        let first = nav.run(CrawlMode::Auto).await.unwrap();
        assert_eq!(first.completion, CompletionStatus::Stopped);
        assert_eq!(first.pages_visited, 1);

        // Second run under a raised limit picks the same session back up
        // and never re-visits the first page.
        let second_driver = Arc::new(ScriptedDriver::new(fixture_pages()));
        let roomy = crawler_config(100, 5);
        let nav = navigator(backend, second_driver.clone(), &roomy, "hash-2", stop_rx);
        let second = nav.run(CrawlMode::Auto).await.unwrap();

        assert_eq!(second.completion, CompletionStatus::Completed);
        assert_eq!(second.session_id, first.session_id);
        assert!(!second_driver
            .requested()
            .contains(&format!("{}/files", BASE)));
        assert_eq!(second.pages_visited, 3);
    }

    #[tokio::test]
    async fn test_stop_requested_before_first_tick() {
        let backend = Arc::new(MemoryKv::new());
        let driver = Arc::new(ScriptedDriver::new(fixture_pages()));
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send(true).unwrap();

        let config = crawler_config(100, 5);
        let nav = navigator(backend, driver.clone(), &config, "hash-1", stop_rx);
        let report = nav.run(CrawlMode::Auto).await.unwrap();

        assert_eq!(report.completion, CompletionStatus::Stopped);
        assert_eq!(report.pages_visited, 0);
        assert!(driver.requested().is_empty());
    }

    #[tokio::test]
    async fn test_failures_exhaust_retry_budget() {
        let backend = Arc::new(MemoryKv::new());
        // the entry page links to two targets the driver cannot deliver
        let driver = Arc::new(ScriptedDriver::new(vec![(
            "https://lms.example.edu/courses/101/files",
            r#"<a href="/courses/101/missing-a">A</a>
               <a href="/courses/101/missing-b">B</a>"#,
        )]));
        let (_stop_tx, stop_rx) = watch::channel(false);

        let config = crawler_config(100, 2);
        let nav = navigator(backend, driver, &config, "hash-1", stop_rx);
        let report = nav.run(CrawlMode::Auto).await.unwrap();

        assert_eq!(report.completion, CompletionStatus::Failed);
        assert_eq!(report.failed_targets.len(), 2);
        // the successfully scanned entry page still counts
        assert_eq!(report.pages_visited, 3);
    }

    #[tokio::test]
    async fn test_resume_mode_requires_stored_session() {
        let backend = Arc::new(MemoryKv::new());
        let driver = Arc::new(ScriptedDriver::new(Vec::new()));
        let (_stop_tx, stop_rx) = watch::channel(false);

        let config = crawler_config(100, 5);
        let nav = navigator(backend, driver, &config, "hash-1", stop_rx);
        let result = nav.run(CrawlMode::Resume).await;

        assert!(matches!(result, Err(SatchelError::NoSession { .. })));
    }

    #[tokio::test]
    async fn test_failed_page_not_retried_within_session() {
        let backend = Arc::new(MemoryKv::new());
        let driver = Arc::new(ScriptedDriver::new(vec![(
            "https://lms.example.edu/courses/101/files",
            r#"<a href="/courses/101/missing">Broken</a>"#,
        )]));
        let (_stop_tx, stop_rx) = watch::channel(false);

        let config = crawler_config(100, 5);
        let nav = navigator(backend, driver.clone(), &config, "hash-1", stop_rx);
        let report = nav.run(CrawlMode::Auto).await.unwrap();

        assert_eq!(report.completion, CompletionStatus::Completed);
        assert_eq!(report.failed_targets.len(), 1);
        // one transition request per target, the failed one included
        let requested = driver.requested();
        let missing = format!("{}/missing", BASE);
        assert_eq!(requested.iter().filter(|t| **t == missing).count(), 1);
    }
}

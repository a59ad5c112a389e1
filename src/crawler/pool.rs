//! Request pacing and the bounded resolution pool

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::artifact::Artifact;
use crate::classify::Sighting;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::resolver;
use crate::target::CrawlScope;
use crate::Result;

/// Ceiling for exponential backoff
const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Upper bound of the random jitter added while backed off
const JITTER_MS: u64 = 250;

/// Spacing control for outgoing requests
///
/// One pacer is shared by page navigation and resolution fetches, so the
/// minimum spacing holds across the whole process, whatever the source of
/// the request. HTTP 429 doubles the current spacing; successful fetches
/// halve it back toward the configured base.
#[derive(Debug)]
pub struct Pacer {
    base: Duration,
    current: Duration,
    ready_at: Instant,
}

impl Pacer {
    pub fn new(base_ms: u64) -> Self {
        let base = Duration::from_millis(base_ms);
        Self {
            base,
            current: base,
            ready_at: Instant::now(),
        }
    }

    /// Reserves the next fetch slot and returns when it opens
    fn reserve(&mut self) -> Instant {
        let now = Instant::now();
        let slot = self.ready_at.max(now);
        self.ready_at = slot + self.current;
        slot
    }

    /// Doubles the spacing after a rate-limit response
    pub fn backoff(&mut self) {
        self.current = (self.current * 2).min(MAX_BACKOFF);
        debug!("pacer backing off, spacing now {:?}", self.current);
    }

    /// Decays the spacing toward the base after a successful fetch
    pub fn settle(&mut self) {
        if self.current > self.base {
            self.current = std::cmp::max(self.current / 2, self.base);
        }
    }

    fn is_backed_off(&self) -> bool {
        self.current > self.base
    }
}

/// Waits for the next fetch slot
///
/// While backed off, a random jitter is added so retries from concurrent
/// resolution tasks do not land in lockstep.
pub async fn pace(pacer: &Mutex<Pacer>) {
    let (slot, backed_off) = {
        let mut p = pacer.lock().await;
        (p.reserve(), p.is_backed_off())
    };

    let mut deadline = slot;
    if backed_off {
        deadline += Duration::from_millis(rand::thread_rng().gen_range(0..=JITTER_MS));
    }
    tokio::time::sleep_until(deadline).await;
}

/// One paced fetch with a single on-the-spot retry after HTTP 429
pub(crate) async fn paced_fetch(
    fetcher: &Fetcher,
    pacer: &Mutex<Pacer>,
    target: &str,
) -> Result<FetchOutcome> {
    pace(pacer).await;
    match fetcher.fetch(target).await? {
        FetchOutcome::RateLimited => {
            pacer.lock().await.backoff();
            debug!("rate limited on {}, retrying once after backoff", target);
            pace(pacer).await;
            let outcome = fetcher.fetch(target).await?;
            match &outcome {
                FetchOutcome::RateLimited => pacer.lock().await.backoff(),
                _ => pacer.lock().await.settle(),
            }
            Ok(outcome)
        }
        outcome => {
            pacer.lock().await.settle();
            Ok(outcome)
        }
    }
}

/// Bounded concurrency for resolution fetches
///
/// Resolution work for one page runs in parallel under a small permit cap;
/// every fetch still goes through the shared pacer. Navigation stays
/// lock-step, this pool only ever runs between two navigations.
pub struct ResolverPool {
    fetcher: Fetcher,
    permits: Arc<Semaphore>,
    pacer: Arc<Mutex<Pacer>>,
}

impl ResolverPool {
    pub fn new(fetcher: Fetcher, concurrency: usize, pacer: Arc<Mutex<Pacer>>) -> Self {
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            pacer,
        }
    }

    /// Resolves a batch of pending sightings from one page
    ///
    /// Unresolvable sightings are dropped with a log line; resolution never
    /// produces errors and never charges the retry budget.
    pub async fn resolve_batch(
        &self,
        discovered_on: &str,
        pending: Vec<Sighting>,
        scope: &CrawlScope,
    ) -> Vec<Artifact> {
        let mut tasks = JoinSet::new();

        for sighting in pending {
            let permits = self.permits.clone();
            let fetcher = self.fetcher.clone();
            let pacer = self.pacer.clone();
            let scope = scope.clone();
            let discovered_on = discovered_on.to_string();

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return None;
                };
                resolver::resolve(&fetcher, &pacer, &scope, &discovered_on, sighting).await
            });
        }

        let mut resolved = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(artifact)) => resolved.push(artifact),
                Ok(None) => {}
                Err(e) => warn!("resolution task failed: {}", e),
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_spaces_slots() {
        let mut pacer = Pacer::new(100);
        let first = pacer.reserve();
        let second = pacer.reserve();
        assert!(second >= first + Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut pacer = Pacer::new(500);
        for _ in 0..12 {
            pacer.backoff();
        }
        assert_eq!(pacer.current, MAX_BACKOFF);
        assert!(pacer.is_backed_off());
    }

    #[test]
    fn test_settle_decays_to_base() {
        let mut pacer = Pacer::new(500);
        pacer.backoff();
        pacer.backoff();
        assert_eq!(pacer.current, Duration::from_millis(2000));

        pacer.settle();
        assert_eq!(pacer.current, Duration::from_millis(1000));
        pacer.settle();
        assert_eq!(pacer.current, Duration::from_millis(500));
        pacer.settle();
        assert_eq!(pacer.current, Duration::from_millis(500));
        assert!(!pacer.is_backed_off());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_enforces_spacing() {
        let pacer = Mutex::new(Pacer::new(200));
        let started = Instant::now();
        pace(&pacer).await;
        pace(&pacer).await;
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_resolve_batch_empty() {
        let fetcher = Fetcher::new(reqwest::Client::new());
        let pacer = Arc::new(Mutex::new(Pacer::new(0)));
        let pool = ResolverPool::new(fetcher, 2, pacer);
        let scope = CrawlScope::new("http://127.0.0.1:1/courses/1", "c1").unwrap();

        let resolved = pool
            .resolve_batch("http://127.0.0.1:1/courses/1", Vec::new(), &scope)
            .await;
        assert!(resolved.is_empty());
    }
}

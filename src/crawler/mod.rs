//! The crawl engine
//!
//! A crawl is a sequence of page transitions, and each transition tears down
//! the execution context that requested it. The engine is split accordingly:
//! - a [`TransitionDriver`] performs one transition and delivers the page to
//!   whatever context comes up on the other side,
//! - the [`Navigator`] loop persists the session around every transition so
//!   that no correctness depends on surviving one,
//! - a [`ResolverPool`] chases indirect artifact references concurrently
//!   between transitions.

pub mod failure;
pub mod fetcher;
pub mod navigator;
pub mod pool;
pub mod resolver;

pub use fetcher::{build_http_client, FetchOutcome, Fetcher, HttpDriver};
pub use navigator::Navigator;
pub use pool::{Pacer, ResolverPool};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use crate::config::Config;
use crate::extract::{HtmlExtractor, PageHandle};
use crate::report::{CompositeSink, CrawlReport, LogSink};
use crate::session::SessionStore;
use crate::storage::SqliteKv;
use crate::target::CrawlScope;
use crate::Result;

/// How a crawl run relates to previously stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Resume a stored session when one exists, otherwise start fresh
    Auto,
    /// Discard any stored session and start over
    Fresh,
    /// Refuse to run unless a resumable session is stored
    Resume,
}

/// Performs page transitions
///
/// `request_transition` starts a transition and returns immediately; the
/// caller must assume its execution context is about to be torn down.
/// `resumption` is awaited from the context that comes up afterwards and
/// yields the delivered page. `cached` lets a driver short-circuit the
/// transition when it already holds the target.
#[async_trait]
pub trait TransitionDriver: Send + Sync {
    fn request_transition(&self, target: &str);

    async fn resumption(&self, target: &str) -> Result<PageHandle>;

    fn cached(&self, target: &str) -> Option<PageHandle>;
}

/// Runs one crawl to a terminal status
///
/// Wires the HTTP driver, resolver pool, session store, and report sinks
/// from the configuration and hands control to the [`Navigator`].
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
/// * `config_hash` - Digest of the configuration file, stored with the session
/// * `mode` - How to treat previously stored session state
/// * `stop` - Receiver flipped to `true` to request a graceful stop
///
/// # Returns
///
/// The final crawl report; inspect its completion status to tell a finished
/// crawl from a suspended or failed one.
pub async fn crawl(
    config: &Config,
    config_hash: &str,
    mode: CrawlMode,
    stop: watch::Receiver<bool>,
) -> Result<CrawlReport> {
    let scope = CrawlScope::new(&config.root.base_url, &config.root.root_id)?;

    let backend = Arc::new(SqliteKv::open(Path::new(&config.output.database_path))?);
    let store = SessionStore::new(backend, &config.root.root_id);

    let client = build_http_client(&config.user_agent, config.crawler.fetch_timeout_ms)?;
    let fetcher = Fetcher::new(client);
    let pacer = Arc::new(Mutex::new(Pacer::new(config.crawler.politeness_delay_ms)));

    let driver = Arc::new(HttpDriver::new(fetcher.clone(), pacer.clone()));
    let pool = ResolverPool::new(fetcher, config.crawler.resolver_concurrency, pacer);
    let sink = Arc::new(CompositeSink::new(vec![Box::new(LogSink::new())]));

    let navigator = Navigator::new(
        scope,
        store,
        driver,
        Arc::new(HtmlExtractor::new()),
        pool,
        sink,
        stop,
        &config.crawler,
        config.root.entry_points.clone(),
        config_hash,
    );
    navigator.run(mode).await
}

use crate::queue::Phase;
use crate::session::Limits;
use serde::Deserialize;

/// Main configuration structure for Satchel
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub root: RootConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// The root container the crawl is confined to
#[derive(Debug, Clone, Deserialize)]
pub struct RootConfig {
    /// Stable identifier of the root container (e.g. "course-101")
    #[serde(rename = "root-id")]
    pub root_id: String,

    /// Base URL of the root container; the crawl never leaves it
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Pages the crawl starts from, resolved against the base URL
    #[serde(rename = "entry-points")]
    pub entry_points: Vec<EntryPoint>,
}

/// One configured starting page
#[derive(Debug, Clone, Deserialize)]
pub struct EntryPoint {
    /// Path relative to the base URL, or absolute from the host root
    pub path: String,

    /// Queue priority; lower values are visited first
    #[serde(default)]
    pub priority: u32,

    /// Crawl phase the page belongs to
    #[serde(default = "default_phase")]
    pub phase: Phase,
}

fn default_phase() -> Phase {
    Phase::Index
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Hard cap on page transitions for one session, across resumes
    #[serde(rename = "max-navigation-attempts")]
    pub max_navigation_attempts: u32,

    /// Navigation failures tolerated before the session fails
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// How long to wait for one page transition to deliver (milliseconds)
    #[serde(rename = "navigation-timeout-ms")]
    pub navigation_timeout_ms: u64,

    /// Per-request HTTP timeout (milliseconds)
    #[serde(rename = "fetch-timeout-ms")]
    pub fetch_timeout_ms: u64,

    /// Concurrent auxiliary fetches while resolving indirect references
    #[serde(rename = "resolver-concurrency")]
    pub resolver_concurrency: usize,

    /// Minimum spacing between requests to the host (milliseconds)
    #[serde(rename = "politeness-delay-ms")]
    pub politeness_delay_ms: u64,

    /// Pages between progress log lines
    #[serde(rename = "progress-interval")]
    pub progress_interval: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_navigation_attempts: 500,
            max_retries: 5,
            navigation_timeout_ms: 30_000,
            fetch_timeout_ms: 15_000,
            resolver_concurrency: 2,
            politeness_delay_ms: 500,
            progress_interval: 10,
        }
    }
}

impl CrawlerConfig {
    /// The subset of this configuration persisted with the session
    pub fn limits(&self) -> Limits {
        Limits {
            max_navigation_attempts: self.max_navigation_attempts,
            max_retries: self.max_retries,
            navigation_timeout_ms: self.navigation_timeout_ms,
        }
    }
}

/// User agent identification configuration
///
/// Name and version default to the crate's; the contact fields have no
/// usable default and validation insists on them, so operators identify
/// themselves to the site they crawl.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub name: String,

    /// Version of the crawler
    pub version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "satchel".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
            contact_email: String::new(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file holding the session
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "satchel.db".to_string(),
            summary_path: "crawl-summary.md".to_string(),
        }
    }
}

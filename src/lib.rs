//! Satchel: a resumable document harvester
//!
//! This crate implements a stateful site crawler that discovers downloadable
//! document artifacts (PDFs) scattered across a multi-page web application.
//! Every page navigation is treated as a full teardown of the crawler's
//! execution context, so progress is persisted externally and the crawl
//! resumes purely from stored state.

pub mod artifact;
pub mod classify;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod queue;
pub mod report;
pub mod session;
pub mod storage;
pub mod target;

use thiserror::Error;

/// Main error type for Satchel operations
#[derive(Debug, Error)]
pub enum SatchelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid target: {0}")]
    Target(#[from] TargetError),

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Navigation to {target} timed out after {waited_ms}ms")]
    TransitionTimeout { target: String, waited_ms: u64 },

    #[error("Fetch of {target} failed: {message}")]
    Fetch { target: String, message: String },

    #[error("Retry budget exhausted after {retries} navigation failures")]
    RetryBudgetExhausted { retries: u32 },

    #[error("Stored session belongs to root '{found}', expected '{expected}'")]
    StaleSession { expected: String, found: String },

    #[error("No resumable session for root '{root}'")]
    NoSession { root: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Target-normalization errors
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Unsubstituted template marker in: {0}")]
    TemplateMarker(String),
}

/// Result type alias for Satchel operations
pub type Result<T> = std::result::Result<T, SatchelError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for target normalization
pub type TargetResult<T> = std::result::Result<T, TargetError>;

// Re-export commonly used types
pub use artifact::{Artifact, SourceType};
pub use config::Config;
pub use report::CrawlReport;
pub use session::{CompletionStatus, CrawlSession};
pub use target::{normalize_target, CrawlScope};

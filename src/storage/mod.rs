//! Persistence backends
//!
//! The crawler persists exactly one kind of state: the serialized
//! [`CrawlSession`](crate::session::CrawlSession) blob. The backend contract
//! is therefore a minimal async key-value store; [`SqliteKv`] is the durable
//! implementation and [`MemoryKv`] backs tests.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for persistence operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Async key-value persistence over JSON-serializable blobs
///
/// Implementations must be safe to share behind an `Arc` across tasks; the
/// crawler itself is a single writer, but CLI tooling may read concurrently.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Returns the stored value for `key`, or `None` if absent
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, overwriting any previous value
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`; removing an absent key is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

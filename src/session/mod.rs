//! Crawl session persistence
//!
//! The [`CrawlSession`] record is the single unit of persisted state for one
//! crawl run and the only shared mutable resource in the system. The
//! navigator is its single writer: every tick loads it, mutates it, and
//! writes it back before the next navigation can tear the process down.

pub mod record;
pub mod store;

pub use record::{CompletionStatus, Counters, CrawlSession, FailureRecord, Limits};
pub use store::{SessionStore, SESSION_KEY};

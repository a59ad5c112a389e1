//! Session store: load/save/clear for the persisted session blob

use crate::session::CrawlSession;
use crate::storage::{KvBackend, StoreError};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key under which the session blob is stored
pub const SESSION_KEY: &str = "crawl-session";

/// The only component with I/O to the persistence layer
///
/// A store is bound to one root container id. [`SessionStore::load`] applies
/// the stale-session guard: a stored session for a different root is treated
/// as "no resumable session" and left in place for the caller to clear
/// explicitly.
pub struct SessionStore {
    backend: Arc<dyn KvBackend>,
    root_id: String,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KvBackend>, root_id: &str) -> Self {
        Self {
            backend,
            root_id: root_id.to_string(),
        }
    }

    /// The root container id this store is bound to
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Loads the session for this store's root container
    ///
    /// # Returns
    ///
    /// * `Ok(Some(session))` - A session for the bound root exists
    /// * `Ok(None)` - No session is stored, or the stored one belongs to a
    ///   different root (stale-session guard)
    /// * `Err(_)` - The backend failed or the blob is corrupt
    pub async fn load(&self) -> Result<Option<CrawlSession>> {
        let Some(session) = self.peek().await? else {
            return Ok(None);
        };

        if session.root_id != self.root_id {
            warn!(
                "stored session {} belongs to root '{}', expected '{}'; treating as no resumable session",
                session.session_id, session.root_id, self.root_id
            );
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Loads whatever session is stored, regardless of root container
    ///
    /// Used by CLI tooling and the fresh-start path, which must see stale
    /// sessions in order to discard them explicitly.
    pub async fn peek(&self) -> Result<Option<CrawlSession>> {
        let Some(blob) = self.backend.get(SESSION_KEY).await? else {
            return Ok(None);
        };
        let session: CrawlSession =
            serde_json::from_str(&blob).map_err(StoreError::Serialize)?;
        Ok(Some(session))
    }

    /// Persists the session, replacing any previous blob
    pub async fn save(&self, session: &CrawlSession) -> Result<()> {
        let blob = serde_json::to_string(session).map_err(StoreError::Serialize)?;
        self.backend.set(SESSION_KEY, &blob).await?;
        debug!(
            "persisted session {} ({} queued, {} visited, {} artifacts)",
            session.session_id,
            session.queue.len(),
            session.queue.visited_set().len(),
            session.artifacts.len()
        );
        Ok(())
    }

    /// Removes the stored session
    pub async fn clear(&self) -> Result<()> {
        self.backend.delete(SESSION_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{CompletionStatus, CrawlSession, Limits};
    use crate::storage::MemoryKv;

    fn limits() -> Limits {
        Limits {
            max_navigation_attempts: 100,
            max_retries: 5,
            navigation_timeout_ms: 30_000,
        }
    }

    fn store_for(root: &str) -> SessionStore {
        SessionStore::new(Arc::new(MemoryKv::new()), root)
    }

    #[tokio::test]
    async fn test_load_when_empty() {
        let store = store_for("course-101");
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = store_for("course-101");
        let mut session = CrawlSession::new("course-101", limits(), "hash");
        session.counters.navigation_attempts = 7;
        store.save(&session).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn test_stale_root_returns_none() {
        let backend = Arc::new(MemoryKv::new());
        let old_store = SessionStore::new(backend.clone(), "course-101");
        old_store
            .save(&CrawlSession::new("course-101", limits(), "hash"))
            .await
            .unwrap();

        let new_store = SessionStore::new(backend, "course-202");
        assert!(new_store.load().await.unwrap().is_none());
        // The stale blob is still there until cleared explicitly
        assert!(new_store.peek().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_removes_session() {
        let store = store_for("course-101");
        store
            .save(&CrawlSession::new("course-101", limits(), "hash"))
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert!(store.peek().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous() {
        let store = store_for("course-101");
        let mut session = CrawlSession::new("course-101", limits(), "hash");
        store.save(&session).await.unwrap();
        session.finish(CompletionStatus::Completed);
        store.save(&session).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.completion, CompletionStatus::Completed);
        assert!(!loaded.is_active);
    }
}

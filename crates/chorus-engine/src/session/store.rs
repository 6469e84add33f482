//! Process-wide session registry keyed by session id, with idle-TTL eviction.
//! Grounded on the teacher's `SessionStore` (an explicitly-initialized,
//! single-writer-from-the-HTTP-handler registry) but backed by `moka`'s
//! time-to-idle cache instead of a database, since this spec's sessions are
//! purely in-memory (§4.1 "no persistence requirement").

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::session::session::{EventSink, Session};

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

pub struct SessionStore {
    cache: Cache<String, Arc<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_idle(idle_ttl).build();
        Self { cache }
    }

    /// Mint a fresh session and register it.
    pub async fn create(&self) -> Arc<Session> {
        let session = Session::new(uuid::Uuid::new_v4().to_string());
        self.cache.insert(session.session_id().to_string(), session.clone()).await;
        session
    }

    /// Fetch an existing session by id, refreshing its idle timer.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.cache.get(session_id).await
    }

    /// Explicit deletion, e.g. after an operator-triggered reset.
    pub async fn remove(&self, session_id: &str) {
        self.cache.invalidate(session_id).await;
    }

    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let store = SessionStore::new();
        let session = store.create().await;
        let id = session.session_id().to_string();
        let fetched = store.get(&id).await.expect("session present");
        assert_eq!(fetched.session_id(), id);
    }

    #[tokio::test]
    async fn unknown_session_returns_none() {
        let store = SessionStore::new();
        assert!(store.get("does-not-exist").await.is_none());
    }

    #[tokio::test]
    async fn remove_evicts_session() {
        let store = SessionStore::new();
        let session = store.create().await;
        let id = session.session_id().to_string();
        store.remove(&id).await;
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn idle_ttl_expires_stale_sessions() {
        let store = SessionStore::with_idle_ttl(Duration::from_millis(20));
        let session = store.create().await;
        let id = session.session_id().to_string();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get(&id).await.is_none());
    }
}

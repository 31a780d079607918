use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::AppError, storage::types::indexed_document::IndexedDocument, utils::config::AppConfig,
};

/// A live session: the document it serves and when it was last used.
///
/// Only `last_access` ever changes after creation; the document itself is
/// shared read-only.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub document: Arc<IndexedDocument>,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

impl SessionRecord {
    fn is_expired(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        now.signed_duration_since(self.last_access) > timeout
    }
}

/// Process-wide map from session id to its indexed document.
///
/// Every map operation (create, touch, remove, sweep) takes the same lock,
/// so a touch either fully precedes or fully follows a sweep pass.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    timeout: TimeDelta,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout: TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Duration::from_secs(config.session_timeout_secs))
    }

    pub const fn timeout(&self) -> TimeDelta {
        self.timeout
    }

    /// Stores a fully built document under a fresh id and returns the id.
    pub async fn create(&self, document: IndexedDocument) -> String {
        self.create_at(document, Utc::now()).await
    }

    pub async fn create_at(&self, document: IndexedDocument, now: DateTime<Utc>) -> String {
        let document = Arc::new(document);
        let mut sessions = self.sessions.lock().await;

        let session_id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        debug!(%session_id, chunk_count = document.len(), "Creating session");
        sessions.insert(
            session_id.clone(),
            SessionRecord {
                session_id: session_id.clone(),
                document,
                created_at: now,
                last_access: now,
            },
        );

        session_id
    }

    /// Refreshes `last_access` and returns the session, or `SessionNotFound`.
    pub async fn touch_and_get(&self, session_id: &str) -> Result<SessionRecord, AppError> {
        self.touch_and_get_at(session_id, Utc::now()).await
    }

    pub async fn touch_and_get_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, AppError> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

        if now > record.last_access {
            record.last_access = now;
        }

        Ok(record.clone())
    }

    /// Drops a session immediately. Returns whether it existed.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Removes every session idle for longer than `timeout` as of `now`.
    /// Returns how many were removed.
    pub async fn sweep(&self, now: DateTime<Utc>, timeout: TimeDelta) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now, timeout));
        before.saturating_sub(sessions.len())
    }

    /// Sweeps with the store's own timeout against the current time.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep(Utc::now(), self.timeout).await
    }

    /// Runs `sweep_expired` every `every` until `shutdown` is cancelled.
    /// The first pass happens immediately.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(every.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("Session sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired().await;
                        if removed > 0 {
                            info!(removed, "Cleaned up expired sessions");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{types::text_chunk::TextChunk, vector_index::VectorIndex};

    fn document(texts: &[&str]) -> IndexedDocument {
        let chunks = TextChunk::from_texts(texts.iter().map(|t| (*t).to_string()));
        let mut index = VectorIndex::new();
        let vectors: Vec<Vec<f32>> = (0..texts.len()).map(|i| vec![i as f32]).collect();
        index.add(&vectors).expect("add vectors");
        IndexedDocument::new(chunks, index).expect("document")
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn create_then_touch_returns_the_document() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create_at(document(&["alpha", "beta"]), t0()).await;

        let record = store
            .touch_and_get_at(&id, t0() + TimeDelta::seconds(5))
            .await
            .expect("session");

        assert_eq!(record.session_id, id);
        assert_eq!(record.document.len(), 2);
        assert_eq!(record.created_at, t0());
        assert_eq!(record.last_access, t0() + TimeDelta::seconds(5));
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let store = SessionStore::new(Duration::from_secs(60));
        let first = store.create(document(&["a"])).await;
        let second = store.create(document(&["a"])).await;

        assert_ne!(first, second);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = SessionStore::new(Duration::from_secs(60));

        let result = store.touch_and_get("missing").await;

        assert!(matches!(result, Err(AppError::SessionNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn session_survives_until_timeout_and_is_swept_after() {
        let timeout = TimeDelta::seconds(100);
        let store = SessionStore::new(Duration::from_secs(100));
        let id = store.create_at(document(&["alpha"]), t0()).await;

        let removed = store
            .sweep(t0() + timeout - TimeDelta::seconds(1), timeout)
            .await;
        assert_eq!(removed, 0);
        assert!(store.contains(&id).await);

        let removed = store
            .sweep(t0() + timeout + TimeDelta::seconds(1), timeout)
            .await;
        assert_eq!(removed, 1);
        assert!(!store.contains(&id).await);
    }

    #[tokio::test]
    async fn touch_extends_lifetime() {
        let timeout = TimeDelta::seconds(100);
        let store = SessionStore::new(Duration::from_secs(100));
        let id = store.create_at(document(&["alpha"]), t0()).await;

        store
            .touch_and_get_at(&id, t0() + TimeDelta::seconds(90))
            .await
            .expect("touch");
        store.sweep(t0() + TimeDelta::seconds(150), timeout).await;

        assert!(store.contains(&id).await);
    }

    #[tokio::test]
    async fn expired_session_cannot_be_resurrected() {
        let timeout = TimeDelta::seconds(10);
        let store = SessionStore::new(Duration::from_secs(10));
        let id = store.create_at(document(&["alpha"]), t0()).await;

        store.sweep(t0() + TimeDelta::seconds(11), timeout).await;
        let result = store
            .touch_and_get_at(&id, t0() + TimeDelta::seconds(12))
            .await;

        assert!(matches!(result, Err(AppError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn sweep_only_removes_idle_sessions() {
        let timeout = TimeDelta::seconds(10);
        let store = SessionStore::new(Duration::from_secs(10));
        let stale = store.create_at(document(&["old"]), t0()).await;
        let fresh = store
            .create_at(document(&["new"]), t0() + TimeDelta::seconds(8))
            .await;

        let removed = store.sweep(t0() + TimeDelta::seconds(15), timeout).await;

        assert_eq!(removed, 1);
        assert!(!store.contains(&stale).await);
        assert!(store.contains(&fresh).await);
    }

    #[tokio::test]
    async fn explicit_removal() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create(document(&["alpha"])).await;

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn touch_and_sweep_never_interleave() {
        let timeout = TimeDelta::seconds(10);
        let created = Utc::now();
        let now = created + TimeDelta::seconds(11);

        for _ in 0..50 {
            let store = Arc::new(SessionStore::new(Duration::from_secs(10)));
            let id = store.create_at(document(&["alpha"]), created).await;

            // Touching at `now` keeps the session; sweeping first expires it.
            let touches: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let id = id.clone();
                    tokio::spawn(async move { store.touch_and_get_at(&id, now).await.is_ok() })
                })
                .collect();
            let sweep = {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.sweep(now, timeout).await })
            };

            let touched: Vec<bool> = futures::future::join_all(touches)
                .await
                .into_iter()
                .map(|result| result.expect("join"))
                .collect();
            let removed = sweep.await.expect("join");
            let present = store.contains(&id).await;

            match removed {
                0 => {
                    assert!(touched.iter().all(|ok| *ok), "survivor must serve every touch");
                    assert!(present);
                }
                1 => {
                    assert!(touched.iter().all(|ok| !*ok), "expired session must not be touched");
                    assert!(!present);
                }
                other => panic!("sweep removed {other} sessions from a store of one"),
            }
        }
    }

    #[tokio::test]
    async fn background_sweeper_expires_idle_sessions_and_stops_on_shutdown() {
        let store = Arc::new(SessionStore::new(Duration::from_millis(1)));
        let id = store.create(document(&["alpha"])).await;
        let shutdown = CancellationToken::new();

        let handle = store.spawn_sweeper(Duration::from_millis(10), shutdown.clone());

        let mut swept = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !store.contains(&id).await {
                swept = true;
                break;
            }
        }
        assert!(swept, "idle session should be removed by the sweeper");

        shutdown.cancel();
        handle.await.expect("sweeper exits cleanly");
    }
}

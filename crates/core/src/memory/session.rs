use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use tokio::time::Instant;
use tracing::debug;

use crate::{
    config::MemoryConfig,
    memory::window::{TurnPair, TurnWindow},
    types::ConversationTurn,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub video_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            video_id: video_id.into(),
        }
    }

    /// Returns `None` for anonymous callers, whose turns are never kept.
    pub fn for_user(user_id: Option<&str>, video_id: &str) -> Option<Self> {
        let user_id = user_id.map(str::trim).filter(|id| !id.is_empty())?;
        Some(Self::new(user_id, video_id))
    }
}

/// Conversation windows keyed by (user, video). All operations take one
/// lock, so concurrent appends to a session cannot interleave and
/// eviction happens together with insertion.
#[derive(Debug)]
pub struct SessionMemoryStore {
    config: MemoryConfig,
    sessions: Mutex<HashMap<SessionKey, TurnWindow>>,
}

impl SessionMemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config: MemoryConfig {
                capacity_pairs: config.capacity_pairs.max(1),
                ..config
            },
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity_pairs
    }

    pub fn append(
        &self,
        key: &SessionKey,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) {
        let mut sessions = self.lock_sessions();
        let capacity = self.config.capacity_pairs;
        let window = sessions
            .entry(key.clone())
            .or_insert_with(|| TurnWindow::new(capacity));
        let evicted = window.push_overwrite(TurnPair {
            user: user_text.into(),
            assistant: assistant_text.into(),
        });
        if evicted.is_some() {
            debug!(user_id = %key.user_id, video_id = %key.video_id, "evicted oldest turn pair");
        }
    }

    pub fn read(&self, key: &SessionKey) -> Vec<ConversationTurn> {
        let mut sessions = self.lock_sessions();
        match sessions.get_mut(key) {
            Some(window) => {
                window.touch();
                window.turns()
            }
            None => Vec::new(),
        }
    }

    /// Removes one session. Returns whether it existed.
    pub fn clear(&self, key: &SessionKey) -> bool {
        self.lock_sessions().remove(key).is_some()
    }

    /// Drops every session.
    pub fn reset(&self) {
        self.lock_sessions().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, TurnWindow>> {
        let mut guard = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(ttl) = self.config.idle_ttl() {
            let now = Instant::now();
            guard.retain(|_, window| now.saturating_duration_since(window.idle_since()) <= ttl);
        }
        guard
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    fn store(capacity: usize) -> SessionMemoryStore {
        SessionMemoryStore::new(MemoryConfig {
            capacity_pairs: capacity,
            idle_ttl_seconds: None,
        })
    }

    #[test]
    fn keeps_last_k_pairs_oldest_first() {
        let store = store(3);
        let key = SessionKey::new("u1", "v1");
        for i in 0..7 {
            store.append(&key, format!("q{i}"), format!("a{i}"));
        }
        let turns = store.read(&key);
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q4", "a4", "q5", "a5", "q6", "a6"]);
    }

    #[test]
    fn sessions_are_isolated_per_user_and_video() {
        let store = store(5);
        store.append(&SessionKey::new("u1", "v1"), "q", "a");
        assert!(store.read(&SessionKey::new("u2", "v1")).is_empty());
        assert!(store.read(&SessionKey::new("u1", "v2")).is_empty());
        assert_eq!(store.read(&SessionKey::new("u1", "v1")).len(), 2);
    }

    #[test]
    fn anonymous_callers_get_no_key() {
        assert!(SessionKey::for_user(None, "v1").is_none());
        assert!(SessionKey::for_user(Some("  "), "v1").is_none());
        assert_eq!(
            SessionKey::for_user(Some(" u1 "), "v1"),
            Some(SessionKey::new("u1", "v1"))
        );
    }

    #[test]
    fn clear_and_reset_remove_sessions() {
        let store = store(2);
        let a = SessionKey::new("u1", "v1");
        let b = SessionKey::new("u2", "v1");
        store.append(&a, "q", "a");
        store.append(&b, "q", "a");
        assert!(store.clear(&a));
        assert!(!store.clear(&a));
        assert_eq!(store.len(), 1);
        store.reset();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_keep_pairs_intact() {
        let store = Arc::new(store(4));
        let key = SessionKey::new("u1", "v1");
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.append(&key, format!("q{i}"), format!("a{i}"));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let turns = store.read(&key);
        assert_eq!(turns.len(), 8);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].text[1..], pair[1].text[1..]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire_when_configured() {
        let store = SessionMemoryStore::new(MemoryConfig {
            capacity_pairs: 2,
            idle_ttl_seconds: Some(60),
        });
        let key = SessionKey::new("u1", "v1");
        store.append(&key, "q", "a");
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.read(&key).len(), 2);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.read(&key).is_empty());
        assert!(store.is_empty());
    }
}

use crate::error::Result;
use crate::traits::session::{SessionData, SessionStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Process-local session store
///
/// Sessions live in a `HashMap` and are lost on restart; fine for tests and
/// single-instance deployments. Expired entries are dropped when read and
/// whenever the session layer purges.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held, expired ones included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                None => return Ok(None),
                Some(data) if !data.is_expired() => return Ok(Some(data.clone())),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        // Re-check: another request may have refreshed it meanwhile
        if sessions.get(session_id).is_some_and(SessionData::is_expired) {
            sessions.remove(session_id);
        }
        Ok(None)
    }

    async fn save(&self, session_id: &str, data: SessionData) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), data);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = SystemTime::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, data| !data.is_expired_at(now));
        Ok(before - sessions.len())
    }
}

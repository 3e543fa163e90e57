use crate::traits::session::SessionData;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-request handle on the caller's session
///
/// Cloned into request extensions by the session layer. Every clone shares
/// the same state, so writes made by a handler are visible to the layer when
/// it decides whether to persist. Any write that changes the data marks the
/// session modified.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

#[derive(Debug)]
struct SessionState {
    id: String,
    data: SessionData,
    is_new: bool,
    modified: bool,
}

/// Snapshot handed back to the session layer for persistence
#[derive(Debug, Clone)]
pub struct PendingSave {
    pub id: String,
    pub data: SessionData,
    pub is_new: bool,
}

impl Session {
    pub fn new(id: impl Into<String>, data: SessionData, is_new: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                id: id.into(),
                data,
                is_new,
                modified: false,
            })),
        }
    }

    /// Session identifier
    pub async fn id(&self) -> String {
        self.inner.lock().await.id.clone()
    }

    /// Read a value
    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().await.data.get(key).cloned()
    }

    /// Check whether a key is present
    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.data.get(key).is_some()
    }

    /// Write a value and mark the session modified
    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.data.insert(key.into(), value.into());
        state.modified = true;
    }

    /// Remove and return a value; marks the session modified only if the key existed
    pub async fn pop(&self, key: &str) -> Option<String> {
        let mut state = self.inner.lock().await;
        let value = state.data.remove(key);
        if value.is_some() {
            state.modified = true;
        }
        value
    }

    /// Whether any write has happened since the session was loaded
    pub async fn is_modified(&self) -> bool {
        self.inner.lock().await.modified
    }

    /// Take the data to persist, if the session was modified
    ///
    /// Resets the modified flag so a second call returns `None`.
    pub async fn take_pending(&self) -> Option<PendingSave> {
        let mut state = self.inner.lock().await;
        if !state.modified {
            return None;
        }
        state.modified = false;
        let pending = PendingSave {
            id: state.id.clone(),
            data: state.data.clone(),
            is_new: state.is_new,
        };
        state.is_new = false;
        Some(pending)
    }
}

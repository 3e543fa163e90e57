//! Session persistence seam
//!
//! The session layer owns the cookie and the per-request [`Session`] handle.
//! A store only keeps [`SessionData`] by id and forgets it once it expires.
//!
//! [`Session`]: crate::session::Session

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Longest lifetime a session can be given. Longer TTLs are clamped.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(400 * 24 * 60 * 60);

/// Key-value contents of one session plus its expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    values: HashMap<String, String>,
    created_at: SystemTime,
    expires_at: SystemTime,
}

impl SessionData {
    /// Empty session living for `ttl`, capped at [`MAX_SESSION_TTL`].
    pub fn new(ttl: Duration) -> Self {
        let created_at = SystemTime::now();
        // Only a clock near the end of the representable range fails both
        let expires_at = created_at
            .checked_add(ttl.min(MAX_SESSION_TTL))
            .or_else(|| created_at.checked_add(Duration::from_secs(60)))
            .unwrap_or(created_at);

        Self {
            values: HashMap::new(),
            created_at,
            expires_at,
        }
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now > self.expires_at
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Backend holding sessions between requests
///
/// Implementations must never hand out expired data. The session layer
/// calls [`purge_expired`](Self::purge_expired) periodically, so stores
/// without native expiry still stay bounded.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns `Ok(None)` for unknown or expired ids.
    async fn load(&self, session_id: &str) -> Result<Option<SessionData>>;

    async fn save(&self, session_id: &str, data: SessionData) -> Result<()>;

    /// Drop every expired session and return how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

use crate::error::Result;
use crate::traits::directory::UserDirectory;
use crate::user::User;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory user directory
///
/// Keeps users in insertion order. Suitable for development and testing.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<Vec<User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-populated with `users`
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users.into_iter().collect())),
        }
    }

    /// Add or replace a user (matched by id)
    pub async fn insert(&self, user: User) {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }
    }

    /// Remove a user, returning it if it existed
    pub async fn remove(&self, id: &str) -> Option<User> {
        let mut users = self.users.write().await;
        let index = users.iter().position(|u| u.id == id)?;
        Some(users.remove(index))
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| !u.email.is_empty() && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn all(&self) -> Result<Vec<User>> {
        Ok(self.users.read().await.clone())
    }
}

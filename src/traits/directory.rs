//! User directory trait
//!
//! The impersonation layer never owns users. It looks them up through this
//! trait, which applications implement over their own user storage.

use crate::error::Result;
use crate::user::User;
use async_trait::async_trait;

/// Lookup-only access to the application's users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by primary identifier.
    ///
    /// Returns `Ok(None)` if no such user exists.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Find a user by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Find a user by email address (case-insensitive).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Every known user, in a stable order.
    async fn all(&self) -> Result<Vec<User>>;

    /// Users matching a predicate.
    async fn filtered(
        &self,
        predicate: &(dyn for<'u> Fn(&'u User) -> bool + Send + Sync),
    ) -> Result<Vec<User>> {
        Ok(self.all().await?.into_iter().filter(|u| predicate(u)).collect())
    }
}

//! User identity as seen by the impersonation layer.

use serde::{Deserialize, Serialize};

/// A user known to the [`UserDirectory`](crate::traits::directory::UserDirectory)
///
/// Used for both the actor (the real, authenticated principal) and the
/// target being impersonated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Elevated privilege, the highest trust tier.
    #[serde(default)]
    pub is_superuser: bool,
    /// Staff-equivalent privilege; may impersonate unless superuser is required.
    #[serde(default)]
    pub is_staff: bool,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_superuser: false,
            is_staff: false,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    #[must_use]
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    #[must_use]
    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self.is_staff = true;
        self
    }

    #[must_use]
    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    /// Names accepted by [`field`](Self::field).
    pub const FIELDS: [&'static str; 5] = ["id", "username", "email", "first_name", "last_name"];

    /// Look up a searchable field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "username" => Some(&self.username),
            "email" => Some(&self.email),
            "first_name" => Some(&self.first_name),
            "last_name" => Some(&self.last_name),
            _ => None,
        }
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}

/// The authenticated principal for a request.
///
/// Inserted into request extensions by the host's authentication layer.
/// Its absence means the request is anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated(pub User);

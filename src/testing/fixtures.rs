//! Test fixtures
//!
//! Four users with the classic split of privileges:
//!
//! | id | username | superuser | staff | name       |
//! |----|----------|-----------|-------|------------|
//! | 1  | user1    | yes       | yes   | John Smith |
//! | 2  | user2    | yes       | yes   | John Doe   |
//! | 3  | user3    | no        | yes   |            |
//! | 4  | user4    | no        | no    |            |
//!
//! Every email is `<username>@test-email.com`.

use crate::directory::InMemoryUserDirectory;
use crate::user::User;

fn user(id: u32) -> User {
    let username = format!("user{}", id);
    User::new(id.to_string(), username.clone()).with_email(format!("{}@test-email.com", username))
}

pub fn user1() -> User {
    user(1).with_name("John", "Smith").superuser()
}

pub fn user2() -> User {
    user(2).with_name("John", "Doe").superuser()
}

pub fn user3() -> User {
    user(3).staff()
}

pub fn user4() -> User {
    user(4)
}

pub fn users() -> Vec<User> {
    vec![user1(), user2(), user3(), user4()]
}

/// Directory seeded with [`users`].
pub fn directory() -> InMemoryUserDirectory {
    InMemoryUserDirectory::with_users(users())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileges() {
        assert!(user1().is_superuser && user1().is_staff);
        assert!(user2().is_superuser);
        assert!(!user3().is_superuser && user3().is_staff);
        assert!(!user4().is_superuser && !user4().is_staff);
        assert_eq!(user4().email, "user4@test-email.com");
    }
}

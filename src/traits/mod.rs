//! Collaborator traits implemented by the host application.

pub mod directory;
pub mod session;

pub use directory::UserDirectory;
pub use session::{SessionData, SessionStore};

//! Session management and storage.
//!
//! Provides a cookie-identified session middleware over a pluggable
//! [`SessionStore`](crate::traits::session::SessionStore), with an
//! in-memory backend.

mod config;
mod handle;
mod in_memory;
mod layer;

pub use config::SessionConfig;
pub use handle::{PendingSave, Session};
pub use in_memory::InMemorySessionStore;
pub use layer::{SessionManager, load_session};

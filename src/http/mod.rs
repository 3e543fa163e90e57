//! HTTP surface: start/stop endpoints and the user picker.

mod guard;
pub mod listing;
mod routes;

pub use guard::allowed_user_required;
pub use listing::{ListContext, Paginator};
pub use routes::ImpersonationRoutes;

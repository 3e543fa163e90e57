//! Testing utilities for impersonation-enabled applications
//!
//! This module provides:
//! - Alba-style HTTP endpoint testing without running a server
//! - A fully layered [`TestApp`] with header-based test authentication
//! - User fixtures with the usual superuser/staff/regular split
//!
//! # Example
//!
//! ```rust,ignore
//! use impersonate::{ImpersonationConfig, SESSION_KEY, testing};
//!
//! #[tokio::test]
//! async fn test_start() {
//!     let app = testing::TestApp::new();
//!     let manager = app.manager(ImpersonationConfig::default());
//!     let sid = app.open_session().await;
//!
//!     testing::get(app.router(&manager), "/impersonate/4")
//!         .as_user("1")
//!         .cookie(&app.cookie(&sid))
//!         .execute()
//!         .await
//!         .assert_redirect_to("/");
//!
//!     assert_eq!(app.session_value(&sid, SESSION_KEY).await.as_deref(), Some("4"));
//! }
//! ```

mod app;
pub mod fixtures;
mod scenario;

pub use app::{RecordingListener, TEST_USER_HEADER, TestApp, header_auth};
pub use scenario::{Scenario, ScenarioAssert, get};

//! Begin/end notifications for impersonation sessions.
//!
//! Listeners run synchronously, in registration order, inside the request
//! that started or stopped the impersonation. A listener that returns an
//! error or panics is logged and skipped; it never aborts the lifecycle
//! operation or prevents later listeners from running.

use crate::error::Result;
use crate::request::RequestContext;
use crate::user::User;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Payload of `session_begin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionBegin {
    pub impersonator: User,
    pub impersonating: User,
    pub request: RequestContext,
}

/// Payload of `session_end`
///
/// Only the target's id is known at this point; the user may have been
/// deleted since impersonation began.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEnd {
    /// `None` if the session ended on an unauthenticated request.
    pub impersonator: Option<User>,
    pub impersonating: String,
    pub request: RequestContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ImpersonationEvent {
    SessionBegin(SessionBegin),
    SessionEnd(SessionEnd),
}

impl ImpersonationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionBegin(_) => "session_begin",
            Self::SessionEnd(_) => "session_end",
        }
    }
}

/// Subscriber to impersonation events
pub trait ImpersonationListener: Send + Sync {
    fn on_event(&self, event: &ImpersonationEvent) -> Result<()>;
}

impl<F> ImpersonationListener for F
where
    F: Fn(&ImpersonationEvent) -> Result<()> + Send + Sync,
{
    fn on_event(&self, event: &ImpersonationEvent) -> Result<()> {
        self(event)
    }
}

/// In-process, synchronous event dispatch
#[derive(Clone, Default)]
pub struct NotificationBus {
    listeners: Vec<Arc<dyn ImpersonationListener>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn ImpersonationListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener, isolating their failures.
    pub fn emit(&self, event: &ImpersonationEvent) {
        for (index, listener) in self.listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        target: "impersonate.listener",
                        event = event.name(),
                        listener = index,
                        error = %e,
                        "Impersonation listener failed"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        target: "impersonate.listener",
                        event = event.name(),
                        listener = index,
                        "Impersonation listener panicked"
                    );
                }
            }
        }
    }
}

/// Writes every event to the log as an audit trail
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl ImpersonationListener for TracingListener {
    fn on_event(&self, event: &ImpersonationEvent) -> Result<()> {
        match event {
            ImpersonationEvent::SessionBegin(begin) => tracing::info!(
                target: "impersonate.audit",
                impersonator_id = %begin.impersonator.id,
                target_user_id = %begin.impersonating.id,
                path = %begin.request.path,
                "Impersonation session began"
            ),
            ImpersonationEvent::SessionEnd(end) => tracing::info!(
                target: "impersonate.audit",
                impersonator_id = end.impersonator.as_ref().map(|u| u.id.as_str()).unwrap_or("anonymous"),
                target_user_id = %end.impersonating,
                path = %end.request.path,
                "Impersonation session ended"
            ),
        }
        Ok(())
    }
}

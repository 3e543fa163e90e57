use crate::error::{ImpersonateError, Result};
use crate::http::guard::allowed_user_required;
use crate::http::listing::{list_context, search_context};
use crate::manager::ImpersonationManager;
use crate::redirect::redirect_path;
use crate::resolver::RequestIdentity;
use crate::traits::UserDirectory;
use crate::user::User;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;

/// Start/stop and picker endpoints
///
/// Expects the session layer and [`resolve_identity`](crate::resolve_identity)
/// to run in front of it. Usually nested under a prefix:
///
/// ```rust,ignore
/// let app = Router::new()
///     .nest("/impersonate", ImpersonationRoutes::new(manager.clone()).router())
///     .layer(from_fn_with_state(manager, impersonate::resolve_identity))
///     .layer(from_fn(my_auth))
///     .layer(from_fn_with_state(sessions, impersonate::session::load_session));
/// ```
pub struct ImpersonationRoutes {
    manager: ImpersonationManager,
}

impl ImpersonationRoutes {
    pub fn new(manager: ImpersonationManager) -> Self {
        Self { manager }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/stop", get(stop))
            .route("/list", get(list))
            .route("/search", get(search))
            .route("/{uid}", get(start))
            .with_state(self.manager)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn start(
    State(manager): State<ImpersonationManager>,
    identity: RequestIdentity,
    Path(uid): Path<String>,
) -> Result<Redirect> {
    let target = find_target(manager.directory(), &uid)
        .await?
        .ok_or_else(|| ImpersonateError::not_found(format!("User '{}' not found", uid)))?;

    manager.stop(&identity).await;
    manager.start(&identity, &target).await?;

    Ok(Redirect::to(&redirect_path(manager.config(), identity.request())))
}

async fn stop(
    State(manager): State<ImpersonationManager>,
    identity: RequestIdentity,
) -> Redirect {
    let destination = manager.stop(&identity).await;
    Redirect::to(&destination)
}

async fn list(
    State(manager): State<ImpersonationManager>,
    identity: RequestIdentity,
) -> Result<Response> {
    if let Some(redirect) = allowed_user_required(&identity).await {
        return Ok(redirect.into_response());
    }
    let users = impersonable(&manager, &identity).await?;
    Ok(Json(list_context(manager.config(), identity.request(), users)).into_response())
}

async fn search(
    State(manager): State<ImpersonationManager>,
    identity: RequestIdentity,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    if let Some(redirect) = allowed_user_required(&identity).await {
        return Ok(redirect.into_response());
    }
    let users = impersonable(&manager, &identity).await?;
    let context = search_context(manager.config(), identity.request(), users, &query.q);
    Ok(Json(context).into_response())
}

async fn impersonable(
    manager: &ImpersonationManager,
    identity: &RequestIdentity,
) -> Result<Vec<User>> {
    let actor = identity
        .actor()
        .ok_or_else(|| ImpersonateError::unauthorized("Authentication required"))?;
    manager.policy().impersonable_set(actor, manager.directory()).await
}

/// Look a user up by id, then username, then email.
async fn find_target(directory: &dyn UserDirectory, uid: &str) -> Result<Option<User>> {
    if let Some(user) = directory.find_by_id(uid).await? {
        return Ok(Some(user));
    }
    if let Some(user) = directory.find_by_username(uid).await? {
        return Ok(Some(user));
    }
    directory.find_by_email(uid).await
}

use crate::error::ImpersonateError;
use crate::resolver::{EffectiveIdentity, RequestIdentity};
use crate::user::User;
use axum::{extract::FromRequestParts, http::request::Parts};

impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = ImpersonateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .ok_or_else(|| {
                ImpersonateError::internal("RequestIdentity not found in request extensions")
            })
    }
}

/// Axum extractor for the effective user
///
/// Resolves impersonation on first use. The request is rejected with 401 if
/// nobody is authenticated.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(CurrentUser(user): CurrentUser) -> String {
///     format!("Hello {}", user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ImpersonateError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = RequestIdentity::from_request_parts(parts, state).await?;
        identity
            .current_user()
            .await
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ImpersonateError::unauthorized("Authentication required"))
    }
}

/// Axum extractor for the full effective identity
///
/// Exposes the effective user, the real impersonator and the impersonation
/// flag. Never rejects anonymous requests.
#[derive(Debug, Clone)]
pub struct Identity(pub EffectiveIdentity);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ImpersonateError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = RequestIdentity::from_request_parts(parts, state).await?;
        Ok(Identity(identity.effective().await.clone()))
    }
}

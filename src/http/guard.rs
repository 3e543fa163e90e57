use crate::redirect::redirect_path;
use crate::resolver::RequestIdentity;
use axum::response::Redirect;

/// Gate for the picker endpoints
///
/// Returns the redirect to send instead of serving the page, or `None` when
/// the actor may use the picker. Anonymous users go to the login page with
/// the current path as `next`; impersonated sessions and users who may not
/// impersonate go to the redirect path.
pub async fn allowed_user_required(identity: &RequestIdentity) -> Option<Redirect> {
    let manager = identity.manager();
    let request = identity.request();

    let Some(actor) = identity.actor() else {
        let next = urlencoding::encode(&request.full_path()).replace("%2F", "/");
        let login = format!("{}?next={}", manager.config().login_url, next);
        return Some(Redirect::to(&login));
    };

    if identity.is_impersonate().await || !manager.policy().can_initiate(actor) {
        tracing::debug!(
            target: "impersonate.rejected",
            actor_id = %actor.id,
            path = %request.path,
            "Picker access denied"
        );
        return Some(Redirect::to(&redirect_path(manager.config(), request)));
    }

    None
}

//! Where to send the user after starting or stopping impersonation.

use crate::config::ImpersonationConfig;
use crate::request::RequestContext;
use serde::Serialize;

/// Redirect target for a request
///
/// The configured redirect field in the query string wins, then
/// `redirect_url`, then `login_redirect_url`, then `/`.
pub fn redirect_path(config: &ImpersonationConfig, request: &RequestContext) -> String {
    redirect_field_value(config, request)
        .unwrap_or_else(|| config.fallback_redirect().to_string())
}

/// Query string fragment forwarding the redirect target, e.g. `?next=/foo`
///
/// Empty when no redirect field is configured or the request lacks it.
pub fn redirect_arg(config: &ImpersonationConfig, request: &RequestContext) -> String {
    match (config.redirect_field_name.as_deref(), redirect_field_value(config, request)) {
        (Some(name), Some(value)) => format!("?{}={}", name, value),
        _ => String::new(),
    }
}

/// Hidden form field carrying the redirect target through a search form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectField {
    pub name: String,
    pub value: String,
}

pub fn redirect_field(config: &ImpersonationConfig, request: &RequestContext) -> Option<RedirectField> {
    let name = config.redirect_field_name.clone()?;
    let value = redirect_field_value(config, request)?;
    Some(RedirectField { name, value })
}

fn redirect_field_value(config: &ImpersonationConfig, request: &RequestContext) -> Option<String> {
    let name = config.redirect_field_name.as_deref()?;
    request.query_param(name).filter(|value| !value.is_empty())
}

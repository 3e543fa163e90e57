//! Request details the impersonation layer cares about.

use axum::http::{HeaderMap, header, request::Parts};
use serde::Serialize;
use url::Url;

/// Snapshot of the incoming request
///
/// Carried in notifications and used for path checks and redirects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub referer: Option<String>,
    pub host: Option<String>,
    pub scheme: String,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = &parts.headers;
        Self {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            referer: header_str(headers, header::REFERER),
            host: header_str(headers, header::HOST).or_else(|| {
                parts.uri.authority().map(|a| a.to_string())
            }),
            scheme: headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .or_else(|| parts.uri.scheme_str())
                .unwrap_or("http")
                .to_string(),
        }
    }

    /// A bare context for a path, useful outside of a live request.
    pub fn for_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };
        Self {
            method: "GET".to_string(),
            path,
            query,
            referer: None,
            host: None,
            scheme: "http".to_string(),
        }
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Path plus query string, as the client requested it.
    pub fn full_path(&self) -> String {
        match self.query {
            Some(ref q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }

    /// First decoded value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// The referring page as an absolute URL.
    ///
    /// Absolute referers are returned as-is; relative ones are resolved
    /// against this request's scheme and host. `None` without a referer,
    /// or when a relative referer cannot be resolved.
    pub fn absolute_referer(&self) -> Option<String> {
        let referer = self.referer.as_deref()?;
        if let Ok(url) = Url::parse(referer) {
            return Some(url.to_string());
        }

        let host = self.host.as_deref()?;
        let base = Url::parse(&format!("{}://{}/", self.scheme, host)).ok()?;
        base.join(referer).ok().map(|url| url.to_string())
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

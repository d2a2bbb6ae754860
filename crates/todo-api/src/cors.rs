//! CORS allow-origin handling.
//!
//! The allow-list comes from process configuration. A wildcard entry (or an
//! empty list) stamps `*` on every response; otherwise the request origin is
//! echoed back only when it matches an allowed origin. OPTIONS preflights
//! short-circuit before routing.

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderValue, ORIGIN,
};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const ALLOW_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
const ALLOW_HEADERS: &str = "content-type";

/// Configured CORS origin allow-list.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Allow-list of origins. An empty list or a `*` entry allows any origin.
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    /// Allow any origin.
    pub fn wildcard() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }

    /// Header value to stamp for a request from `origin`, if any.
    fn resolve(&self, origin: Option<&str>) -> Option<String> {
        if self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*") {
            return Some("*".to_string());
        }
        let origin = origin?;
        self.allowed_origins
            .iter()
            .find(|o| o.as_str() == origin)
            .cloned()
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self::wildcard()
    }
}

/// Stamp CORS headers on every response; answer preflights directly.
pub async fn cors_middleware(
    State(cors): State<CorsConfig>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let allow_origin = cors.resolve(origin.as_deref());

    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        if let Some(value) = &allow_origin {
            if let Ok(value) = HeaderValue::from_str(value) {
                resp.headers_mut().insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
        }
        resp.headers_mut().insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        resp.headers_mut().insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(value) = allow_origin {
        if let Ok(value) = HeaderValue::from_str(&value) {
            resp.headers_mut().insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allows_any_origin() {
        let cors = CorsConfig::wildcard();
        assert_eq!(cors.resolve(None), Some("*".to_string()));
        assert_eq!(
            cors.resolve(Some("https://evil.example")),
            Some("*".to_string())
        );
    }

    #[test]
    fn empty_list_is_wildcard() {
        let cors = CorsConfig::new(vec![]);
        assert_eq!(cors.resolve(None), Some("*".to_string()));
    }

    #[test]
    fn allow_list_echoes_matching_origin() {
        let cors = CorsConfig::new(vec![
            "https://app.example".to_string(),
            "https://staging.example".to_string(),
        ]);
        assert_eq!(
            cors.resolve(Some("https://staging.example")),
            Some("https://staging.example".to_string())
        );
    }

    #[test]
    fn allow_list_rejects_unknown_origin() {
        let cors = CorsConfig::new(vec!["https://app.example".to_string()]);
        assert_eq!(cors.resolve(Some("https://evil.example")), None);
        assert_eq!(cors.resolve(None), None);
    }
}

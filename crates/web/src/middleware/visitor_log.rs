//! Anonymous visitor log.
//!
//! Every non-static `GET` is recorded in `page_hits` together with a `vuid`
//! cookie identifying the browser. The insert runs in the background and a
//! failure only produces a warning.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue, Method,
        header::{AUTHORIZATION, COOKIE, REFERER, SET_COOKIE, USER_AGENT},
    },
    middleware::Next,
    response::Response,
};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};
use uuid::Uuid;

use super::rate_limit::client_ip;
use crate::db::PageHitRepository;
use crate::db::page_hits::PageHit;
use crate::state::AppState;

/// Visitor id cookie name.
pub const VISITOR_COOKIE: &str = "vuid";

/// Paths that are never logged.
const SKIPPED_PREFIXES: &[&str] = &["/static/", "/health", "/favicon.ico"];

/// Record the request and make sure the browser carries a `vuid`.
pub async fn visitor_log_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if request.method() != Method::GET
        || SKIPPED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
    {
        return next.run(request).await;
    }

    let existing = visitor_id(request.headers());
    let visitor = existing
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let hit = PageHit {
        ip: client_ip(&request).map(|ip| ip.to_string()),
        method: request.method().to_string(),
        path: path.to_string(),
        query: request.uri().query().unwrap_or_default().to_string(),
        referrer: header_str(request.headers(), REFERER.as_str()),
        user_agent: header_str(request.headers(), USER_AGENT.as_str()),
        headers: loggable_headers(request.headers()),
        visitor: Some(visitor.clone()),
    };

    let pool = state.pool().clone();
    tokio::spawn(async move {
        if let Err(e) = PageHitRepository::new(&pool).record(&hit).await {
            tracing::warn!(error = %e, path = %hit.path, "Failed to record page hit");
        }
    });

    let mut response = next.run(request).await;

    if existing.is_none() {
        let cookie = visitor_cookie(visitor, state.config().uses_https());
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

fn visitor_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == VISITOR_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

fn visitor_cookie(visitor: String, secure: bool) -> Cookie<'static> {
    Cookie::build((VISITOR_COOKIE, visitor))
        .path("/")
        .max_age(Duration::days(365))
        .same_site(SameSite::Lax)
        .http_only(true)
        .secure(secure)
        .build()
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Request headers as a JSON object, without cookies or credentials.
fn loggable_headers(headers: &HeaderMap) -> serde_json::Map<String, serde_json::Value> {
    headers
        .iter()
        .filter(|(name, _)| **name != COOKIE && **name != AUTHORIZATION)
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), serde_json::Value::String(v.to_string())))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_visitor_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("cfac_session=abc; vuid=0f1e2d3c"),
        );
        assert_eq!(visitor_id(&headers).as_deref(), Some("0f1e2d3c"));
        assert_eq!(visitor_id(&HeaderMap::new()), None);
    }

    #[test]
    fn test_visitor_cookie_attributes() {
        let cookie = visitor_cookie("abc".to_string(), true).to_string();
        assert!(cookie.starts_with("vuid=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=31536000"));
    }

    #[test]
    fn test_loggable_headers_drop_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8"));
        headers.insert(COOKIE, HeaderValue::from_static("vuid=x"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        let logged = loggable_headers(&headers);
        assert_eq!(logged.len(), 1);
        assert_eq!(logged["user-agent"], "curl/8");
    }
}

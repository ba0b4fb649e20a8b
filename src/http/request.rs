//! Request identification and buffering.
//!
//! # Responsibilities
//! - Generate a UUID v4 request ID for every inbound request
//! - Buffer the inbound body so every upstream hop can replay it
//! - Map public paths to upstream paths (alias prefixes are stripped)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing, and forwarded upstream
//! - The body limit is enforced while buffering, before any upstream call

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::error::RelayError;
use crate::forward::ProxiedRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// `MakeRequestId` producing UUID v4 values.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID set by the edge layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Where a mounted prefix sends its traffic.
#[derive(Debug, Clone)]
pub struct RelayRoute {
    pub upstream_base: Url,
    /// Public prefix removed before forwarding (alias routes only).
    pub strip_prefix: Option<String>,
}

impl RelayRoute {
    pub fn primary(upstream_base: Url) -> Self {
        Self {
            upstream_base,
            strip_prefix: None,
        }
    }

    pub fn alias(upstream_base: Url, prefix: impl Into<String>) -> Self {
        Self {
            upstream_base,
            strip_prefix: Some(prefix.into()),
        }
    }

    /// Upstream path for a public request path.
    pub fn upstream_path(&self, public_path: &str) -> String {
        let Some(prefix) = &self.strip_prefix else {
            return public_path.to_string();
        };
        match public_path.strip_prefix(prefix.as_str()) {
            Some("") | None => "/".to_string(),
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            Some(rest) => format!("/{}", rest),
        }
    }
}

/// Buffer an inbound request for relaying.
pub async fn buffer_request(
    request: Request<Body>,
    upstream_path: String,
    max_body_bytes: usize,
) -> Result<ProxiedRequest, RelayError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| RelayError::InboundBody(e.to_string()))?;

    Ok(ProxiedRequest {
        method: parts.method,
        path: upstream_path,
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_prefix_is_stripped() {
        let route = RelayRoute::alias(Url::parse("https://shcourse.utaipei.edu.tw").unwrap(), "/shcourse");
        assert_eq!(route.upstream_path("/shcourse/query.jsp"), "/query.jsp");
        assert_eq!(route.upstream_path("/shcourse"), "/");
        assert_eq!(route.upstream_path("/shcourse/"), "/");

        let primary = RelayRoute::primary(Url::parse("https://my.utaipei.edu.tw").unwrap());
        assert_eq!(primary.upstream_path("/utaipei/a.jsp"), "/utaipei/a.jsp");
    }

    #[test]
    fn test_request_uuid() {
        let request = Request::new(());
        let id = MakeRequestUuid.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = Request::builder()
            .uri("/utaipei/a?x=1")
            .body(Body::from(vec![b'a'; 32]))
            .unwrap();
        let err = buffer_request(request, "/utaipei/a".into(), 8).await.unwrap_err();
        assert!(matches!(err, RelayError::InboundBody(_)));

        let request = Request::builder()
            .uri("/utaipei/a?x=1")
            .body(Body::from("k=v"))
            .unwrap();
        let buffered = buffer_request(request, "/utaipei/a".into(), 8).await.unwrap();
        assert_eq!(buffered.query.as_deref(), Some("x=1"));
        assert_eq!(&buffered.body[..], b"k=v");
    }
}

//! Bounded redirect-following upstream client.
//!
//! # Responsibilities
//! - Build the upstream request for every hop from the buffered inbound request
//! - Execute hops through the shared cookie jar with a per-hop timeout
//! - Follow redirects internally so the client never sees upstream hosts
//!
//! # Design Decisions
//! - Transport-level redirects are disabled; this loop owns redirect semantics
//! - No retries: a failed hop fails the relay
//! - The whole loop runs inside the handler future, so a client disconnect
//!   cancels whichever hop is in flight

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{self, HeaderMap};
use axum::http::{Method, StatusCode};
use bytes::Bytes;
use url::Url;

use crate::config::UpstreamConfig;
use crate::cookies::SharedCookieJar;
use crate::error::RelayError;
use crate::forward::headers::{self, HeaderProfile, HopContext};
use crate::forward::redirect::{resolve_location, RedirectCursor};
use crate::target::{origin_of, UpstreamTarget};

/// A fully buffered inbound request, owned by one relay.
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The terminal upstream response of a relay.
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub final_url: Url,
    pub hops: u32,
}

/// Relays requests to the upstream, following redirects up to a bound.
#[derive(Debug, Clone)]
pub struct RequestForwarder {
    client: reqwest::Client,
    jar: Arc<SharedCookieJar>,
    target: Arc<UpstreamTarget>,
    profile: HeaderProfile,
    max_redirects: u32,
}

impl RequestForwarder {
    pub fn new(
        target: Arc<UpstreamTarget>,
        jar: Arc<SharedCookieJar>,
        config: &UpstreamConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_provider(jar.clone())
            .build()?;

        Ok(Self {
            client,
            jar,
            target,
            profile: HeaderProfile::from_config(config),
            max_redirects: config.max_redirects,
        })
    }

    pub fn jar(&self) -> &Arc<SharedCookieJar> {
        &self.jar
    }

    /// Relay `req` to `upstream_base`, hiding any redirects along the way.
    pub async fn forward(
        &self,
        upstream_base: &Url,
        req: ProxiedRequest,
    ) -> Result<ProxiedResponse, RelayError> {
        let start_url = upstream_url(upstream_base, &req.path, req.query.as_deref());
        let upstream_origin = origin_of(upstream_base);
        let public_origin = self.target.public_origin();
        let mut cursor = RedirectCursor::new(start_url, req.method.clone(), req.body.clone());

        while cursor.hop_count < self.max_redirects {
            cursor.hop_count += 1;
            let hop = cursor.hop_count;
            let url = cursor.current_url.clone();

            let jar_cookies = self.jar.cookie_header(&url);
            let mut headers = headers::normalize(
                &req.headers,
                HopContext {
                    method: &cursor.method,
                    url: &url,
                    upstream_origin: &upstream_origin,
                    public_origin: &public_origin,
                    jar_cookies: jar_cookies.as_deref(),
                },
                &self.profile,
            );
            if cursor.method_downgraded {
                headers.remove(header::CONTENT_TYPE);
            }

            let request = self
                .client
                .request(cursor.method.clone(), url.clone())
                .headers(headers)
                .body(cursor.body.clone())
                .build()
                .map_err(|e| RelayError::RequestBuild {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            tracing::debug!(hop, method = %cursor.method, url = %url, "Upstream hop");

            let response = self.client.execute(request).await.map_err(|source| {
                RelayError::UpstreamTransport {
                    url: url.to_string(),
                    hop,
                    source,
                }
            })?;

            let status = response.status();
            let response_headers = response.headers().clone();
            let body = response.bytes().await.map_err(|source| RelayError::BodyRead {
                url: url.to_string(),
                source,
            })?;

            if !status.is_redirection() {
                tracing::debug!(hop, status = %status, bytes = body.len(), "Upstream responded");
                return Ok(ProxiedResponse {
                    status,
                    headers: response_headers,
                    body,
                    final_url: url,
                    hops: hop,
                });
            }

            let Some(location) = response_headers
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.trim().is_empty())
            else {
                tracing::debug!(hop, status = %status, "Redirect without Location treated as final");
                return Ok(ProxiedResponse {
                    status,
                    headers: response_headers,
                    body,
                    final_url: url,
                    hops: hop,
                });
            };

            let next = resolve_location(&url, location, upstream_base, self.target.public_host())?;
            tracing::info!(hop, status = %status, from = %url, to = %next, "Following upstream redirect");
            cursor.follow(status, next);
        }

        tracing::warn!(
            limit = self.max_redirects,
            url = %cursor.current_url,
            "Redirect limit exceeded"
        );
        Err(RelayError::RedirectLimitExceeded {
            limit: self.max_redirects,
            url: cursor.current_url.to_string(),
        })
    }
}

/// `upstream_base` with the inbound path and query; the base's own path is replaced.
pub fn upstream_url(upstream_base: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = upstream_base.clone();
    url.set_path(path);
    url.set_query(query.filter(|q| !q.is_empty()));
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_keeps_host() {
        let base = Url::parse("https://my.utaipei.edu.tw").unwrap();
        let url = upstream_url(&base, "//evil.test/x", Some("a=1"));
        assert_eq!(url.host_str(), Some("my.utaipei.edu.tw"));
        assert_eq!(url.query(), Some("a=1"));

        let url = upstream_url(&base, "/utaipei/index_sky.html", Some(""));
        assert_eq!(url.as_str(), "https://my.utaipei.edu.tw/utaipei/index_sky.html");
    }
}

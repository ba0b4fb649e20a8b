//! Response assembly.
//!
//! # Responsibilities
//! - Turn the terminal upstream response into the outbound response
//! - Pick the body treatment from the content verdict
//! - Translate `Set-Cookie`, rewrite `Location`/`Refresh`
//! - Apply cache, CORS and status policies
//!
//! # Design Decisions
//! - Upstream caching headers are dropped; caching is decided here
//! - Transfer framing is recomputed: `Content-Length` always matches the body
//! - The upstream response is consumed, never patched in place

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;

use crate::config::RedirectPolicy;
use crate::content::{classify, font_content_type, ContentVerdict};
use crate::cookies::CookieTranslator;
use crate::forward::headers::HOP_BY_HOP_HEADERS;
use crate::forward::ProxiedResponse;
use crate::rewrite::BodyRewriter;

const DROPPED_UPSTREAM_HEADERS: &[&str] = &[
    "content-length",
    "content-encoding",
    "cache-control",
    "pragma",
    "expires",
    "etag",
    "last-modified",
    "set-cookie",
];

pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate, private, max-age=0";
pub const LONG_CACHE: &str = "public, max-age=31536000";
pub const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS, PATCH";
pub const CORS_ALLOW_HEADERS: &str =
    "Content-Type, Authorization, X-Requested-With, Accept, Origin, Cache-Control, Pragma, Cookie, Referer";
pub const CORS_EXPOSE_HEADERS: &str = "Content-Length, Content-Type, Set-Cookie, Location";
pub const CORS_MAX_AGE: &str = "86400";

/// What the assembler needs to know about the inbound request.
#[derive(Debug, Clone, Copy)]
pub struct InboundContext<'a> {
    /// Path as seen by the upstream (alias prefix already stripped).
    pub path: &'a str,
    pub origin: Option<&'a str>,
}

/// Builds outbound responses from terminal upstream responses.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    rewriter: BodyRewriter,
    translator: CookieTranslator,
    redirect_policy: RedirectPolicy,
}

impl ResponseAssembler {
    pub fn new(
        rewriter: BodyRewriter,
        translator: CookieTranslator,
        redirect_policy: RedirectPolicy,
    ) -> Self {
        Self {
            rewriter,
            translator,
            redirect_policy,
        }
    }

    pub fn rewriter(&self) -> &BodyRewriter {
        &self.rewriter
    }

    pub fn assemble(&self, inbound: InboundContext<'_>, upstream: ProxiedResponse) -> Response {
        let content_type = upstream
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let verdict = classify(&content_type, inbound.path, &upstream.body);
        let body = self.rewrite_body(&verdict, inbound.path, upstream.body);

        let mut headers = HeaderMap::with_capacity(upstream.headers.len() + 8);
        for (name, value) in &upstream.headers {
            if is_dropped(name) {
                continue;
            }
            let value = if *name == header::LOCATION || name.as_str() == "refresh" {
                self.rewrite_header_value(value)
            } else {
                value.clone()
            };
            headers.append(name.clone(), value);
        }

        for raw in upstream.headers.get_all(header::SET_COOKIE) {
            let Ok(raw) = raw.to_str() else {
                headers.append(header::SET_COOKIE, raw.clone());
                continue;
            };
            let translated = self.translator.translate(raw);
            for cookie in std::iter::once(translated.primary).chain(translated.secondary) {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }

        if verdict.is_binary {
            let font_type = match verdict.corrected_content_type {
                Some(corrected) => Some(corrected),
                None if content_type.is_empty() => font_content_type(inbound.path),
                None => None,
            };
            if let Some(font_type) = font_type {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(font_type));
            }
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(LONG_CACHE));
        } else {
            apply_no_cache(&mut headers);
            if let Some(origin) = inbound.origin {
                apply_cors(&mut headers, origin);
            }
        }

        let mut status = upstream.status;
        if status.is_redirection() && self.redirect_policy == RedirectPolicy::Mask {
            tracing::info!(upstream_status = %status, "Masking upstream redirect as 200");
            status = StatusCode::OK;
            headers.remove(header::LOCATION);
        }

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    /// Bare 200 for `OPTIONS`, answered without contacting the upstream.
    pub fn preflight(&self, origin: Option<&str>) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(origin) = origin {
            apply_cors(&mut headers, origin);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0usize));

        let mut response = Response::new(Body::empty());
        *response.headers_mut() = headers;
        response
    }

    fn rewrite_body(&self, verdict: &ContentVerdict, path: &str, body: Bytes) -> Bytes {
        if verdict.should_inject(path) {
            Bytes::from(self.rewriter.rewrite_html(&body))
        } else if verdict.is_text_rewritable && !verdict.is_binary {
            Bytes::from(self.rewriter.rewrite_text(&body))
        } else {
            if verdict.is_html {
                tracing::debug!(path = %path, "HTML injection skipped for excluded path");
            }
            body
        }
    }

    fn rewrite_header_value(&self, value: &HeaderValue) -> HeaderValue {
        match value.to_str() {
            Ok(text) => HeaderValue::from_str(&self.rewriter.rewrite_header(text))
                .unwrap_or_else(|_| value.clone()),
            Err(_) => value.clone(),
        }
    }
}

fn is_dropped(name: &HeaderName) -> bool {
    let name = name.as_str();
    DROPPED_UPSTREAM_HEADERS.contains(&name) || HOP_BY_HOP_HEADERS.contains(&name)
}

fn apply_no_cache(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static(EPOCH_EXPIRES));
    headers.insert("x-cache-control", HeaderValue::from_static("no-cache"));
}

fn apply_cors(headers: &mut HeaderMap, origin: &str) {
    let Ok(origin) = HeaderValue::from_str(origin) else {
        return;
    };
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(CORS_EXPOSE_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(CORS_MAX_AGE),
    );
}

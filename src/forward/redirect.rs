//! Redirect bookkeeping for a single relay.
//!
//! # Responsibilities
//! - Track the current URL, method and body across hops
//! - Resolve `Location` against the current URL
//! - Pull redirects aimed at loopback or at the proxy itself back to the upstream
//!
//! # Design Decisions
//! - Only 307/308 keep method and body; every other redirect becomes a bodiless GET
//! - The cursor never outlives the `forward` call that created it

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use url::Url;

use crate::error::RelayError;
use crate::target::is_loopback_host;

/// Where the relay currently is in its redirect chain.
#[derive(Debug, Clone)]
pub struct RedirectCursor {
    pub current_url: Url,
    pub hop_count: u32,
    pub method: Method,
    pub body: Bytes,
    pub method_downgraded: bool,
}

impl RedirectCursor {
    pub fn new(url: Url, method: Method, body: Bytes) -> Self {
        Self {
            current_url: url,
            hop_count: 0,
            method,
            body,
            method_downgraded: false,
        }
    }

    /// Move to `next` after a redirect with `status`.
    pub fn follow(&mut self, status: StatusCode, next: Url) {
        if !preserves_method(status) && (self.method != Method::GET || !self.body.is_empty()) {
            self.method = Method::GET;
            self.body = Bytes::new();
            self.method_downgraded = true;
        }
        self.current_url = next;
    }
}

pub fn preserves_method(status: StatusCode) -> bool {
    status == StatusCode::TEMPORARY_REDIRECT || status == StatusCode::PERMANENT_REDIRECT
}

/// Resolve `location` against `current` and retarget self-referencing hosts
/// to `upstream_base`.
pub fn resolve_location(
    current: &Url,
    location: &str,
    upstream_base: &Url,
    public_host: &str,
) -> Result<Url, RelayError> {
    let invalid = || RelayError::InvalidRedirect {
        base: current.to_string(),
        location: location.to_string(),
    };

    let mut next = current.join(location.trim()).map_err(|_| invalid())?;
    let host = next.host_str().unwrap_or_default().to_ascii_lowercase();

    if is_loopback_host(&host) || host.eq_ignore_ascii_case(public_host) {
        next.set_scheme(upstream_base.scheme()).map_err(|_| invalid())?;
        next.set_host(upstream_base.host_str()).map_err(|_| invalid())?;
        next.set_port(upstream_base.port()).map_err(|_| invalid())?;
        tracing::debug!(location = %location, retargeted = %next, "Redirect pulled back to upstream");
    }
    Ok(next)
}

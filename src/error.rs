//! Relay error taxonomy.
//!
//! # Design Decisions
//! - One variant per failure kind so logs and metrics can tell them apart
//! - Client-facing bodies are generic; the failing hop/URL stays in the logs
//! - A 3xx without `Location` is not an error (see `forward`)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Everything that can abort a single in-flight relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The inbound request body could not be read (or exceeded the limit).
    #[error("failed to read inbound request body: {0}")]
    InboundBody(String),

    /// The upstream request could not be constructed.
    #[error("failed to build upstream request for {url}: {reason}")]
    RequestBuild { url: String, reason: String },

    /// Connection, TLS or timeout failure talking to the upstream.
    #[error("upstream request to {url} failed on hop {hop}: {source}")]
    UpstreamTransport {
        url: String,
        hop: u32,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered but its body could not be read.
    #[error("failed to read upstream body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The redirect chain did not settle within the configured bound.
    #[error("exceeded redirect limit ({limit}), last location {url}")]
    RedirectLimitExceeded { limit: u32, url: String },

    /// A `Location` header that cannot be resolved against the current URL.
    #[error("cannot resolve redirect location {location:?} against {base}")]
    InvalidRedirect { base: String, location: String },
}

impl RelayError {
    /// Status code surfaced to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InboundBody(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::InboundBody(_) => "inbound_body",
            RelayError::RequestBuild { .. } => "request_build",
            RelayError::UpstreamTransport { .. } => "upstream_transport",
            RelayError::BodyRead { .. } => "body_read",
            RelayError::RedirectLimitExceeded { .. } => "redirect_limit",
            RelayError::InvalidRedirect { .. } => "invalid_redirect",
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            RelayError::InboundBody(_) => "Invalid request body",
            RelayError::RedirectLimitExceeded { .. } => {
                "Upstream redirect limit exceeded"
            }
            _ => "Upstream request failed",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.client_message()).into_response()
    }
}

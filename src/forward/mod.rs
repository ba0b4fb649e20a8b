//! Upstream relay subsystem.
//!
//! # Data Flow
//! ```text
//! ProxiedRequest (buffered body)
//!     → forwarder.rs: per hop
//!         → headers.rs   (copy, retarget, browser defaults, jar cookies)
//!         → reqwest      (redirects off, per-hop timeout, SharedCookieJar)
//!         → 3xx? redirect.rs (resolve Location, downgrade method) → next hop
//!     → ProxiedResponse { status, headers, body, final_url, hops }
//! ```
//!
//! # Design Decisions
//! - Bodies are buffered so every hop can replay them
//! - The hop bound is a hard error, not a truncated response

pub mod forwarder;
pub mod headers;
pub mod redirect;

pub use forwarder::{upstream_url, ProxiedRequest, ProxiedResponse, RequestForwarder};
pub use headers::HeaderProfile;
pub use redirect::RedirectCursor;

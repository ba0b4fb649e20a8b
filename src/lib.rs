//! Rewriting reverse proxy library.
//!
//! Re-hosts one legacy web application under a different public origin:
//! upstream redirects are followed server-side, HTML/JS/CSS bodies are
//! retargeted, and `Set-Cookie` headers are translated so sessions survive
//! the host change.

pub mod assets;
pub mod config;
pub mod content;
pub mod cookies;
pub mod error;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod menu;
pub mod observability;
pub mod rewrite;
pub mod target;

pub use config::schema::ProxyConfig;
pub use error::RelayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use target::UpstreamTarget;

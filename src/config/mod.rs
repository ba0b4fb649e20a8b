//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → PORT / TARGET_* / PROXY_* overrides (loader.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → UpstreamTarget + component settings built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, Overrides};
pub use schema::{
    AliasConfig, AssetsConfig, CookieConfig, CookieModeSetting, ListenerConfig,
    ObservabilityConfig, ProxyConfig, RedirectPolicy, RewriteConfig, UpstreamConfig,
};

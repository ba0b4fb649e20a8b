//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Upstream origin, public origin and relay behaviour.
    pub upstream: UpstreamConfig,

    /// Response rewriting policy.
    pub rewrite: RewriteConfig,

    /// Set-Cookie translation settings.
    pub cookies: CookieConfig,

    /// Locally served static assets.
    pub assets: AssetsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest inbound request body buffered for replay, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A secondary upstream host exposed under a public sub-path.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AliasConfig {
    /// Upstream origin, e.g. "https://shcourse.utaipei.edu.tw".
    pub origin: String,

    /// Public path prefix, e.g. "/shcourse".
    pub public_prefix: String,
}

/// Upstream relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// The legacy origin being proxied.
    pub target_url: String,

    /// The origin clients use to reach this proxy.
    pub public_url: String,

    /// Secondary upstream hosts and their public prefixes.
    pub aliases: Vec<AliasConfig>,

    /// Public prefix appended when rewriting embedded loopback URLs.
    pub loopback_prefix: String,

    /// Path prefixes relayed to the primary upstream.
    pub route_prefixes: Vec<String>,

    /// Entry document; `GET /` redirects here and it seeds default Referers.
    pub entry_path: String,

    /// Maximum number of upstream hops per relay.
    pub max_redirects: u32,

    /// Per-hop upstream timeout in seconds.
    pub timeout_secs: u64,

    /// Drop hop-by-hop headers from inbound requests.
    pub strip_hop_by_hop: bool,

    /// User-Agent sent when the client did not provide one.
    pub default_user_agent: String,

    /// Accept-Language sent when the client did not provide one.
    pub default_accept_language: String,

    /// URL substrings that mark authentication pages (Referer/Origin pinning).
    pub auth_path_markers: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target_url: "https://my.utaipei.edu.tw".to_string(),
            public_url: "http://127.0.0.1:8080".to_string(),
            aliases: vec![AliasConfig {
                origin: "https://shcourse.utaipei.edu.tw".to_string(),
                public_prefix: "/shcourse".to_string(),
            }],
            loopback_prefix: "/utaipei".to_string(),
            route_prefixes: vec!["/utaipei".to_string()],
            entry_path: "/utaipei/index_sky.html".to_string(),
            max_redirects: 100,
            timeout_secs: 30,
            strip_hop_by_hop: true,
            default_user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            default_accept_language: "zh-TW,zh;q=0.9,en;q=0.8".to_string(),
            auth_path_markers: vec!["uaa".to_string(), "auth".to_string(), "login".to_string()],
        }
    }
}

/// What the client sees when the relay ends on a 3xx.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedirectPolicy {
    /// Forward the upstream status unchanged.
    Passthrough,
    /// Rewrite any 3xx to 200 and drop `Location`.
    #[default]
    Mask,
}

/// Response rewriting configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Final status-code policy.
    pub redirect_policy: RedirectPolicy,
}

/// Which Set-Cookie translation profile to apply.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CookieModeSetting {
    /// Local when the public host is a loopback address, else production.
    #[default]
    Auto,
    Local,
    Production,
}

/// Set-Cookie translation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Translation profile.
    pub mode: CookieModeSetting,

    /// Registrable domain of the upstream (derived from the target when unset).
    pub upstream_domain: Option<String>,

    /// Substrings marking a cookie as authentication-related.
    pub auth_keywords: Vec<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            mode: CookieModeSetting::Auto,
            upstream_domain: None,
            auth_keywords: ["jsessionid", "auth", "login", "session", "user"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory holding `img/` and `font/` sub-directories.
    pub dir: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: "assets".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            max_redirects = 10

            [rewrite]
            redirect_policy = "passthrough"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.max_redirects, 10);
        assert_eq!(config.upstream.timeout_secs, 30);
        assert_eq!(config.upstream.target_url, "https://my.utaipei.edu.tw");
        assert_eq!(config.rewrite.redirect_policy, RedirectPolicy::Passthrough);
        assert_eq!(config.cookies.mode, CookieModeSetting::Auto);
        assert_eq!(config.cookies.auth_keywords.len(), 5);
    }

    #[test]
    fn test_aliases_from_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [[upstream.aliases]]
            origin = "https://course.example.edu"
            public_prefix = "/course"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.upstream.aliases,
            vec![AliasConfig {
                origin: "https://course.example.edu".into(),
                public_prefix: "/course".into(),
            }]
        );
    }
}

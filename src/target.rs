//! The upstream/public origin pair every rewrite is defined against.

use std::net::IpAddr;

use url::Url;

use crate::config::UpstreamConfig;

/// A secondary upstream host published under a path prefix of the public origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamAlias {
    pub origin: Url,
    pub public_prefix: String,
}

/// Immutable per process. Built once from config at startup.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    target_origin: Url,
    public_origin: Url,
    aliases: Vec<UpstreamAlias>,
    loopback_prefix: String,
}

impl UpstreamTarget {
    pub fn new(target_origin: Url, public_origin: Url) -> Self {
        Self {
            target_origin,
            public_origin,
            aliases: Vec::new(),
            loopback_prefix: String::new(),
        }
    }

    pub fn with_alias(mut self, origin: Url, public_prefix: impl Into<String>) -> Self {
        self.aliases.push(UpstreamAlias {
            origin,
            public_prefix: public_prefix.into(),
        });
        self
    }

    pub fn with_loopback_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.loopback_prefix = prefix.into();
        self
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, url::ParseError> {
        let mut target = Self::new(Url::parse(&config.target_url)?, Url::parse(&config.public_url)?)
            .with_loopback_prefix(config.loopback_prefix.clone());
        for alias in &config.aliases {
            target = target.with_alias(Url::parse(&alias.origin)?, alias.public_prefix.clone());
        }
        Ok(target)
    }

    pub fn target_url(&self) -> &Url {
        &self.target_origin
    }

    pub fn public_url(&self) -> &Url {
        &self.public_origin
    }

    pub fn aliases(&self) -> &[UpstreamAlias] {
        &self.aliases
    }

    pub fn loopback_prefix(&self) -> &str {
        &self.loopback_prefix
    }

    /// `scheme://host[:port]` of the upstream, no trailing slash.
    pub fn target_origin(&self) -> String {
        origin_of(&self.target_origin)
    }

    /// `scheme://host[:port]` of the public origin, no trailing slash.
    pub fn public_origin(&self) -> String {
        origin_of(&self.public_origin)
    }

    pub fn target_host(&self) -> &str {
        self.target_origin.host_str().unwrap_or_default()
    }

    pub fn public_host(&self) -> &str {
        self.public_origin.host_str().unwrap_or_default()
    }

    pub fn public_is_https(&self) -> bool {
        self.public_origin.scheme() == "https"
    }

    pub fn public_is_loopback(&self) -> bool {
        is_loopback_host(self.public_host())
    }

    /// Best-effort registrable domain of the upstream host: the host minus its
    /// first label when it has more than two labels.
    pub fn upstream_registrable_domain(&self) -> String {
        registrable_domain(self.target_host())
    }
}

/// `scheme://host[:port]` with default ports omitted.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// `localhost`, `127.0.0.0/8` and `::1`.
pub fn is_loopback_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_start_matches('.').to_ascii_lowercase();
    if host.parse::<IpAddr>().is_ok() {
        return host;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 2 {
        labels[1..].join(".")
    } else {
        host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> UpstreamTarget {
        UpstreamTarget::from_config(&UpstreamConfig::default()).unwrap()
    }

    #[test]
    fn test_origins_have_no_trailing_slash() {
        let t = target();
        assert_eq!(t.target_origin(), "https://my.utaipei.edu.tw");
        assert_eq!(t.public_origin(), "http://127.0.0.1:8080");
        assert_eq!(t.aliases().len(), 1);
        assert_eq!(t.loopback_prefix(), "/utaipei");
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("127.8.9.10"));
        assert!(is_loopback_host("[::1]"));
        assert!(!is_loopback_host("my.utaipei.edu.tw"));
        assert!(target().public_is_loopback());
        assert!(!target().public_is_https());
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(target().upstream_registrable_domain(), "utaipei.edu.tw");
        assert_eq!(registrable_domain("example.com"), "example.com");
        assert_eq!(registrable_domain(".www.example.com"), "example.com");
        assert_eq!(registrable_domain("10.0.0.1"), "10.0.0.1");
    }
}

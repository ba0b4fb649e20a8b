//! Set-Cookie translation between the upstream domain and the public host.
//!
//! # Responsibilities
//! - Parse one `Set-Cookie` value into an ordered attribute list
//! - Rewrite Domain/Path/Secure/SameSite for the public origin
//! - In production, emit a second cookie scoped to the upstream's own domain
//!
//! # Design Decisions
//! - Attributes keep their original order; only the ones we touch change
//! - `Path` is rewritten in place, never duplicated
//! - `SameSite=None` is never emitted without `Secure`
//! - Values that do not parse as `name=value` pass through untouched

use std::fmt;
use std::sync::Arc;

use crate::config::{CookieConfig, CookieModeSetting};
use crate::cookies::policy::{AuthCookiePolicy, KeywordAuthPolicy};
use crate::target::UpstreamTarget;

/// Translation profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieMode {
    /// Public host is a loopback address; cookies become host-only.
    Local,
    /// Public host is a real domain; cookies are re-scoped to it.
    Production,
}

/// Parsed `SameSite` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Attribute {
    Domain(String),
    Path(String),
    Secure,
    SameSite(String),
    Other(String),
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Domain(v) => write!(f, "Domain={}", v),
            Attribute::Path(v) => write!(f, "Path={}", v),
            Attribute::Secure => write!(f, "Secure"),
            Attribute::SameSite(v) => write!(f, "SameSite={}", v),
            Attribute::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Ordered view of one `Set-Cookie` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributeSet {
    pub name: String,
    pub value: String,
    attributes: Vec<Attribute>,
}

impl CookieAttributeSet {
    /// Parse a raw header value; `None` when there is no `name=value` pair.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut segments = raw.split(';');
        let (name, value) = segments.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let attributes = segments
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|segment| {
                let (key, val) = match segment.split_once('=') {
                    Some((k, v)) => (k.trim(), Some(v.trim())),
                    None => (segment, None),
                };
                match (key.to_ascii_lowercase().as_str(), val) {
                    ("domain", Some(v)) => Attribute::Domain(v.to_string()),
                    ("path", Some(v)) => Attribute::Path(v.to_string()),
                    ("secure", _) => Attribute::Secure,
                    ("samesite", Some(v)) => Attribute::SameSite(v.to_string()),
                    _ => Attribute::Other(segment.to_string()),
                }
            })
            .collect();

        Some(Self {
            name: name.to_string(),
            value: value.trim().to_string(),
            attributes,
        })
    }

    pub fn domain(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Domain(d) => Some(d.as_str()),
            _ => None,
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Path(p) => Some(p.as_str()),
            _ => None,
        })
    }

    pub fn secure(&self) -> bool {
        self.attributes.iter().any(|a| matches!(a, Attribute::Secure))
    }

    pub fn has_same_site(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| matches!(a, Attribute::SameSite(_)))
    }

    pub fn same_site(&self) -> Option<SameSite> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::SameSite(v) => SameSite::parse(v),
            _ => None,
        })
    }

    pub fn remove_domain(&mut self) {
        self.attributes.retain(|a| !matches!(a, Attribute::Domain(_)));
    }

    /// Replace the first Domain in place (dropping any others), else append.
    pub fn set_domain(&mut self, domain: &str) {
        self.replace_or_append(
            |a| matches!(a, Attribute::Domain(_)),
            Attribute::Domain(domain.to_string()),
        );
    }

    /// Replace the first Path in place (dropping any others), else append.
    pub fn set_path(&mut self, path: &str) {
        self.replace_or_append(
            |a| matches!(a, Attribute::Path(_)),
            Attribute::Path(path.to_string()),
        );
    }

    pub fn remove_secure(&mut self) {
        self.attributes.retain(|a| !matches!(a, Attribute::Secure));
    }

    pub fn ensure_secure(&mut self) {
        if !self.secure() {
            self.attributes.push(Attribute::Secure);
        }
    }

    pub fn set_same_site(&mut self, same_site: SameSite) {
        self.replace_or_append(
            |a| matches!(a, Attribute::SameSite(_)),
            Attribute::SameSite(same_site.to_string()),
        );
    }

    fn replace_or_append(&mut self, is_target: impl Fn(&Attribute) -> bool, attr: Attribute) {
        match self.attributes.iter().position(&is_target) {
            Some(idx) => {
                self.attributes[idx] = attr;
                let mut seen = 0usize;
                self.attributes.retain(|a| {
                    if is_target(a) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.attributes.push(attr),
        }
    }
}

impl fmt::Display for CookieAttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        for attr in &self.attributes {
            write!(f, "; {}", attr)?;
        }
        Ok(())
    }
}

/// Result of translating one upstream `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedCookie {
    pub primary: String,
    pub secondary: Option<String>,
}

/// SameSite for a cookie that arrived without one.
///
/// Auth cookies must survive the cross-site hops of the login flow, so over
/// HTTPS they get `None`; over plain HTTP browsers drop `None` cookies, so
/// `Lax` is the most permissive usable value. Other cookies follow the scheme.
pub fn same_site_for(is_auth: bool, https: bool) -> SameSite {
    match (is_auth, https) {
        (true, true) => SameSite::None,
        (true, false) => SameSite::Lax,
        (false, true) => SameSite::None,
        (false, false) => SameSite::Lax,
    }
}

/// Rewrites upstream `Set-Cookie` values for the public origin.
#[derive(Debug, Clone)]
pub struct CookieTranslator {
    mode: CookieMode,
    public_host: String,
    public_https: bool,
    upstream_domain: String,
    policy: Arc<dyn AuthCookiePolicy>,
}

impl CookieTranslator {
    pub fn new(target: &UpstreamTarget, mode: CookieMode) -> Self {
        Self {
            mode,
            public_host: target.public_host().to_string(),
            public_https: target.public_is_https(),
            upstream_domain: target.upstream_registrable_domain(),
            policy: Arc::new(KeywordAuthPolicy::default()),
        }
    }

    pub fn from_config(target: &UpstreamTarget, config: &CookieConfig) -> Self {
        let mode = match config.mode {
            CookieModeSetting::Local => CookieMode::Local,
            CookieModeSetting::Production => CookieMode::Production,
            CookieModeSetting::Auto if target.public_is_loopback() => CookieMode::Local,
            CookieModeSetting::Auto => CookieMode::Production,
        };
        let mut translator = Self::new(target, mode)
            .with_policy(Arc::new(KeywordAuthPolicy::new(config.auth_keywords.clone())));
        if let Some(domain) = &config.upstream_domain {
            translator.upstream_domain = domain.trim_start_matches('.').to_ascii_lowercase();
        }
        translator
    }

    pub fn with_policy(mut self, policy: Arc<dyn AuthCookiePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_upstream_domain(mut self, domain: impl Into<String>) -> Self {
        self.upstream_domain = domain.into();
        self
    }

    pub fn mode(&self) -> CookieMode {
        self.mode
    }

    pub fn translate(&self, raw: &str) -> TranslatedCookie {
        let Some(parsed) = CookieAttributeSet::parse(raw) else {
            tracing::debug!(cookie = %raw, "Unparsable Set-Cookie passed through");
            return TranslatedCookie {
                primary: raw.to_string(),
                secondary: None,
            };
        };

        let translated = match self.mode {
            CookieMode::Local => TranslatedCookie {
                primary: self.local(parsed).to_string(),
                secondary: None,
            },
            CookieMode::Production => TranslatedCookie {
                primary: self.production(parsed.clone()).to_string(),
                secondary: Some(self.shared_domain(parsed).to_string()),
            },
        };

        tracing::debug!(
            mode = ?self.mode,
            original = %raw,
            primary = %translated.primary,
            secondary = ?translated.secondary,
            "Set-Cookie translated"
        );
        translated
    }

    fn local(&self, mut cookie: CookieAttributeSet) -> CookieAttributeSet {
        if cookie.domain().is_some_and(|d| self.is_upstream_domain(d)) {
            cookie.remove_domain();
        }
        if !self.public_https {
            cookie.remove_secure();
        }
        cookie.set_path("/");
        if !cookie.has_same_site() {
            self.apply_same_site(&mut cookie, self.public_https);
        }
        self.enforce_none_requires_secure(&mut cookie, self.public_https);
        cookie
    }

    fn production(&self, mut cookie: CookieAttributeSet) -> CookieAttributeSet {
        if cookie.domain().is_some() {
            cookie.set_domain(&self.public_host);
        }
        if !self.public_https {
            cookie.remove_secure();
        }
        cookie.set_path("/");
        self.enforce_none_requires_secure(&mut cookie, self.public_https);
        cookie
    }

    /// Copy readable by every subdomain of the upstream's registrable domain.
    fn shared_domain(&self, mut cookie: CookieAttributeSet) -> CookieAttributeSet {
        cookie.set_domain(&format!(".{}", self.upstream_domain));
        cookie.ensure_secure();
        cookie.set_path("/");
        if !cookie.has_same_site() {
            self.apply_same_site(&mut cookie, true);
        }
        cookie
    }

    fn apply_same_site(&self, cookie: &mut CookieAttributeSet, https: bool) {
        let is_auth = self.policy.is_auth_cookie(&cookie.name, &cookie.value);
        let same_site = same_site_for(is_auth, https);
        cookie.set_same_site(same_site);
        if same_site == SameSite::None {
            cookie.ensure_secure();
        }
        tracing::trace!(name = %cookie.name, is_auth, https, %same_site, "SameSite applied");
    }

    fn enforce_none_requires_secure(&self, cookie: &mut CookieAttributeSet, https: bool) {
        if cookie.same_site() == Some(SameSite::None) && !cookie.secure() {
            if https {
                cookie.ensure_secure();
            } else {
                cookie.set_same_site(SameSite::Lax);
            }
        }
    }

    fn is_upstream_domain(&self, domain: &str) -> bool {
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        domain == self.upstream_domain || domain.ends_with(&format!(".{}", self.upstream_domain))
    }
}

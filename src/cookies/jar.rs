//! Process-wide upstream cookie jar.
//!
//! # Responsibilities
//! - Remember cookies the upstream sets on any hop of any relay
//! - Replay them on later upstream calls (domain/path/secure matching)
//!
//! # Design Decisions
//! - One `Mutex` around the whole map; relays are short and contention is low
//! - Created once at startup, lives for the process, never evicted; expired
//!   cookies are skipped on read and removed when the upstream deletes them
//! - Not partitioned per client: concurrent sessions sharing one proxy share
//!   the jar, which is a known multi-tenant hazard

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use cookie::Cookie;
use reqwest::header::HeaderValue;
use url::Url;

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    host_only: bool,
    secure: bool,
    expires_at: Option<i64>,
}

impl StoredCookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// domain → (path, name) → cookie
type CookieMap = HashMap<String, BTreeMap<(String, String), StoredCookie>>;

/// Lock-protected cookie jar shared by every upstream call.
#[derive(Debug, Default)]
pub struct SharedCookieJar {
    inner: Mutex<CookieMap>,
}

impl SharedCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CookieMap> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record one `Set-Cookie` value received from `url`.
    pub fn store(&self, set_cookie: &str, url: &Url) {
        let Some(host) = url.host_str().map(|h| h.to_ascii_lowercase()) else {
            return;
        };
        let parsed = match Cookie::parse(set_cookie) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "Ignoring unparsable upstream cookie");
                return;
            }
        };

        let (domain, host_only) = match parsed.domain() {
            Some(d) if !d.trim_start_matches('.').is_empty() => {
                let d = d.trim_start_matches('.').to_ascii_lowercase();
                if !domain_matches(&host, &d) {
                    tracing::debug!(cookie = %parsed.name(), domain = %d, host = %host, "Rejecting cookie for foreign domain");
                    return;
                }
                (d, false)
            }
            _ => (host, true),
        };
        let path = match parsed.path() {
            Some(p) if p.starts_with('/') => p.to_string(),
            _ => default_path(url),
        };

        let now = unix_now();
        let expires_at = match parsed.max_age() {
            Some(age) => Some(now.saturating_add(age.whole_seconds())),
            None => parsed.expires_datetime().map(|t| t.unix_timestamp()),
        };

        let key = (path, parsed.name().to_string());
        let mut jar = self.lock();
        let entries = jar.entry(domain).or_default();
        if expires_at.is_some_and(|at| at <= now) {
            entries.remove(&key);
            return;
        }
        entries.insert(
            key,
            StoredCookie {
                value: parsed.value().to_string(),
                host_only,
                secure: parsed.secure().unwrap_or(false),
                expires_at,
            },
        );
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        let path = url.path();
        let https = url.scheme() == "https";
        let now = unix_now();

        let jar = self.lock();
        let mut matched: Vec<(usize, &str, &str)> = jar
            .iter()
            .filter(|(domain, _)| domain_matches(&host, domain))
            .flat_map(|(domain, entries)| {
                entries.iter().filter_map(|((cookie_path, name), cookie)| {
                    let host_ok = !cookie.host_only || host == *domain;
                    let ok = host_ok
                        && path_matches(path, cookie_path)
                        && (https || !cookie.secure)
                        && !cookie.is_expired(now);
                    ok.then_some((cookie_path.len(), name.as_str(), cookie.value.as_str()))
                })
            })
            .collect();

        if matched.is_empty() {
            return None;
        }
        // Longer paths first.
        matched.sort_by(|a, b| b.0.cmp(&a.0));
        Some(
            matched
                .iter()
                .map(|(_, name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Number of stored cookies, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl reqwest::cookie::CookieStore for SharedCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for value in cookie_headers {
            if let Ok(raw) = value.to_str() {
                self.store(raw, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.cookie_header(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

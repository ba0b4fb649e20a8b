//! Upstream request header normalization.
//!
//! # Responsibilities
//! - Copy inbound headers minus the ones the client library owns
//! - Make every hop look like a direct browser visit to the upstream
//! - Merge the shared jar's cookies into the client's `Cookie` header
//!
//! # Design Decisions
//! - Rebuilt from the inbound headers on every hop; nothing carries over
//! - The inbound cookie wins when both sides carry the same name
//! - `Accept-Encoding` is pinned to encodings the client decodes, so bodies
//!   arrive rewritable

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::Method;
use url::Url;

use crate::config::UpstreamConfig;

/// Headers that describe a single transport connection.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub const XHR_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
pub const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub const UPSTREAM_ACCEPT_ENCODING: &str = "gzip, deflate";

/// Static part of header normalization, built once from config.
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub strip_hop_by_hop: bool,
    pub default_user_agent: String,
    pub default_accept_language: String,
    pub auth_path_markers: Vec<String>,
    pub entry_path: String,
}

impl HeaderProfile {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            strip_hop_by_hop: config.strip_hop_by_hop,
            default_user_agent: config.default_user_agent.clone(),
            default_accept_language: config.default_accept_language.clone(),
            auth_path_markers: config
                .auth_path_markers
                .iter()
                .map(|m| m.to_ascii_lowercase())
                .collect(),
            entry_path: config.entry_path.clone(),
        }
    }

    fn is_auth_url(&self, url: &Url) -> bool {
        let url = url.as_str().to_ascii_lowercase();
        self.auth_path_markers.iter().any(|m| url.contains(m.as_str()))
    }
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self::from_config(&UpstreamConfig::default())
    }
}

/// Per-hop inputs.
#[derive(Debug, Clone, Copy)]
pub struct HopContext<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    /// Origin of the upstream this relay targets.
    pub upstream_origin: &'a str,
    /// Origin clients use to reach the proxy.
    pub public_origin: &'a str,
    /// Cookies the shared jar holds for `url`.
    pub jar_cookies: Option<&'a str>,
}

/// Build the header map for one upstream hop.
pub fn normalize(inbound: &HeaderMap, hop: HopContext<'_>, profile: &HeaderProfile) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(inbound.len() + 8);

    for (name, value) in inbound {
        if is_excluded(name, profile) {
            continue;
        }
        let value = retarget_value(value, hop.public_origin, hop.upstream_origin);
        out.append(name.clone(), value);
    }

    let cookie = merge_cookies(inbound, hop.jar_cookies);
    out.remove(header::COOKIE);
    if let Some(value) = cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        out.insert(header::COOKIE, value);
    }

    let entry_referer = format!("{}{}", hop.upstream_origin, profile.entry_path);
    let auth = profile.is_auth_url(hop.url);
    if auth || !out.contains_key(header::REFERER) {
        insert_str(&mut out, header::REFERER, &entry_referer);
    }
    if auth || !out.contains_key(header::ORIGIN) {
        insert_str(&mut out, header::ORIGIN, hop.upstream_origin);
    }

    if !out.contains_key(header::USER_AGENT) {
        insert_str(&mut out, header::USER_AGENT, &profile.default_user_agent);
    }

    let is_xhr = inbound
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    if !out.contains_key(header::ACCEPT) {
        out.insert(
            header::ACCEPT,
            HeaderValue::from_static(if is_xhr { XHR_ACCEPT } else { HTML_ACCEPT }),
        );
    }

    if !out.contains_key(header::ACCEPT_LANGUAGE) {
        insert_str(&mut out, header::ACCEPT_LANGUAGE, &profile.default_accept_language);
    }
    out.insert(
        header::ACCEPT_ENCODING,
        HeaderValue::from_static(UPSTREAM_ACCEPT_ENCODING),
    );
    out.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    out.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

    if *hop.method == Method::GET && !out.contains_key(header::UPGRADE_INSECURE_REQUESTS) {
        out.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    }

    out
}

fn is_excluded(name: &HeaderName, profile: &HeaderProfile) -> bool {
    if *name == header::HOST || *name == header::CONTENT_LENGTH || *name == header::ACCEPT_ENCODING {
        return true;
    }
    profile.strip_hop_by_hop && HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn retarget_value(value: &HeaderValue, public_origin: &str, upstream_origin: &str) -> HeaderValue {
    match value.to_str() {
        Ok(text) if text.contains(public_origin) => {
            HeaderValue::from_str(&text.replace(public_origin, upstream_origin))
                .unwrap_or_else(|_| value.clone())
        }
        _ => value.clone(),
    }
}

/// Inbound `Cookie` pairs plus jar pairs whose names the client did not send.
pub fn merge_cookies(inbound: &HeaderMap, jar: Option<&str>) -> Option<String> {
    let mut pairs: Vec<String> = inbound
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let names: Vec<String> = pairs.iter().map(|p| cookie_name(p).to_string()).collect();
    if let Some(jar) = jar {
        for pair in jar.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            if !names.iter().any(|n| n == cookie_name(pair)) {
                pairs.push(pair.to_string());
            }
        }
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

fn cookie_name(pair: &str) -> &str {
    pair.split_once('=').map_or(pair, |(name, _)| name).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPSTREAM: &str = "https://my.utaipei.edu.tw";
    const PUBLIC: &str = "http://127.0.0.1:8080";

    fn hop<'a>(method: &'a Method, url: &'a Url, jar: Option<&'a str>) -> HopContext<'a> {
        HopContext {
            method,
            url,
            upstream_origin: UPSTREAM,
            public_origin: PUBLIC,
            jar_cookies: jar,
        }
    }

    #[test]
    fn test_browser_defaults_are_filled() {
        let url = Url::parse("https://my.utaipei.edu.tw/utaipei/main.jsp").unwrap();
        let out = normalize(&HeaderMap::new(), hop(&Method::GET, &url, None), &HeaderProfile::default());

        assert_eq!(out["referer"], "https://my.utaipei.edu.tw/utaipei/index_sky.html");
        assert_eq!(out["origin"], UPSTREAM);
        assert!(out["user-agent"].to_str().unwrap().contains("Chrome/120"));
        assert_eq!(out["accept"], HTML_ACCEPT);
        assert_eq!(out["accept-language"], "zh-TW,zh;q=0.9,en;q=0.8");
        assert_eq!(out["accept-encoding"], "gzip, deflate");
        assert_eq!(out["cache-control"], "no-cache");
        assert_eq!(out["pragma"], "no-cache");
        assert_eq!(out["upgrade-insecure-requests"], "1");
        assert!(!out.contains_key("cookie"));
    }

    #[test]
    fn test_public_origin_is_retargeted_and_transport_headers_dropped() {
        let url = Url::parse("https://my.utaipei.edu.tw/utaipei/list.jsp").unwrap();
        let mut inbound = HeaderMap::new();
        inbound.insert("host", HeaderValue::from_static("127.0.0.1:8080"));
        inbound.insert("content-length", HeaderValue::from_static("12"));
        inbound.insert("connection", HeaderValue::from_static("keep-alive"));
        inbound.insert("accept-encoding", HeaderValue::from_static("br"));
        inbound.insert("referer", HeaderValue::from_static("http://127.0.0.1:8080/utaipei/a.jsp"));
        inbound.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));

        let out = normalize(&inbound, hop(&Method::POST, &url, None), &HeaderProfile::default());
        assert!(!out.contains_key("host"));
        assert!(!out.contains_key("content-length"));
        assert!(!out.contains_key("connection"));
        assert!(!out.contains_key("upgrade-insecure-requests"));
        assert_eq!(out["accept-encoding"], "gzip, deflate");
        assert_eq!(out["referer"], "https://my.utaipei.edu.tw/utaipei/a.jsp");
        assert_eq!(out["accept"], XHR_ACCEPT);
    }

    #[test]
    fn test_client_accept_is_kept() {
        let url = Url::parse("https://my.utaipei.edu.tw/utaipei/logo.png").unwrap();
        let mut inbound = HeaderMap::new();
        inbound.insert("accept", HeaderValue::from_static("image/avif,image/webp,*/*"));

        let out = normalize(&inbound, hop(&Method::GET, &url, None), &HeaderProfile::default());
        assert_eq!(out["accept"], "image/avif,image/webp,*/*");
    }

    #[test]
    fn test_hop_by_hop_kept_when_profile_allows() {
        let url = Url::parse("https://my.utaipei.edu.tw/").unwrap();
        let mut inbound = HeaderMap::new();
        inbound.insert("upgrade", HeaderValue::from_static("h2c"));
        let profile = HeaderProfile {
            strip_hop_by_hop: false,
            ..HeaderProfile::default()
        };
        let out = normalize(&inbound, hop(&Method::GET, &url, None), &profile);
        assert_eq!(out["upgrade"], "h2c");
    }

    #[test]
    fn test_auth_urls_pin_referer_and_origin() {
        let url = Url::parse("https://my.utaipei.edu.tw/uaa/login").unwrap();
        let mut inbound = HeaderMap::new();
        inbound.insert("referer", HeaderValue::from_static("https://elsewhere.test/x"));
        inbound.insert("origin", HeaderValue::from_static("https://elsewhere.test"));

        let out = normalize(&inbound, hop(&Method::GET, &url, None), &HeaderProfile::default());
        assert_eq!(out["referer"], "https://my.utaipei.edu.tw/utaipei/index_sky.html");
        assert_eq!(out["origin"], UPSTREAM);
    }

    #[test]
    fn test_cookie_merge_inbound_wins() {
        let url = Url::parse("https://my.utaipei.edu.tw/utaipei/").unwrap();
        let mut inbound = HeaderMap::new();
        inbound.insert("cookie", HeaderValue::from_static(" JSESSIONID=client ; lang=zh "));

        let out = normalize(
            &inbound,
            hop(&Method::GET, &url, Some("JSESSIONID=jar; sso=1")),
            &HeaderProfile::default(),
        );
        assert_eq!(out["cookie"], "JSESSIONID=client; lang=zh; sso=1");
    }

    #[test]
    fn test_cookie_from_jar_only() {
        assert_eq!(
            merge_cookies(&HeaderMap::new(), Some("a=1")).as_deref(),
            Some("a=1")
        );
        assert_eq!(merge_cookies(&HeaderMap::new(), None), None);
    }
}

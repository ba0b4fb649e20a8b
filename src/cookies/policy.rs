//! Authentication-cookie heuristics.
//!
//! Deciding whether a cookie carries session/auth state is a guess based on
//! its name and value. It lives behind a trait so deployments can swap the
//! guess without touching the translator.

/// Decides whether a cookie should be treated as authentication-related.
pub trait AuthCookiePolicy: Send + Sync + std::fmt::Debug {
    fn is_auth_cookie(&self, name: &str, value: &str) -> bool;
}

/// Case-insensitive substring match of the name or value against keywords.
#[derive(Debug, Clone)]
pub struct KeywordAuthPolicy {
    keywords: Vec<String>,
}

impl KeywordAuthPolicy {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_ascii_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Default for KeywordAuthPolicy {
    fn default() -> Self {
        Self::new(["jsessionid", "auth", "login", "session", "user"])
    }
}

impl AuthCookiePolicy for KeywordAuthPolicy {
    fn is_auth_cookie(&self, name: &str, value: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let value = value.to_ascii_lowercase();
        self.keywords
            .iter()
            .any(|k| name.contains(k.as_str()) || value.contains(k.as_str()))
    }
}

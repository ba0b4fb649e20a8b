//! Literal URL substitution.
//!
//! # Responsibilities
//! - Retarget absolute upstream URLs (both schemes) to the public origin
//! - Retarget alias hosts to their public sub-path
//! - Retarget embedded loopback URLs under the loopback prefix
//!
//! # Design Decisions
//! - One compiled alternation, scanned once per body
//! - The public origin is an alternative of its own so already rewritten text
//!   is matched and left alone, making repeated application a no-op
//! - Works on bytes; bodies are not required to be valid UTF-8

use std::borrow::Cow;

use regex::bytes::{Captures, Regex};
use url::Url;

use crate::target::UpstreamTarget;

const LOOPBACK_PATTERN: &str = r"(?:https?:)?//(?:localhost|127\.0\.0\.1)(?::\d+)?\b";

#[derive(Debug, Clone)]
enum Substitution {
    Keep,
    /// Replacement plus the lowercased authority the alternative matches.
    Replace { with: String, authority: String },
    Loopback(String),
}

/// Compiled substitution table for one `UpstreamTarget`.
#[derive(Debug, Clone)]
pub struct UrlRewriter {
    pattern: Regex,
    /// Indexed by capture group minus one.
    substitutions: Vec<Substitution>,
    public_authority: String,
}

impl UrlRewriter {
    pub fn new(target: &UpstreamTarget) -> Result<Self, regex::Error> {
        let public_origin = target.public_origin();
        let mut alternatives = Vec::new();
        let mut substitutions = Vec::new();

        alternatives.push(format!(r"{}\b", regex::escape(&public_origin)));
        substitutions.push(Substitution::Keep);

        alternatives.push(origin_pattern(target.target_url()));
        substitutions.push(Substitution::Replace {
            with: public_origin.clone(),
            authority: authority_of(target.target_url()).to_ascii_lowercase(),
        });

        for alias in target.aliases() {
            alternatives.push(origin_pattern(&alias.origin));
            substitutions.push(Substitution::Replace {
                with: format!("{}{}", public_origin, alias.public_prefix),
                authority: authority_of(&alias.origin).to_ascii_lowercase(),
            });
        }

        alternatives.push(LOOPBACK_PATTERN.to_string());
        substitutions.push(Substitution::Loopback(format!(
            "{}{}",
            public_origin,
            target.loopback_prefix()
        )));

        let pattern = alternatives
            .iter()
            .map(|alt| format!("({})", alt))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            pattern: Regex::new(&format!("(?i){}", pattern))?,
            substitutions,
            public_authority: authority_of(target.public_url()).to_ascii_lowercase(),
        })
    }

    /// Apply every substitution to `input`. Borrows when nothing changed.
    pub fn substitute<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        self.pattern.replace_all(input, |caps: &Captures<'_>| {
            let (index, matched) = matched_alternative(caps);
            self.replacement(index, matched)
                .map(|with| with.as_bytes().to_vec())
                .unwrap_or_else(|| matched.to_vec())
        })
    }

    /// Number of places `substitute` would change.
    pub fn count_rewrites(&self, input: &[u8]) -> usize {
        self.pattern
            .captures_iter(input)
            .filter(|caps| {
                let (index, matched) = matched_alternative(caps);
                self.replacement(index, matched).is_some()
            })
            .count()
    }

    /// Rewrite a single header value such as `Location` or `Refresh`.
    pub fn substitute_str(&self, input: &str) -> String {
        String::from_utf8_lossy(&self.substitute(input.as_bytes())).into_owned()
    }

    /// What a match of alternative `index` becomes, or `None` to keep it.
    fn replacement(&self, index: usize, matched: &[u8]) -> Option<&str> {
        match &self.substitutions[index] {
            Substitution::Keep => None,
            Substitution::Replace { with, authority } => {
                let text = String::from_utf8_lossy(matched).to_ascii_lowercase();
                let port = text
                    .split_once("//")
                    .and_then(|(_, rest)| rest.strip_prefix(authority.as_str()))
                    .unwrap_or_default();
                // Another port is another service on the same host.
                matches!(port, "" | ":80" | ":443").then_some(with.as_str())
            }
            Substitution::Loopback(with) => {
                (!self.is_public_authority(matched)).then_some(with.as_str())
            }
        }
    }

    fn is_public_authority(&self, matched: &[u8]) -> bool {
        let text = String::from_utf8_lossy(matched).to_ascii_lowercase();
        let authority = text.split("//").nth(1).unwrap_or_default();
        authority == self.public_authority
    }
}

/// Index of the alternative that matched, and the matched bytes.
fn matched_alternative<'h>(caps: &Captures<'h>) -> (usize, &'h [u8]) {
    caps.iter()
        .skip(1)
        .enumerate()
        .find_map(|(i, m)| m.map(|m| (i, m.as_bytes())))
        .unwrap_or((0, &[][..]))
}

fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// `http`, `https` and scheme-relative forms of an origin, with any explicit port.
fn origin_pattern(url: &Url) -> String {
    format!(r"(?:https?:)?//{}(?::\d+)?\b", regex::escape(&authority_of(url)))
}

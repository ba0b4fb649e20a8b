//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate origins are absolute http(s) URLs
//! - Validate value ranges (redirect bound, timeouts > 0)
//! - Validate route prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::ProxyConfig;

/// Upper bound for `upstream.max_redirects`.
pub const MAX_REDIRECT_BOUND: u32 = 100;

/// Paths served locally, never relayed.
const RESERVED_PREFIXES: &[&str] = &["/api", "/assets", "/font"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let upstream = &config.upstream;

    check_origin("upstream.target_url", &upstream.target_url, &mut errors);
    check_origin("upstream.public_url", &upstream.public_url, &mut errors);

    for (i, alias) in upstream.aliases.iter().enumerate() {
        check_origin(&format!("upstream.aliases[{}].origin", i), &alias.origin, &mut errors);
        check_prefix(
            &format!("upstream.aliases[{}].public_prefix", i),
            &alias.public_prefix,
            &mut errors,
        );
    }

    if upstream.route_prefixes.is_empty() {
        errors.push(ValidationError::new(
            "upstream.route_prefixes",
            "at least one prefix is required",
        ));
    }
    for (i, prefix) in upstream.route_prefixes.iter().enumerate() {
        check_prefix(&format!("upstream.route_prefixes[{}]", i), prefix, &mut errors);
    }

    let mut mounted: Vec<&str> = Vec::new();
    let all_prefixes = upstream
        .route_prefixes
        .iter()
        .map(String::as_str)
        .chain(upstream.aliases.iter().map(|a| a.public_prefix.as_str()));
    for prefix in all_prefixes {
        if mounted.contains(&prefix) {
            errors.push(ValidationError::new(
                "upstream",
                format!("prefix {} is mounted more than once", prefix),
            ));
        } else if RESERVED_PREFIXES.contains(&prefix) {
            errors.push(ValidationError::new(
                "upstream",
                format!("prefix {} is reserved", prefix),
            ));
        }
        mounted.push(prefix);
    }

    if !upstream.loopback_prefix.is_empty() && !upstream.loopback_prefix.starts_with('/') {
        errors.push(ValidationError::new(
            "upstream.loopback_prefix",
            "must be empty or start with '/'",
        ));
    }

    if !upstream.entry_path.starts_with('/') {
        errors.push(ValidationError::new("upstream.entry_path", "must start with '/'"));
    }

    if upstream.max_redirects == 0 || upstream.max_redirects > MAX_REDIRECT_BOUND {
        errors.push(ValidationError::new(
            "upstream.max_redirects",
            format!("must be between 1 and {}", MAX_REDIRECT_BOUND),
        ));
    }

    if upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be greater than 0"));
    }

    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "listener.max_body_bytes",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_origin(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
        Ok(_) => errors.push(ValidationError::new(field, "must be an absolute http(s) URL")),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}

fn check_prefix(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if !value.starts_with('/') || value == "/" || value.ends_with('/') {
        errors.push(ValidationError::new(
            field,
            "must start with '/', not end with '/', and not be the root",
        ));
    }
}

//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Values taken from the command line / environment.
///
/// `*_url` wins over the matching `*_host` when both are present.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub target_url: Option<String>,
    pub target_host: Option<String>,
    pub proxy_url: Option<String>,
    pub proxy_host: Option<String>,
    pub log_level: Option<String>,
}

/// Load configuration: defaults, then the optional TOML file, then overrides.
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => ProxyConfig::default(),
    };
    apply_overrides(&mut config, overrides);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    load(Some(path), &Overrides::default())
}

fn parse_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Apply command line / environment overrides on top of a parsed config.
pub fn apply_overrides(config: &mut ProxyConfig, overrides: &Overrides) {
    if let Some(port) = overrides.port {
        config.listener.bind_address = replace_port(&config.listener.bind_address, port);
    }

    if let Some(url) = pick_origin(&overrides.target_url, &overrides.target_host, "https") {
        config.upstream.target_url = url;
    }

    if let Some(url) = pick_origin(&overrides.proxy_url, &overrides.proxy_host, "http") {
        config.upstream.public_url = url;
    }

    if let Some(level) = &overrides.log_level {
        config.observability.log_level = level.clone();
    }
}

fn pick_origin(url: &Option<String>, host: &Option<String>, default_scheme: &str) -> Option<String> {
    let raw = url
        .as_deref()
        .or(host.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())?;

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("{}://{}", default_scheme, raw)
    };
    Some(with_scheme.trim_end_matches('/').to_string())
}

fn replace_port(bind_address: &str, port: u16) -> String {
    let host = bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or("0.0.0.0");
    format!("{}:{}", host, port)
}

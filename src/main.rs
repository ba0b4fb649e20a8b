//! Rewriting reverse proxy for the University of Taipei portal.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::request ──▶ forward (hop loop) ──────▶ Upstream
//!                      (router,         (buffer body,     headers / redirect /       (my / shcourse)
//!                       request ID)      alias prefix)    SharedCookieJar
//!                                                              │
//!     Client Response                                          ▼
//!     ◀────────────── http::response ◀── rewrite (URLs, document injection, tables)
//!                      (classify, cookies translate, CORS, cache, status policy)
//!
//!     Cross-cutting: config · observability (tracing, metrics) · lifecycle (startup, signals)
//! ```
//!
//! Settings come from built-in defaults, an optional TOML file, then the
//! `PORT`, `TARGET_URL`/`TARGET_HOST`, `PROXY_URL`/`PROXY_HOST` and
//! `LOG_LEVEL` environment variables (or the matching flags).

use std::path::PathBuf;

use clap::Parser;

use rewrite_proxy::config::{loader, Overrides};
use rewrite_proxy::lifecycle::startup;

#[derive(Parser, Debug)]
#[command(name = "rewrite-proxy", version, about = "Transparent rewriting reverse proxy")]
struct Cli {
    /// Optional TOML config file
    #[arg(short, long, env = "REWRITE_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Listener port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Upstream origin, e.g. https://my.utaipei.edu.tw
    #[arg(long, env = "TARGET_URL")]
    target_url: Option<String>,

    /// Upstream host; https is assumed
    #[arg(long, env = "TARGET_HOST")]
    target_host: Option<String>,

    /// Public origin clients use to reach the proxy
    #[arg(long, env = "PROXY_URL")]
    proxy_url: Option<String>,

    /// Public host; http is assumed
    #[arg(long, env = "PROXY_HOST")]
    proxy_host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            target_url: self.target_url.clone(),
            target_host: self.target_host.clone(),
            proxy_url: self.proxy_url.clone(),
            proxy_host: self.proxy_host.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = loader::load(cli.config.as_deref(), &cli.overrides())?;
    startup::run(config).await?;

    Ok(())
}

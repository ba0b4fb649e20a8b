//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: relay prefixes, alias prefixes, entry redirect,
//!   static assets and the menu API
//! - Wire up middleware (request ID, tracing)
//! - Build every relay component once from the validated config
//! - Serve until the shutdown broadcast fires

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    set_header::SetResponseHeader,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::cookies::{CookieTranslator, SharedCookieJar};
use crate::forward::RequestForwarder;
use crate::http::request::{buffer_request, request_id, MakeRequestUuid, RelayRoute};
use crate::http::response::{InboundContext, ResponseAssembler, LONG_CACHE};
use crate::menu;
use crate::observability::metrics;
use crate::rewrite::BodyRewriter;
use crate::target::UpstreamTarget;

/// Failures while building the server from config.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid URL in upstream config: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to compile URL rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<RequestForwarder>,
    pub assembler: Arc<ResponseAssembler>,
    pub max_body_bytes: usize,
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let target = Arc::new(UpstreamTarget::from_config(&config.upstream)?);
        let jar = Arc::new(SharedCookieJar::new());
        let forwarder = RequestForwarder::new(target.clone(), jar, &config.upstream)?;
        let translator = CookieTranslator::from_config(&target, &config.cookies);
        let assembler = ResponseAssembler::new(
            BodyRewriter::new(&target)?,
            translator.clone(),
            config.rewrite.redirect_policy,
        );

        tracing::info!(
            target = %target.target_origin(),
            public = %target.public_origin(),
            cookie_mode = ?translator.mode(),
            redirect_policy = ?config.rewrite.redirect_policy,
            max_redirects = config.upstream.max_redirects,
            "Relay configured"
        );

        let state = AppState {
            forwarder: Arc::new(forwarder),
            assembler: Arc::new(assembler),
            max_body_bytes: config.listener.max_body_bytes,
        };

        let router = Self::build_router(&config, &target, state);
        Ok(Self { router, config })
    }

    fn build_router(config: &ProxyConfig, target: &UpstreamTarget, state: AppState) -> Router {
        let mut router = Router::new();

        let primary = RelayRoute::primary(target.target_url().clone());
        for prefix in &config.upstream.route_prefixes {
            router = mount_relay(router, prefix, primary.clone());
        }
        for alias in target.aliases() {
            let route = RelayRoute::alias(alias.origin.clone(), alias.public_prefix.clone());
            router = mount_relay(router, &alias.public_prefix, route);
        }

        let entry_path = config.upstream.entry_path.clone();
        let assets = Path::new(&config.assets.dir);

        router
            .route("/", get(move || entry_redirect(entry_path.clone())))
            .route("/api/parse-html", post(menu::parse_html_handler))
            .nest_service("/assets/img", static_dir(&assets.join("img")))
            .nest_service("/font", static_dir(&assets.join("font")))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %req.method(),
                            uri = %req.uri(),
                            request_id = %request_id(req.headers()),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.target_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The assembled router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Mount `prefix`, `prefix/` and everything below it; `{*path}` never matches
/// an empty tail.
fn mount_relay(router: Router<AppState>, prefix: &str, route: RelayRoute) -> Router<AppState> {
    [
        prefix.to_string(),
        format!("{}/", prefix),
        format!("{}/{{*path}}", prefix),
    ]
    .into_iter()
    .fold(router, |router, path| {
        let route = route.clone();
        router.route(
            &path,
            any(move |State(state): State<AppState>, request: Request<Body>| {
                relay_handler(state, route.clone(), request)
            }),
        )
    })
}

fn static_dir(dir: &Path) -> SetResponseHeader<ServeDir, HeaderValue> {
    SetResponseHeader::overriding(
        ServeDir::new(dir),
        header::CACHE_CONTROL,
        HeaderValue::from_static(LONG_CACHE),
    )
}

async fn entry_redirect(entry_path: String) -> Response {
    match HeaderValue::from_str(&entry_path) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Relay one request to its upstream and assemble the outbound response.
async fn relay_handler(state: AppState, route: RelayRoute, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let id = request_id(request.headers()).to_string();
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if method == Method::OPTIONS {
        tracing::debug!(request_id = %id, "Answering preflight locally");
        let response = state.assembler.preflight(origin.as_deref());
        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        return response;
    }

    let path = route.upstream_path(request.uri().path());
    tracing::debug!(
        request_id = %id,
        method = %method,
        path = %path,
        upstream = %route.upstream_base,
        "Relaying request"
    );

    let proxied = match buffer_request(request, path.clone(), state.max_body_bytes).await {
        Ok(proxied) => proxied,
        Err(e) => return fail(&id, &method, start, e),
    };

    match state.forwarder.forward(&route.upstream_base, proxied).await {
        Ok(upstream) => {
            metrics::record_redirect_hops(upstream.hops);
            tracing::debug!(
                request_id = %id,
                status = %upstream.status,
                hops = upstream.hops,
                final_url = %upstream.final_url,
                "Upstream relay finished"
            );
            let response = state.assembler.assemble(
                InboundContext {
                    path: &path,
                    origin: origin.as_deref(),
                },
                upstream,
            );
            metrics::record_request(method.as_str(), response.status().as_u16(), start);
            response
        }
        Err(e) => fail(&id, &method, start, e),
    }
}

fn fail(request_id: &str, method: &Method, start: Instant, error: crate::error::RelayError) -> Response {
    tracing::error!(request_id = %request_id, kind = error.kind(), error = %error, "Relay failed");
    metrics::record_upstream_error(error.kind());
    metrics::record_request(method.as_str(), error.status_code().as_u16(), start);
    error.into_response()
}

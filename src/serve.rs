//! Purpose: Provide the HTTP/JSON server for the snippet registry.
//! Exports: `ServeConfig`, `serve`, `validate_config`, `init_tracing`.
//! Role: Axum-based server; one static route per loaded snippet.
//! Invariants: Discovery and route binding finish before the listener accepts traffic.
//! Invariants: Error bodies are `{"detail": ...}`; status depends only on the error kind.
//! Invariants: Unregistered names fall through to axum's default 404.

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use snipserve::core::error::{Error, ErrorKind};
use snipserve::introspect::Descriptor;
use snipserve::registry::{Registry, RegistryOptions};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub project_name: String,
    pub api_prefix: String,
    pub cors_allowed_origins: Vec<String>,
    pub database_url: String,
    pub snippets_dir: PathBuf,
    pub max_body_bytes: u64,
    pub max_call_depth: usize,
}

impl ServeConfig {
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            api_prefix: self.api_prefix.clone(),
            max_depth: self.max_call_depth,
        }
    }
}

pub(crate) struct AppState {
    registry: Registry,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing("info");

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;
    let cors = cors_layer(&config.cors_allowed_origins)?;

    let registry = Registry::load_compiled(&config.snippets_dir, config.registry_options())?;
    tracing::info!(
        project = %config.project_name,
        loaded = registry.names().len(),
        skipped = registry.skipped().len(),
        "snippet registry ready"
    );
    tracing::debug!(database_url = %config.database_url, "storage connection configured; unused");

    let app = build_router(Arc::new(AppState { registry }), max_body_bytes, cors);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(bind = %config.bind, "listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    let prefix = config.api_prefix.as_str();
    if !prefix.is_empty() && !prefix.starts_with('/') {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--api-prefix must start with '/'")
            .with_hint("Use a value like /api, or an empty string for no prefix."));
    }
    if prefix.ends_with('/') {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--api-prefix must not end with '/'")
            .with_hint("Use a value like /api."));
    }
    if prefix
        .chars()
        .any(|ch| ch.is_whitespace() || matches!(ch, ':' | '*' | '{' | '}' | '?' | '#'))
    {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--api-prefix contains characters not allowed in a route path"));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }
    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }
    if config.max_call_depth == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-call-depth must be greater than zero")
            .with_hint("Use a positive value like 16."));
    }

    cors_layer(&config.cors_allowed_origins)?;
    Ok(())
}

pub fn init_tracing(default_directive: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn cors_layer(origins: &[String]) -> Result<Option<CorsLayer>, Error> {
    if origins.is_empty() {
        return Ok(None);
    }
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::mirror_request()
    } else {
        let values = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|err| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("invalid CORS origin: {origin}"))
                        .with_hint("Use an origin like http://localhost:3000.")
                        .with_source(err)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(values)
    };
    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
    ))
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize, cors: Option<CorsLayer>) -> Router {
    let registry = &state.registry;
    let mut router = Router::new()
        .route("/health", get(health))
        .route(&registry.catalogue_path(), get(list_snippets));

    for name in registry.names() {
        let snippet = name.clone();
        router = router.route(
            &registry.endpoint(name),
            post(
                move |State(state): State<Arc<AppState>>,
                      payload: Result<Json<Map<String, Value>>, JsonRejection>| {
                    invoke_snippet(state, snippet, payload)
                },
            ),
        );
    }
    for name in registry.source_names() {
        let snippet = name.to_string();
        router = router.route(
            &registry.code_endpoint(name),
            get(move |State(state): State<Arc<AppState>>| snippet_code(state, snippet)),
        );
    }

    let router = router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http());
    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.with_state(state)
}

#[derive(Debug, Serialize)]
struct CatalogueBody {
    snippets: Vec<Descriptor>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

async fn health() -> Response {
    json_response(json!({ "status": "healthy" }))
}

async fn list_snippets(State(state): State<Arc<AppState>>) -> Response {
    match tokio::task::spawn_blocking(move || state.registry.catalogue()).await {
        Ok(snippets) => Json(CatalogueBody { snippets }).into_response(),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("failed to build catalogue")
                .with_source(err),
        ),
    }
}

async fn invoke_snippet(
    state: Arc<AppState>,
    name: String,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Response {
    let params = match payload {
        Ok(Json(params)) => Value::Object(params),
        Err(rejection) => return detail_response(rejection.status(), rejection.body_text()),
    };
    match state.registry.invoker().invoke(&name, params).await {
        Ok(value) => json_response(value),
        Err(err) => error_response(err),
    }
}

async fn snippet_code(state: Arc<AppState>, name: String) -> Response {
    match state.registry.source(&name) {
        Ok(code) => json_response(json!({ "code": code })),
        Err(err) => error_response(err),
    }
}

fn json_response(payload: Value) -> Response {
    Json(payload).into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Usage | ErrorKind::Validation | ErrorKind::Invocation | ErrorKind::Cycle => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal | ErrorKind::Io | ErrorKind::Discovery => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: Error) -> Response {
    let status = status_for(err.kind());
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    detail_response(status, err.detail())
}

fn detail_response(status: StatusCode, detail: String) -> Response {
    (status, Json(ErrorBody { detail })).into_response()
}

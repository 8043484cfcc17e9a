//! HTTP server for the dashboard APIs and web assets.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::stream;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tower_http::services::{ServeDir, ServeFile};

use mapek_protocol::{keys, NODE_LOG_TAIL};
use mapek_state::TrustBuffer;

use crate::config::DashboardConfig;
use crate::control::{self, ControlError, ControlRequest};
use crate::logs::read_log_tail;
use crate::monitor::DashboardState;
use crate::redis_store::RedisStore;

const EVENT_STREAM_PERIOD: Duration = Duration::from_secs(1);
const DEFAULT_KEY_PATTERN: &str = "devices:*";

#[derive(Clone)]
struct WebState {
    state: Arc<RwLock<DashboardState>>,
    trust: Arc<TrustBuffer>,
    listener_alive: Arc<AtomicBool>,
    store: RedisStore,
    log_file: PathBuf,
    log_tail_lines: usize,
    shutdown: watch::Receiver<bool>,
}

pub struct FileServer {
    bind_addr: String,
    web_root: PathBuf,
    web_state: WebState,
}

impl FileServer {
    pub fn new(
        config: &DashboardConfig,
        state: Arc<RwLock<DashboardState>>,
        trust: Arc<TrustBuffer>,
        listener_alive: Arc<AtomicBool>,
        store: RedisStore,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr: config.server.bind.clone(),
            web_root: detect_web_root(config.server.webapp_dir.as_deref()),
            web_state: WebState {
                state,
                trust,
                listener_alive,
                store,
                log_file: config.logs.file.clone(),
                log_tail_lines: config.logs.tail_lines,
                shutdown,
            },
        }
    }

    pub fn router(&self) -> Router {
        let index_file = self.web_root.join("index.html");
        let static_service =
            ServeDir::new(self.web_root.clone()).not_found_service(ServeFile::new(index_file));

        Router::new()
            .route("/api/health", get(api_health))
            .route("/api/timeline", get(api_timeline))
            .route("/api/trust", get(api_trust))
            .route("/api/devices", get(api_devices))
            .route("/api/logs", get(api_logs))
            .route("/api/logs/:node", get(api_node_logs))
            .route("/api/keys", get(api_keys))
            .route("/api/control", post(api_control))
            .route("/api/events", get(api_events))
            .fallback_service(static_service)
            .with_state(self.web_state.clone())
    }

    /// Bind the configured address and serve until shutdown is signalled.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener. Open event streams end on shutdown,
    /// so the graceful drain completes.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let app = self.router();
        let mut shutdown = self.web_state.shutdown.clone();
        tracing::info!(
            addr = %listener.local_addr()?,
            web_root = %self.web_root.display(),
            "HTTP web dashboard listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await?;
        Ok(())
    }
}

fn detect_web_root(configured: Option<&Path>) -> PathBuf {
    if let Some(p) = configured {
        if p.join("index.html").exists() {
            return p.to_path_buf();
        }
        tracing::warn!(path = %p.display(), "Configured webapp dir has no index.html");
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidates = [
        cwd.join("webapp"),
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../webapp"),
    ];
    for c in candidates {
        if c.join("index.html").exists() {
            return c;
        }
    }
    cwd
}

async fn api_health(State(web): State<WebState>) -> Json<serde_json::Value> {
    let started_at = web.state.read().await.started_at;
    Json(serde_json::json!({
        "ok": true,
        "service": "mapek-dashboard",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": started_at,
    }))
}

async fn api_timeline(State(web): State<WebState>) -> Json<serde_json::Value> {
    let s = web.state.read().await;
    Json(serde_json::json!({
        "frame": s.timeline,
        "error": s.timeline_error,
    }))
}

fn trust_payload(web: &WebState) -> serde_json::Value {
    let snapshot = web.trust.snapshot();
    serde_json::json!({
        "snapshot": snapshot,
        "listener_alive": web.listener_alive.load(Ordering::Relaxed),
    })
}

async fn api_trust(State(web): State<WebState>) -> Json<serde_json::Value> {
    Json(trust_payload(&web))
}

async fn api_devices(State(web): State<WebState>) -> Json<serde_json::Value> {
    let s = web.state.read().await;
    Json(serde_json::json!({
        "devices": s.devices,
        "error": s.devices_error,
    }))
}

async fn api_logs(State(web): State<WebState>) -> Response {
    match read_log_tail(&web.log_file, web.log_tail_lines).await {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(path = %web.log_file.display(), error = %e, "Failed to read log file");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to read log file: {e}")).into_response()
        }
    }
}

async fn api_node_logs(
    State(web): State<WebState>,
    AxumPath(node): AxumPath<String>,
) -> impl IntoResponse {
    match web.store.list_tail(&keys::node_logs(&node), NODE_LOG_TAIL).await {
        Ok(lines) => (
            StatusCode::OK,
            Json(serde_json::json!({"node": node, "lines": lines})),
        ),
        Err(e) => {
            tracing::error!(node = %node, error = %e, "Failed to read node logs");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"node": node, "lines": [], "error": e.to_string()})),
            )
        }
    }
}

#[derive(Deserialize, Default)]
struct KeysQuery {
    pattern: Option<String>,
}

async fn api_keys(
    State(web): State<WebState>,
    Query(params): Query<KeysQuery>,
) -> impl IntoResponse {
    let pattern = params
        .pattern
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_KEY_PATTERN.to_string());
    match web.store.scan_keys(&pattern).await {
        Ok(keys) => (
            StatusCode::OK,
            Json(serde_json::json!({"pattern": pattern, "keys": keys})),
        ),
        Err(e) => {
            tracing::error!(pattern = %pattern, error = %e, "Key scan failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"pattern": pattern, "keys": [], "error": e.to_string()})),
            )
        }
    }
}

async fn api_control(
    State(web): State<WebState>,
    body: Result<Json<ControlRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Malformed control request");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"ok": false, "error": rejection.body_text()})),
            );
        }
    };
    match control::dispatch(&web.store, &req).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "outcome": outcome})),
        ),
        Err(e) => {
            let status = match e {
                ControlError::MissingField(_) | ControlError::Protocol(_) => StatusCode::BAD_REQUEST,
                ControlError::Store(_) => StatusCode::BAD_GATEWAY,
            };
            tracing::warn!(device = %req.device, app = %req.app, error = %e, "Control command rejected");
            (status, Json(serde_json::json!({"ok": false, "error": e.to_string()})))
        }
    }
}

/// Server-Sent Events stream of combined snapshots for the browser's EventSource.
///
/// The stream ends when shutdown is signalled.
async fn api_events(State(web): State<WebState>) -> Response {
    let shutdown = web.shutdown.clone();
    let sse_stream = stream::unfold(
        (web, shutdown, false),
        |(web, mut shutdown, skip_first_sleep)| async move {
            if *shutdown.borrow() {
                return None;
            }
            if skip_first_sleep {
                tokio::select! {
                    _ = tokio::time::sleep(EVENT_STREAM_PERIOD) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return None;
                        }
                    }
                }
            }
            let payload = {
                let s = web.state.read().await;
                serde_json::json!({
                    "type": "snapshot",
                    "time": chrono::Utc::now(),
                    "timeline": s.timeline,
                    "timeline_error": s.timeline_error,
                    "devices": s.devices,
                    "trust": trust_payload(&web),
                })
            };
            let text = format!("data: {}\n\n", payload);
            Some((
                Ok::<Bytes, std::convert::Infallible>(Bytes::from(text)),
                (web, shutdown, true),
            ))
        },
    );

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(sse_stream))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build event stream response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

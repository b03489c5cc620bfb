use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use streamcast_core::config::BridgeConfig;
use streamcast_core::errors::BridgeError;
use streamcast_core::ids::SessionId;

use crate::bridge::TenantBridge;

/// Shared state for one tenant's listener.
#[derive(Clone)]
pub struct ListenerState {
    bridge: Arc<TenantBridge>,
    ping_interval: Duration,
    ping_timeout: Duration,
    metrics: Option<PrometheusHandle>,
}

/// Handle returned by `start_listener`. Keeps the accept loop alive.
#[derive(Debug)]
pub struct ListenerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

/// Build the per-tenant router: the WebSocket endpoint plus health and
/// metrics endpoints.
pub fn build_router(state: ListenerState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind and serve one tenant's WebSocket listener on the descriptor's
/// port. A bind failure is fatal to startup.
pub async fn start_listener(
    bridge: Arc<TenantBridge>,
    config: &BridgeConfig,
    metrics: Option<PrometheusHandle>,
) -> Result<ListenerHandle, BridgeError> {
    let port = bridge.descriptor().port;
    let state = ListenerState {
        bridge: Arc::clone(&bridge),
        ping_interval: config.ping_interval,
        ping_timeout: config.ping_timeout,
        metrics,
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| BridgeError::ListenerBind { port, reason: e.to_string() })?;
    let local_port = listener
        .local_addr()
        .map_err(|e| BridgeError::ListenerBind { port, reason: e.to_string() })?
        .port();

    tracing::info!(tenant = %bridge.tenant(), port = local_port, "WebSocket listener started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ListenerHandle { port: local_port, _server: server })
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ListenerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one connection from accept to disconnect. Registration happens
/// here, removal happens here — graceful close and error paths both end
/// in `on_disconnect`.
async fn handle_socket(socket: WebSocket, state: ListenerState) {
    let (session, rx) = state.bridge.on_connect();
    let session_id = session.id.clone();

    handle_ws_connection(socket, &session_id, rx, state.ping_interval, state.ping_timeout).await;

    state.bridge.on_disconnect(&session_id);
}

/// Split the socket into reader/writer tasks and run both until either
/// side ends. The writer forwards the session's outbound queue and pings
/// on a fixed cadence; the reader tracks pongs for liveness.
async fn handle_ws_connection(
    socket: WebSocket,
    session_id: &SessionId,
    mut rx: mpsc::Receiver<String>,
    ping_interval: Duration,
    ping_timeout: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let last_pong = Arc::new(AtomicU64::new(now_millis()));

    let writer_sid = session_id.clone();
    let writer_pong = Arc::clone(&last_pong);
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        ping.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    let silent = now_millis().saturating_sub(writer_pong.load(Ordering::Relaxed));
                    if silent > ping_timeout.as_millis() as u64 {
                        tracing::info!(session_id = %writer_sid, silent_ms = silent, "Client missed pongs, closing");
                        break;
                    }
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let reader_sid = session_id.clone();
    let reader_pong = Arc::clone(&last_pong);
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Pong(_) => {
                    reader_pong.store(now_millis(), Ordering::Relaxed);
                }
                WsMessage::Close(_) => break,
                WsMessage::Text(_) | WsMessage::Binary(_) => {
                    // Clients don't speak upstream; ignore.
                    tracing::trace!(session_id = %reader_sid, "Ignoring inbound frame");
                }
                WsMessage::Ping(_) => {} // axum replies automatically
            }
        }
    });

    // Whichever half finishes first takes the other down with it.
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
}

/// Health check HTTP endpoint: tenant, session count, poller state.
async fn health_handler(State(state): State<ListenerState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "tenant": state.bridge.tenant().as_str(),
        "sessions": state.bridge.session_count(),
        "polling": state.bridge.poller_running(),
    }))
}

/// Prometheus text endpoint. 404 when no recorder was installed.
async fn metrics_handler(State(state): State<ListenerState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, crate::metrics::render(handle)),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

//! HTTP-Router des Signaling-Service
//!
//! - `GET /ws`    – WebSocket-Upgrade, pro Verbindung ein `ClientConnection`-Task
//! - `GET /stats` – Zaehler als JSON

use axum::{
    extract::{ConnectInfo, FromRef, State, WebSocketUpgrade},
    http::{header, HeaderMap},
    response::Response,
    routing::get,
    Router,
};
use pairline_core::types::ClientMetadata;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::manager::SessionManager;
use crate::server_state::SignalingState;
use crate::stats::stats_handler;

/// Router-Zustand: gemeinsamer State plus Shutdown-Signal fuer neue Tasks
#[derive(Clone)]
pub struct RouterZustand {
    pub signaling: Arc<SignalingState>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl FromRef<RouterZustand> for Arc<SessionManager> {
    fn from_ref(zustand: &RouterZustand) -> Self {
        Arc::clone(&zustand.signaling.manager)
    }
}

/// Erstellt den Router fuer `/ws` und `/stats`
pub fn signaling_router(state: Arc<SignalingState>, shutdown_rx: watch::Receiver<bool>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/stats", get(stats_handler))
        .with_state(RouterZustand {
            signaling: state,
            shutdown_rx,
        })
}

/// GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(zustand): State<RouterZustand>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let remote_addr = connect_info.map(|ConnectInfo(addr)| addr);
    let metadata = ClientMetadata::neu(user_agent, remote_addr);

    let max_bytes = zustand.signaling.config.max_nachricht_bytes;
    let verbindung = ClientConnection::neu(Arc::clone(&zustand.signaling), metadata);
    tracing::debug!(
        connection_id = %verbindung.id(),
        peer = ?remote_addr,
        "WebSocket-Upgrade"
    );

    ws.max_message_size(max_bytes)
        .on_upgrade(move |socket| verbindung.verarbeiten(socket, zustand.shutdown_rx))
}

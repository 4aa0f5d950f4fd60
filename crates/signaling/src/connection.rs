//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede WebSocket-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Eingehende Frames werden gelesen und an den `SessionManager`
//! weitergereicht, ausgehende Events kommen ueber die Send-Queue des
//! `ClientSender`.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Ohne eingehenden Frame innerhalb von `verbindungs_timeout_sek` wird
//!   die Verbindung mit Grund `timeout` getrennt

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pairline_core::types::{ClientMetadata, ConnectionId};
use pairline_protocol::{ClientEvent, ErrorCode, ServerEvent};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};

use crate::sender::ClientSender;
use crate::server_state::SignalingState;

/// Socket vom Client geschlossen
pub const GRUND_GESCHLOSSEN: &str = "closed";
/// Keepalive-Timeout
pub const GRUND_TIMEOUT: &str = "timeout";
/// Client hat `leave` gesendet
pub const GRUND_VERLASSEN: &str = "client-leave";
/// Server faehrt herunter
pub const GRUND_SHUTDOWN: &str = "shutdown";

type WsSender = SplitSink<WebSocket, Message>;

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    id: ConnectionId,
    metadata: ClientMetadata,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection mit frischer ID
    pub fn neu(state: Arc<SignalingState>, metadata: ClientMetadata) -> Self {
        Self {
            state,
            id: ConnectionId::new(),
            metadata,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, der Keepalive ablaeuft oder ein
    /// Shutdown-Signal eingeht. Beim Verlassen wird die Verbindung immer
    /// beim `SessionManager` abgemeldet.
    pub async fn verarbeiten(self, socket: WebSocket, mut shutdown_rx: watch::Receiver<bool>) {
        let id = self.id;
        let manager = Arc::clone(&self.state.manager);
        let keepalive_intervall = self.state.config.keepalive_intervall();
        let timeout_dauer = self.state.config.verbindungs_timeout();

        let (mut ws_tx, mut ws_rx) = socket.split();
        let (sender, mut sende_rx) = ClientSender::kanal(id);

        if let Err(e) = manager.verbinden(id, self.metadata, sender) {
            tracing::debug!(connection_id = %id, fehler = %e, "Verbindung nicht angenommen");
            let _ = senden(&mut ws_tx, &e.als_event()).await;
            let _ = ws_tx.close().await;
            return;
        }

        let mut letzter_empfang = Instant::now();
        let mut keepalive = interval_at(Instant::now() + keepalive_intervall, keepalive_intervall);

        let grund = loop {
            tokio::select! {
                // Eingehender Frame vom Client
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            letzter_empfang = Instant::now();
                            match ClientEvent::from_json(&text) {
                                Ok(ClientEvent::Leave) => break GRUND_VERLASSEN,
                                Ok(event) => {
                                    tracing::trace!(connection_id = %id, event = event.name(), "Frame empfangen");
                                    let ergebnis = match event {
                                        ClientEvent::FindNext => manager.naechster(id),
                                        ClientEvent::Signal(payload) => manager.signal(id, payload),
                                        ClientEvent::Leave => Ok(()),
                                    };
                                    if let Err(e) = ergebnis {
                                        if senden(&mut ws_tx, &e.als_event()).await.is_err() {
                                            break GRUND_TRANSPORT_FEHLER;
                                        }
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!(connection_id = %id, fehler = %e, "Ungueltiger Frame");
                                    let antwort = ServerEvent::fehler(ErrorCode::InvalidRequest, e.to_string());
                                    if senden(&mut ws_tx, &antwort).await.is_err() {
                                        break GRUND_TRANSPORT_FEHLER;
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            letzter_empfang = Instant::now();
                            let antwort = ServerEvent::fehler(
                                ErrorCode::InvalidRequest,
                                "Binaer-Frames werden nicht unterstuetzt",
                            );
                            if senden(&mut ws_tx, &antwort).await.is_err() {
                                break GRUND_TRANSPORT_FEHLER;
                            }
                        }
                        // Pings beantwortet axum selbst
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                            letzter_empfang = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) | None => break GRUND_GESCHLOSSEN,
                        Some(Err(e)) => {
                            tracing::warn!(connection_id = %id, fehler = %e, "WebSocket-Lesefehler");
                            break GRUND_TRANSPORT_FEHLER;
                        }
                    }
                }

                // Ausgehendes Event aus dem SessionManager
                ausgehend = sende_rx.recv() => {
                    let Some(event) = ausgehend else {
                        // Manager hat die Verbindung bereits abgemeldet
                        break GRUND_TRANSPORT_FEHLER;
                    };
                    if let Err(e) = senden(&mut ws_tx, &event).await {
                        tracing::warn!(connection_id = %id, fehler = %e, "Senden fehlgeschlagen");
                        break GRUND_TRANSPORT_FEHLER;
                    }
                }

                // Keepalive-Ping
                _ = keepalive.tick() => {
                    if letzter_empfang.elapsed() > timeout_dauer {
                        tracing::warn!(connection_id = %id, "Verbindungs-Timeout");
                        break GRUND_TIMEOUT;
                    }
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break GRUND_TRANSPORT_FEHLER;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!(connection_id = %id, "Shutdown-Signal – Verbindung wird getrennt");
                        break GRUND_SHUTDOWN;
                    }
                }
            }
        };

        manager.trennen(id, grund);

        let close = CloseFrame {
            code: axum::extract::ws::close_code::NORMAL,
            reason: Cow::Borrowed(grund),
        };
        let _ = ws_tx.send(Message::Close(Some(close))).await;

        tracing::debug!(connection_id = %id, grund, "Verbindungs-Task beendet");
    }
}

const GRUND_TRANSPORT_FEHLER: &str = crate::manager::GRUND_TRANSPORT;

/// Serialisiert ein Event und schreibt es als Textframe
async fn senden(ws_tx: &mut WsSender, event: &ServerEvent) -> Result<(), axum::Error> {
    let json = match event.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(event = event.name(), fehler = %e, "Event nicht serialisierbar");
            return Ok(());
        }
    };
    ws_tx.send(Message::Text(json)).await
}

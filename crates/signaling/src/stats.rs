//! Stats-Endpunkt (`GET /stats`)

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::manager::SessionManager;

/// Konsistenter Schnappschuss der Zaehler des SessionManagers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Registrierte Verbindungen
    pub active_connections: usize,
    /// Eintraege in der Warteschlange
    pub waiting_queue: usize,
    /// Aktive Paarungen (nicht Verbindungen)
    pub active_pairs: usize,
}

/// GET /stats
pub async fn stats_handler(State(manager): State<Arc<SessionManager>>) -> Json<SessionStats> {
    Json(manager.statistik())
}

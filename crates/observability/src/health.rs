//! Health-Check-Endpunkt fuer Pairline
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Auslastung
//!
//! Ein voller Server meldet `degraded`: bestehende Sitzungen laufen weiter,
//! neue Verbindungen werden aber mit `SERVER_FULL` abgewiesen.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Aktuelle Verbindungsauslastung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Auslastung {
    pub verbindungen: usize,
    pub max_verbindungen: usize,
}

impl Auslastung {
    pub fn ist_voll(&self) -> bool {
        self.verbindungen >= self.max_verbindungen
    }
}

/// Liefert die Auslastung fuer den Health-Check
pub trait AuslastungsQuelle: Send + Sync {
    fn auslastung(&self) -> Auslastung;
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_connections: usize,
    pub max_connections: usize,
}

#[derive(Clone)]
struct HealthState {
    start_time: Instant,
    quelle: Arc<dyn AuslastungsQuelle>,
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(quelle: Arc<dyn AuslastungsQuelle>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(HealthState {
            start_time: Instant::now(),
            quelle,
        })
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let auslastung = state.quelle.auslastung();
    let status = if auslastung.ist_voll() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        active_connections: auslastung.verbindungen,
        max_connections: auslastung.max_verbindungen,
    };

    // Auch degraded antwortet mit 200
    (StatusCode::OK, Json(response))
}

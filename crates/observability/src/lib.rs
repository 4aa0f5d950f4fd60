//! # pairline-observability
//!
//! Observability-Crate fuer Pairline:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, Auslastung, AuslastungsQuelle, HealthResponse, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, PairlineMetrics};
pub use middleware::{request_timing_layer, timing_middleware};

use axum::Router;
use std::sync::Arc;

/// Router fuer alle Observability-Endpunkte
///
/// Endpunkte:
/// - `GET /metrics` – Prometheus scrape format
/// - `GET /health`  – Health-Check JSON
pub fn observability_router(
    metriken: PairlineMetrics,
    quelle: Arc<dyn AuslastungsQuelle>,
) -> Router {
    Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(quelle))
}

//! Prometheus-kompatible Metriken fuer Pairline
//!
//! Registrierte Metriken:
//! - `pairline_connections_active` – Gauge: Registrierte Verbindungen
//! - `pairline_queue_waiting` – Gauge: Eintraege in der Warteschlange
//! - `pairline_pairs_active` – Gauge: Aktive Paarungen
//! - `pairline_matches_total` – Counter: Erzeugte Paarungen
//! - `pairline_skips_total` – Counter: Per find-next verlassene Paarungen
//! - `pairline_signals_relayed_total` – Counter: Weitergeleitete Signaling-Nachrichten
//! - `pairline_queue_evictions_total` – Counter: Durch den Sweep entfernte Wartende
//! - `pairline_invariant_violations_total` – Counter: Erkannte Invariantenverletzungen
//! - `pairline_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `pairline_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Pairline-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Zaehler.
#[derive(Clone)]
pub struct PairlineMetrics {
    pub registry: Arc<Registry>,

    // Sitzungs-Metriken
    pub connections_active: IntGauge,
    pub queue_waiting: IntGauge,
    pub pairs_active: IntGauge,
    pub matches_total: IntCounter,
    pub skips_total: IntCounter,
    pub signals_relayed_total: IntCounter,
    pub queue_evictions_total: IntCounter,
    pub invariant_violations_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl PairlineMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connections_active = IntGauge::with_opts(Opts::new(
            "pairline_connections_active",
            "Anzahl registrierter Verbindungen",
        ))?;
        registry.register(Box::new(connections_active.clone()))?;

        let queue_waiting = IntGauge::with_opts(Opts::new(
            "pairline_queue_waiting",
            "Anzahl wartender Verbindungen",
        ))?;
        registry.register(Box::new(queue_waiting.clone()))?;

        let pairs_active = IntGauge::with_opts(Opts::new(
            "pairline_pairs_active",
            "Anzahl aktiver Paarungen",
        ))?;
        registry.register(Box::new(pairs_active.clone()))?;

        let matches_total = IntCounter::with_opts(Opts::new(
            "pairline_matches_total",
            "Gesamtanzahl erzeugter Paarungen",
        ))?;
        registry.register(Box::new(matches_total.clone()))?;

        let skips_total = IntCounter::with_opts(Opts::new(
            "pairline_skips_total",
            "Per find-next verlassene Paarungen",
        ))?;
        registry.register(Box::new(skips_total.clone()))?;

        let signals_relayed_total = IntCounter::with_opts(Opts::new(
            "pairline_signals_relayed_total",
            "Gesamtanzahl weitergeleiteter Signaling-Nachrichten",
        ))?;
        registry.register(Box::new(signals_relayed_total.clone()))?;

        let queue_evictions_total = IntCounter::with_opts(Opts::new(
            "pairline_queue_evictions_total",
            "Gesamtanzahl abgelaufener Warteschlangen-Eintraege",
        ))?;
        registry.register(Box::new(queue_evictions_total.clone()))?;

        let invariant_violations_total = IntCounter::with_opts(Opts::new(
            "pairline_invariant_violations_total",
            "Gesamtanzahl erkannter Invariantenverletzungen",
        ))?;
        registry.register(Box::new(invariant_violations_total.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("pairline_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pairline_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connections_active,
            queue_waiting,
            pairs_active,
            matches_total,
            skips_total,
            signals_relayed_total,
            queue_evictions_total,
            invariant_violations_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Setzt die drei Zustands-Gauges auf einen Schnappschuss
    pub fn gauges_setzen(&self, verbindungen: usize, wartend: usize, paare: usize) {
        self.connections_active.set(verbindungen as i64);
        self.queue_waiting.set(wartend as i64);
        self.pairs_active.set(paare as i64);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: PairlineMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<PairlineMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

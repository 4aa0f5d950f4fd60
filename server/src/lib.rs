//! pairline-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::Router;
use config::ServerConfig;
use pairline_observability::{
    observability_router, request_timing_layer, timing_middleware, AuslastungsQuelle,
    PairlineMetrics,
};
use pairline_signaling::{signaling_router, sweeper_starten, SessionManager, SignalingState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und SessionManager anlegen
    /// 2. Warteschlangen-Sweeper starten
    /// 3. HTTP/WebSocket-Listener starten
    /// 4. Auf Ctrl-C warten, dann alle Tasks ueber den Watch-Kanal beenden
    pub async fn starten(self) -> Result<()> {
        let signaling_config = self.config.signaling_config();
        let metriken = PairlineMetrics::neu().context("Metriken konnten nicht erstellt werden")?;

        let manager = Arc::new(SessionManager::neu(&signaling_config).mit_metriken(metriken.clone()));
        let sweep_intervall = signaling_config.sweep_intervall();
        let max_wartezeit = signaling_config.max_wartezeit();
        let state = SignalingState::neu(signaling_config, Arc::clone(&manager));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweeper = sweeper_starten(
            Arc::clone(&manager),
            sweep_intervall,
            max_wartezeit,
            shutdown_rx.clone(),
        );

        let app = app_bauen(&self.config, state, metriken, shutdown_rx.clone());

        let adresse = self.config.bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse)
            .await
            .with_context(|| format!("Bind auf '{adresse}' fehlgeschlagen"))?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            max_connections = self.config.server.max_connections,
            observability = self.config.observability.aktiviert,
            "Server gestartet"
        );

        let mut shutdown_warten = shutdown_rx.clone();
        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_warten.wait_for(|aktiv| *aktiv).await;
        });

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht installiert werden");
                return;
            }
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            let _ = shutdown_tx.send(true);
        });

        server.await.context("HTTP-Server beendet mit Fehler")?;
        let _ = sweeper.await;

        let stats = manager.statistik();
        tracing::info!(
            verbleibende_verbindungen = stats.active_connections,
            "Server gestoppt"
        );
        Ok(())
    }
}

/// Baut den vollstaendigen Router (Signaling, Observability, Middleware)
pub fn app_bauen(
    config: &ServerConfig,
    state: Arc<SignalingState>,
    metriken: PairlineMetrics,
    shutdown_rx: watch::Receiver<bool>,
) -> Router {
    let quelle: Arc<dyn AuslastungsQuelle> = state.manager.clone();
    let mut app = signaling_router(state, shutdown_rx);
    if config.observability.aktiviert {
        app = app.merge(observability_router(metriken.clone(), quelle));
    }

    app.layer(axum::middleware::from_fn_with_state(metriken, timing_middleware))
        .layer(request_timing_layer())
        .layer(cors_layer(&config.netzwerk.cors_origins))
}

/// CORS fuer die HTTP-Endpunkte; leer = alle Origins erlaubt
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Konfiguration und den `SessionManager` als Arc-Referenzen, die
//! sicher zwischen tokio-Tasks und Axum-Handlern geteilt werden koennen.

use std::sync::Arc;
use std::time::Duration;

use crate::manager::SessionManager;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen
    pub max_verbindungen: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Maximale Groesse eines eingehenden WebSocket-Frames
    pub max_nachricht_bytes: usize,
    /// Maximale Wartezeit in der Warteschlange in Sekunden
    pub max_wartezeit_sek: u64,
    /// Intervall des Warteschlangen-Sweeps in Sekunden
    pub sweep_intervall_sek: u64,
    /// Abgelaufene Wartende mit `queue-expired` benachrichtigen
    pub abgelaufene_benachrichtigen: bool,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_verbindungen: 1024,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            max_nachricht_bytes: 64 * 1024,
            max_wartezeit_sek: 300,
            sweep_intervall_sek: 60,
            abgelaufene_benachrichtigen: false,
        }
    }
}

impl SignalingConfig {
    pub fn keepalive_intervall(&self) -> Duration {
        Duration::from_secs(self.keepalive_sek)
    }

    pub fn verbindungs_timeout(&self) -> Duration {
        Duration::from_secs(self.verbindungs_timeout_sek)
    }

    pub fn max_wartezeit(&self) -> Duration {
        Duration::from_secs(self.max_wartezeit_sek)
    }

    pub fn sweep_intervall(&self) -> Duration {
        Duration::from_secs(self.sweep_intervall_sek)
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Lifecycle-Controller fuer alle Verbindungen
    pub manager: Arc<SessionManager>,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, manager: Arc<SessionManager>) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            manager,
        })
    }
}

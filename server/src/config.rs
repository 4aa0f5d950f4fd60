//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use pairline_observability::logging::{log_format_gueltig, log_level_gueltig};
use pairline_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// WebSocket-Verbindungen (Keepalive, Frame-Groesse)
    pub verbindung: VerbindungsEinstellungen,
    /// Warteschlange und Sweep
    pub warteschlange: WarteschlangenEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur Logging)
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_connections: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Pairline".into(),
            max_connections: 1024,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP/WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP/WebSocket
    pub port: u16,
    /// CORS-Origins fuer HTTP-Endpunkte (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec![],
        }
    }
}

/// WebSocket-Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// Ping-Intervall in Sekunden
    pub keepalive_secs: u64,
    /// Trennen nach so vielen Sekunden ohne eingehenden Frame
    pub idle_timeout_secs: u64,
    /// Maximale Groesse eines eingehenden Frames
    pub max_message_bytes: usize,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            keepalive_secs: 30,
            idle_timeout_secs: 90,
            max_message_bytes: 64 * 1024,
        }
    }
}

/// Warteschlangen-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarteschlangenEinstellungen {
    /// Maximale Wartezeit bis zum Entfernen durch den Sweep
    pub max_wait_secs: u64,
    /// Intervall des Sweeps
    pub sweep_interval_secs: u64,
    /// Entfernte Wartende mit `queue-expired` benachrichtigen
    pub notify_evicted: bool,
}

impl Default for WarteschlangenEinstellungen {
    fn default() -> Self {
        Self {
            max_wait_secs: 300,
            sweep_interval_secs: 60,
            notify_evicted: false,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// `/metrics` und `/health` bereitstellen
    pub aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self { aktiviert: true }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config: Self = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.server.max_connections == 0 {
            anyhow::bail!("server.max_connections muss groesser als 0 sein");
        }
        if self.verbindung.keepalive_secs == 0 {
            anyhow::bail!("verbindung.keepalive_secs muss groesser als 0 sein");
        }
        if self.verbindung.idle_timeout_secs < self.verbindung.keepalive_secs {
            anyhow::bail!("verbindung.idle_timeout_secs darf nicht kleiner als keepalive_secs sein");
        }
        if self.warteschlange.sweep_interval_secs == 0 {
            anyhow::bail!("warteschlange.sweep_interval_secs muss groesser als 0 sein");
        }
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Unbekanntes Log-Level: '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Unbekanntes Log-Format: '{}'", self.logging.format);
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Konfiguration fuer den Signaling-Crate
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_verbindungen: self.server.max_connections,
            keepalive_sek: self.verbindung.keepalive_secs,
            verbindungs_timeout_sek: self.verbindung.idle_timeout_secs,
            max_nachricht_bytes: self.verbindung.max_message_bytes,
            max_wartezeit_sek: self.warteschlange.max_wait_secs,
            sweep_intervall_sek: self.warteschlange.sweep_interval_secs,
            abgelaufene_benachrichtigen: self.warteschlange.notify_evicted,
        }
    }
}

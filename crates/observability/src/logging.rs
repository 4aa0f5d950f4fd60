//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `PL_LOG_LEVEL`: Log-Level oder EnvFilter-Direktive (`pairline_signaling=debug`)
//! - `PL_LOG_FORMAT`: Format (text/json)
//!
//! Beide haben Vorrang vor den Werten aus der Konfigurationsdatei.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

const ENV_LEVEL: &str = "PL_LOG_LEVEL";
const ENV_FORMAT: &str = "PL_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Schlaegt fehl wenn bereits ein globaler Subscriber gesetzt ist.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_env(ENV_LEVEL) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| anyhow!("Ungueltige Log-Direktive '{level}': {e}"))?,
    };

    let format = std::env::var(ENV_FORMAT).unwrap_or_else(|_| format.to_string());

    let ergebnis = match format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    ergebnis.map_err(|e| anyhow!("Logging konnte nicht initialisiert werden: {e}"))
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

//! Identifikations- und Metadaten-Typen fuer Pairline
//!
//! Verbindungen werden ausschliesslich ueber ihre `ConnectionId`
//! referenziert. Die ID wird von der Transportschicht vergeben und ist fuer
//! den Kern opak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

/// Eindeutige Verbindungs-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Opake Client-Metadaten (nur fuer Logging)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// User-Agent-Header des Browsers
    pub user_agent: Option<String>,
    /// Entfernte Socket-Adresse
    pub remote_addr: Option<SocketAddr>,
    /// Zeitpunkt des Verbindungsaufbaus
    pub verbunden_seit: DateTime<Utc>,
}

impl ClientMetadata {
    /// Erstellt Metadaten mit aktuellem Zeitstempel
    pub fn neu(user_agent: Option<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            user_agent,
            remote_addr,
            verbunden_seit: Utc::now(),
        }
    }

    /// Metadaten ohne Angaben (Tests, interne Verbindungen)
    pub fn anonym() -> Self {
        Self::neu(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert!(id.to_string().starts_with("conn:"));
    }

    #[test]
    fn connection_id_serialisiert_als_uuid_string() {
        let id = ConnectionId(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
        let zurueck: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, id);
    }

    #[test]
    fn metadaten_anonym() {
        let meta = ClientMetadata::anonym();
        assert!(meta.user_agent.is_none());
        assert!(meta.remote_addr.is_none());
    }
}

//! Fehlertypen fuer den Signaling-Service
//!
//! Drei Kategorien:
//! - Invariantenverletzungen (`DoppelteVerbindung`, `BereitsWartend`,
//!   `BereitsGepaart`) deuten auf einen Fehler im `SessionManager` hin
//! - Erwartete Laufzeitfehler (`KeinAktiverPartner`, `UnbekannteVerbindung`)
//!   gehen als `error`-Event an den ausloesenden Client
//! - Transportfehler werden wie ein Disconnect behandelt und erscheinen hier
//!   nicht

use pairline_core::types::ConnectionId;
use pairline_protocol::{ErrorCode, ServerEvent};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// Transport hat eine noch registrierte ID erneut vergeben
    #[error("Verbindung bereits registriert: {0}")]
    DoppelteVerbindung(ConnectionId),

    /// Verbindung hat bereits einen Warteschlangen-Eintrag
    #[error("Verbindung bereits in der Warteschlange: {0}")]
    BereitsWartend(ConnectionId),

    /// Verbindung ist bereits Teil einer Paarung
    #[error("Verbindung bereits gepaart: {0}")]
    BereitsGepaart(ConnectionId),

    /// Signal ohne (erreichbaren) Partner
    #[error("Kein aktiver Partner fuer {0}")]
    KeinAktiverPartner(ConnectionId),

    /// Operation auf einer bereits beendeten Verbindung
    #[error("Unbekannte Verbindung: {0}")]
    UnbekannteVerbindung(ConnectionId),

    /// Verbindungslimit erreicht
    #[error("Server ist voll")]
    ServerVoll,
}

impl SignalingError {
    /// Gibt true zurueck wenn der Fehler eine verletzte Invariante anzeigt
    pub fn ist_invariantenverletzung(&self) -> bool {
        matches!(
            self,
            Self::DoppelteVerbindung(_) | Self::BereitsWartend(_) | Self::BereitsGepaart(_)
        )
    }

    /// Fehler-Code fuer den Client
    pub fn client_code(&self) -> ErrorCode {
        match self {
            Self::DoppelteVerbindung(_) | Self::BereitsWartend(_) | Self::BereitsGepaart(_) => {
                ErrorCode::InternalError
            }
            Self::KeinAktiverPartner(_) => ErrorCode::NoActivePeer,
            Self::UnbekannteVerbindung(_) => ErrorCode::UnknownConnection,
            Self::ServerVoll => ErrorCode::ServerFull,
        }
    }

    /// `error`-Event fuer den Client
    ///
    /// Invariantenverletzungen werden nur generisch gemeldet.
    pub fn als_event(&self) -> ServerEvent {
        let nachricht = if self.ist_invariantenverletzung() {
            "Interner Fehler".to_string()
        } else {
            self.to_string()
        };
        ServerEvent::fehler(self.client_code(), nachricht)
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pairline_protocol::ErrorResponse;

    #[test]
    fn invarianten_kategorie() {
        let id = ConnectionId::new();
        assert!(SignalingError::DoppelteVerbindung(id).ist_invariantenverletzung());
        assert!(SignalingError::BereitsWartend(id).ist_invariantenverletzung());
        assert!(SignalingError::BereitsGepaart(id).ist_invariantenverletzung());
        assert!(!SignalingError::KeinAktiverPartner(id).ist_invariantenverletzung());
        assert!(!SignalingError::UnbekannteVerbindung(id).ist_invariantenverletzung());
    }

    #[test]
    fn invariantenverletzung_wird_generisch_gemeldet() {
        let id = ConnectionId::new();
        let event = SignalingError::BereitsGepaart(id).als_event();
        assert_eq!(
            event,
            ServerEvent::Error(ErrorResponse {
                code: ErrorCode::InternalError,
                message: "Interner Fehler".into(),
            })
        );
    }

    #[test]
    fn laufzeitfehler_behalten_meldung() {
        let id = ConnectionId::new();
        let ServerEvent::Error(e) = SignalingError::KeinAktiverPartner(id).als_event() else {
            panic!("Erwartet error-Event");
        };
        assert_eq!(e.code, ErrorCode::NoActivePeer);
        assert!(e.message.contains("Kein aktiver Partner"));
    }
}

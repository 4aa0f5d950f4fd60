//! Connection-Registry – Alle lebenden Verbindungen
//!
//! Die Registry ist die Wahrheit darueber, ob ein Peer noch erreichbar ist.
//! Sie besitzt die `Connection`-Eintraege exklusiv; alle anderen Komponenten
//! referenzieren Verbindungen nur ueber ihre `ConnectionId`.
//!
//! Nicht selbst synchronisiert: Zugriff nur ueber den `SessionManager`.

use pairline_core::types::{ClientMetadata, ConnectionId};
use std::collections::HashMap;

use crate::error::{SignalingError, SignalingResult};
use crate::sender::ClientSender;

/// Eine registrierte Client-Verbindung
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub metadata: ClientMetadata,
    pub sender: ClientSender,
}

/// Registry aller lebenden Verbindungen
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    verbindungen: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine neue Verbindung
    ///
    /// Schlaegt mit `DoppelteVerbindung` fehl, wenn die ID noch registriert ist.
    pub fn registrieren(
        &mut self,
        id: ConnectionId,
        metadata: ClientMetadata,
        sender: ClientSender,
    ) -> SignalingResult<()> {
        if self.verbindungen.contains_key(&id) {
            return Err(SignalingError::DoppelteVerbindung(id));
        }
        self.verbindungen.insert(
            id,
            Connection {
                id,
                metadata,
                sender,
            },
        );
        Ok(())
    }

    /// Entfernt eine Verbindung; unbekannte IDs sind ein No-op
    pub fn abmelden(&mut self, id: &ConnectionId) -> Option<Connection> {
        self.verbindungen.remove(id)
    }

    /// Registriert und der Sender ist noch offen
    pub fn ist_live(&self, id: &ConnectionId) -> bool {
        self.verbindungen
            .get(id)
            .is_some_and(|c| c.sender.ist_offen())
    }

    /// Registriert (unabhaengig vom Socket-Zustand)
    pub fn ist_registriert(&self, id: &ConnectionId) -> bool {
        self.verbindungen.contains_key(id)
    }

    /// Gibt die Anzahl registrierter Verbindungen zurueck
    pub fn anzahl(&self) -> usize {
        self.verbindungen.len()
    }

    /// Gibt den Sender einer Verbindung zurueck
    pub fn sender(&self, id: &ConnectionId) -> Option<ClientSender> {
        self.verbindungen.get(id).map(|c| c.sender.clone())
    }
}

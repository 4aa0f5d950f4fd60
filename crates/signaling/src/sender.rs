//! Client-Sender – Ausgehende Queue einer einzelnen Verbindung
//!
//! Jede Verbindung besitzt eine begrenzte `mpsc`-Queue. Der `SessionManager`
//! reiht Events nur ein (`try_send`) und wartet nie auf den Socket, damit
//! kein Schreibvorgang den kritischen Abschnitt blockiert. Die
//! `ClientConnection` liest die Queue und schreibt in den WebSocket.

use pairline_core::types::ConnectionId;
use pairline_protocol::ServerEvent;
use tokio::sync::mpsc;

/// Groesse der Send-Queue pro Client
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Grund fuer eine fehlgeschlagene Zustellung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZustellFehler {
    /// Queue voll, Client liest nicht schnell genug
    Voll,
    /// Empfaenger existiert nicht mehr (Socket geschlossen)
    Geschlossen,
}

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    tx: mpsc::Sender<ServerEvent>,
}

impl ClientSender {
    /// Erstellt Sender und zugehoerige Empfangs-Queue
    pub fn kanal(connection_id: ConnectionId) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        (Self { connection_id, tx }, rx)
    }

    /// Sendet ein Event nicht-blockierend an den Client
    pub fn senden(&self, event: ServerEvent) -> Result<(), ZustellFehler> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    event = event.name(),
                    "Send-Queue voll"
                );
                Err(ZustellFehler::Voll)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Send-Queue geschlossen (Client getrennt)"
                );
                Err(ZustellFehler::Geschlossen)
            }
        }
    }

    /// Prueft ob der Empfaenger noch existiert
    pub fn ist_offen(&self) -> bool {
        !self.tx.is_closed()
    }
}

//! Signaling-Relay – Leitet opake Payloads an den Partner weiter
//!
//! Das Relay nutzt ausschliesslich Paarungstabelle und Registry fuer das
//! Routing. Die Payload wird weder validiert noch gepuffert noch
//! umsortiert: ein Aufruf erzeugt hoechstens einen Zustellversuch.
//!
//! Routing (`ziel`) und Zustellung (`zustellen`) laufen beide unter dem Lock
//! des `SessionManager`.

use pairline_core::types::ConnectionId;
use pairline_protocol::{ServerEvent, SignalPayload};

use crate::error::{SignalingError, SignalingResult};
use crate::pairing::PairingTable;
use crate::registry::ConnectionRegistry;
use crate::sender::{ClientSender, ZustellFehler};

/// Routing-Sicht auf Registry und Paarungstabelle
pub struct SignalingRelay<'a> {
    registry: &'a ConnectionRegistry,
    paarungen: &'a PairingTable,
}

impl<'a> SignalingRelay<'a> {
    pub fn neu(registry: &'a ConnectionRegistry, paarungen: &'a PairingTable) -> Self {
        Self {
            registry,
            paarungen,
        }
    }

    /// Ermittelt den Sender des Partners von `von`
    ///
    /// - `UnbekannteVerbindung` wenn `von` nicht registriert ist
    /// - `KeinAktiverPartner` wenn kein Partner existiert oder er nicht live ist
    pub fn ziel(&self, von: &ConnectionId) -> SignalingResult<ClientSender> {
        if !self.registry.ist_registriert(von) {
            return Err(SignalingError::UnbekannteVerbindung(*von));
        }

        let partner = self
            .paarungen
            .partner_von(von)
            .ok_or(SignalingError::KeinAktiverPartner(*von))?;

        if !self.registry.ist_live(&partner) {
            return Err(SignalingError::KeinAktiverPartner(*von));
        }

        self.registry
            .sender(&partner)
            .ok_or(SignalingError::KeinAktiverPartner(*von))
    }
}

/// Stellt eine Payload unveraendert beim Partner zu
pub fn zustellen(ziel: &ClientSender, payload: SignalPayload) -> Result<(), ZustellFehler> {
    ziel.senden(ServerEvent::Signal { payload })
}

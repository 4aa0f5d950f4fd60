//! Paarungstabelle – Symmetrische Zuordnung gepaarter Verbindungen
//!
//! Beide Richtungen werden immer gemeinsam geschrieben und geloescht. Da die
//! Tabelle nur unter dem Lock des `SessionManager` veraendert wird, kann
//! kein anderer Aufrufer einen halb gepaarten Zustand beobachten.

use pairline_core::types::ConnectionId;
use std::collections::HashMap;

use crate::error::{SignalingError, SignalingResult};

/// Symmetrische Paarungstabelle
#[derive(Debug, Default)]
pub struct PairingTable {
    partner: HashMap<ConnectionId, ConnectionId>,
}

impl PairingTable {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Paart zwei Verbindungen
    ///
    /// Schlaegt mit `BereitsGepaart` fehl wenn eine Seite schon einen
    /// Partner hat; die Tabelle bleibt dann unveraendert.
    pub fn paaren(&mut self, a: ConnectionId, b: ConnectionId) -> SignalingResult<()> {
        if self.partner.contains_key(&a) {
            return Err(SignalingError::BereitsGepaart(a));
        }
        if self.partner.contains_key(&b) || a == b {
            return Err(SignalingError::BereitsGepaart(b));
        }
        self.partner.insert(a, b);
        self.partner.insert(b, a);
        Ok(())
    }

    /// Loest die Paarung von `id` auf und gibt den frueheren Partner zurueck
    pub fn entpaaren(&mut self, id: &ConnectionId) -> Option<ConnectionId> {
        let partner = self.partner.remove(id)?;
        if self.partner.remove(&partner) != Some(*id) {
            tracing::error!(
                connection_id = %id,
                partner_id = %partner,
                "Paarungstabelle war asymmetrisch"
            );
        }
        Some(partner)
    }

    pub fn partner_von(&self, id: &ConnectionId) -> Option<ConnectionId> {
        self.partner.get(id).copied()
    }

    /// Anzahl aktiver Paarungen (Eintraege / 2)
    pub fn paar_anzahl(&self) -> usize {
        self.partner.len() / 2
    }

    /// Alle Eintraege (beide Richtungen)
    pub fn eintraege(&self) -> impl Iterator<Item = (&ConnectionId, &ConnectionId)> {
        self.partner.iter()
    }
}

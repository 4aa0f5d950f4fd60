//! Warteschlange – FIFO der Verbindungen ohne Partner
//!
//! Strikte Reihenfolge nach Einreihungszeitpunkt. Pro Verbindung existiert
//! hoechstens ein Eintrag. Abgelaufene Eintraege werden periodisch vom
//! Sweeper entfernt; die Warteschlange selbst benachrichtigt niemanden.

use pairline_core::types::ConnectionId;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{SignalingError, SignalingResult};

/// Ein Warteschlangen-Eintrag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub connection_id: ConnectionId,
    pub eingereiht: Instant,
}

impl QueueEntry {
    /// Wartezeit relativ zu `jetzt`
    pub fn wartezeit(&self, jetzt: Instant) -> Duration {
        jetzt.saturating_duration_since(self.eingereiht)
    }
}

/// FIFO-Warteschlange
#[derive(Debug, Default)]
pub struct WaitingQueue {
    eintraege: VecDeque<QueueEntry>,
}

impl WaitingQueue {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Reiht eine Verbindung am Ende ein
    pub fn einreihen(&mut self, id: ConnectionId) -> SignalingResult<()> {
        self.einreihen_bei(id, Instant::now())
    }

    /// Reiht mit explizitem Zeitstempel ein
    pub fn einreihen_bei(&mut self, id: ConnectionId, jetzt: Instant) -> SignalingResult<()> {
        if self.enthaelt(&id) {
            return Err(SignalingError::BereitsWartend(id));
        }
        self.eintraege.push_back(QueueEntry {
            connection_id: id,
            eingereiht: jetzt,
        });
        Ok(())
    }

    /// Entfernt den aeltesten Eintrag und gibt seine ID zurueck
    pub fn aeltesten_entnehmen(&mut self) -> Option<ConnectionId> {
        self.eintraege.pop_front().map(|e| e.connection_id)
    }

    /// Entfernt eine Verbindung; No-op wenn sie nicht wartet
    pub fn entfernen(&mut self, id: &ConnectionId) -> bool {
        let vorher = self.eintraege.len();
        self.eintraege.retain(|e| e.connection_id != *id);
        self.eintraege.len() != vorher
    }

    /// Entfernt alle Eintraege, die bei `jetzt` laenger als `max_alter` warten
    pub fn abgelaufene_entfernen_bei(
        &mut self,
        max_alter: Duration,
        jetzt: Instant,
    ) -> Vec<QueueEntry> {
        let mut abgelaufen = Vec::new();
        self.eintraege.retain(|e| {
            if e.wartezeit(jetzt) > max_alter {
                abgelaufen.push(*e);
                false
            } else {
                true
            }
        });
        abgelaufen
    }

    pub fn enthaelt(&self, id: &ConnectionId) -> bool {
        self.eintraege.iter().any(|e| e.connection_id == *id)
    }

    /// 1-basierte Position in der Warteschlange
    pub fn position(&self, id: &ConnectionId) -> Option<usize> {
        self.eintraege
            .iter()
            .position(|e| e.connection_id == *id)
            .map(|p| p + 1)
    }

    pub fn laenge(&self) -> usize {
        self.eintraege.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.eintraege.iter().map(|e| &e.connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn fifo_reihenfolge() {
        let mut queue = WaitingQueue::neu();
        let ids: Vec<ConnectionId> = (0..3).map(|_| ConnectionId::new()).collect();
        for id in &ids {
            queue.einreihen(*id).unwrap();
        }

        assert_eq!(queue.aeltesten_entnehmen(), Some(ids[0]));
        assert_eq!(queue.aeltesten_entnehmen(), Some(ids[1]));
        assert_eq!(queue.aeltesten_entnehmen(), Some(ids[2]));
        assert_eq!(queue.aeltesten_entnehmen(), None);
    }

    #[test]
    fn doppeltes_einreihen_wird_abgelehnt() {
        let mut queue = WaitingQueue::neu();
        let id = ConnectionId::new();
        queue.einreihen(id).unwrap();

        assert_eq!(queue.einreihen(id), Err(SignalingError::BereitsWartend(id)));
        assert_eq!(queue.laenge(), 1);
    }

    #[test]
    fn entfernen_ist_idempotent() {
        let mut queue = WaitingQueue::neu();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        queue.einreihen(a).unwrap();
        queue.einreihen(b).unwrap();

        assert!(queue.entfernen(&a));
        assert!(!queue.entfernen(&a));
        assert_eq!(queue.position(&b), Some(1));
    }

    #[test]
    fn positionen_sind_einsbasiert() {
        let mut queue = WaitingQueue::neu();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        queue.einreihen(a).unwrap();
        queue.einreihen(b).unwrap();

        assert_eq!(queue.position(&a), Some(1));
        assert_eq!(queue.position(&b), Some(2));
        assert_eq!(queue.position(&ConnectionId::new()), None);
    }

    #[test]
    fn sweep_entfernt_nur_abgelaufene() {
        let mut queue = WaitingQueue::neu();
        let t0 = Instant::now();
        let alt = ConnectionId::new();
        let frisch = ConnectionId::new();

        // alt wartet bei t0 + 6min seit 6 Minuten, frisch seit 1 Minute
        queue.einreihen_bei(alt, t0).unwrap();
        queue.einreihen_bei(frisch, t0 + 5 * MINUTE).unwrap();

        let abgelaufen = queue.abgelaufene_entfernen_bei(5 * MINUTE, t0 + 6 * MINUTE);
        assert_eq!(abgelaufen.len(), 1);
        assert_eq!(abgelaufen[0].connection_id, alt);
        assert_eq!(abgelaufen[0].wartezeit(t0 + 6 * MINUTE), 6 * MINUTE);

        assert!(!queue.enthaelt(&alt));
        assert!(queue.enthaelt(&frisch));
    }

    #[test]
    fn sweep_grenze_ist_exklusiv() {
        let mut queue = WaitingQueue::neu();
        let t0 = Instant::now();
        let id = ConnectionId::new();
        queue.einreihen_bei(id, t0).unwrap();

        assert!(queue
            .abgelaufene_entfernen_bei(5 * MINUTE, t0 + 5 * MINUTE)
            .is_empty());
        assert_eq!(queue.laenge(), 1);
    }
}

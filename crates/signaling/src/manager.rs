//! Session-Manager – Lifecycle-Controller fuer alle Verbindungen
//!
//! Der einzige Baustein, der Registry, Warteschlange und Paarungstabelle
//! gemeinsam veraendert. Alle drei liegen hinter einem einzigen Mutex; jede
//! Operation ist damit ein kritischer Abschnitt und laesst die Strukturen
//! konsistent zurueck.
//!
//! ## Zustandsmaschine pro Verbindung
//! ```text
//!              +--> Wartend --+
//!              |              v
//! verbinden -> Ungepaart <-> Gepaart
//!              |
//!              +--> (beendet, trennen)
//! ```
//!
//! ## Zustellung
//! Events werden noch unter dem Lock per `try_send` eingereiht, die
//! Reihenfolge in jeder Send-Queue entspricht damit der Reihenfolge der
//! Zustandsaenderungen. Eine volle oder geschlossene Send-Queue gilt als
//! Transportfehler: die Verbindung wird im selben kritischen Abschnitt
//! getrennt und ihr Partner erhaelt `peer-disconnected`.

use parking_lot::Mutex;
use pairline_core::types::{ClientMetadata, ConnectionId};
use pairline_observability::{Auslastung, AuslastungsQuelle, PairlineMetrics};
use pairline_protocol::{ServerEvent, SignalPayload};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{SignalingError, SignalingResult};
use crate::eviction::{hook_aus_config, EvictionHook};
use crate::pairing::PairingTable;
use crate::queue::WaitingQueue;
use crate::registry::ConnectionRegistry;
use crate::relay::{self, SignalingRelay};
use crate::sender::ClientSender;
use crate::server_state::SignalingConfig;
use crate::stats::SessionStats;

/// Grund im `peer-disconnected`-Event wenn der Partner find-next aufruft
pub const GRUND_NAECHSTER: &str = "next";
/// Grund bei fehlgeschlagener Zustellung an einen Client
pub const GRUND_TRANSPORT: &str = "transport";

// ---------------------------------------------------------------------------
// Sitzungsstatus
// ---------------------------------------------------------------------------

/// Beobachtbarer Zustand einer registrierten Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitzungsStatus {
    /// Registriert, weder wartend noch gepaart
    Ungepaart,
    /// Hat einen Warteschlangen-Eintrag (1-basierte Position)
    Wartend { position: usize },
    /// Ist Teil einer Paarung
    Gepaart { partner: ConnectionId },
}

// ---------------------------------------------------------------------------
// Interna
// ---------------------------------------------------------------------------

/// Ein unter dem Lock vorbereitetes Event
#[derive(Debug)]
struct Zustellung {
    ziel: ClientSender,
    event: ServerEvent,
}

impl Zustellung {
    fn neu(ziel: ClientSender, event: ServerEvent) -> Self {
        Self { ziel, event }
    }
}

#[derive(Debug, Default)]
struct SitzungsZustand {
    registry: ConnectionRegistry,
    warteschlange: WaitingQueue,
    paarungen: PairingTable,
}

impl SitzungsZustand {
    fn statistik(&self) -> SessionStats {
        SessionStats {
            active_connections: self.registry.anzahl(),
            waiting_queue: self.warteschlange.laenge(),
            active_pairs: self.paarungen.paar_anzahl(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Serialisiert alle Lifecycle-Operationen (connect, signal, find-next,
/// disconnect, sweep) ueber einen gemeinsamen Lock
///
/// Wird einmal beim Start erzeugt und als `Arc` an alle Handler verteilt.
pub struct SessionManager {
    zustand: Mutex<SitzungsZustand>,
    max_verbindungen: usize,
    eviction_hook: Arc<dyn EvictionHook>,
    metriken: Option<PairlineMetrics>,
}

impl SessionManager {
    /// Erstellt einen neuen SessionManager
    pub fn neu(config: &SignalingConfig) -> Self {
        Self {
            zustand: Mutex::new(SitzungsZustand::default()),
            max_verbindungen: config.max_verbindungen,
            eviction_hook: hook_aus_config(config.abgelaufene_benachrichtigen),
            metriken: None,
        }
    }

    /// Aktiviert Prometheus-Metriken
    pub fn mit_metriken(mut self, metriken: PairlineMetrics) -> Self {
        self.metriken = Some(metriken);
        self
    }

    /// Ersetzt den Eviction-Hook
    pub fn mit_eviction_hook(mut self, hook: Arc<dyn EvictionHook>) -> Self {
        self.eviction_hook = hook;
        self
    }

    // -----------------------------------------------------------------------
    // connect
    // -----------------------------------------------------------------------

    /// Registriert eine neue Verbindung und versucht sofort zu matchen
    ///
    /// Ohne wartenden Partner wird die Verbindung eingereiht.
    pub fn verbinden(
        &self,
        id: ConnectionId,
        metadata: ClientMetadata,
        sender: ClientSender,
    ) -> SignalingResult<()> {
        let mut z = self.zustand.lock();

        if z.registry.anzahl() >= self.max_verbindungen {
            tracing::warn!(
                connection_id = %id,
                max = self.max_verbindungen,
                "Server voll – Verbindung abgelehnt"
            );
            return Err(SignalingError::ServerVoll);
        }

        let user_agent = metadata.user_agent.clone();
        if let Err(e) = z.registry.registrieren(id, metadata, sender) {
            return Err(self.verletzung(e));
        }
        tracing::info!(
            connection_id = %id,
            user_agent = user_agent.as_deref().unwrap_or("-"),
            "Verbindung registriert"
        );

        let ergebnis = self.matchen(&mut z, id).map(|zustellungen| {
            self.zustellen(&mut z, zustellungen);
        });
        self.gauges_aktualisieren(&z);
        ergebnis
    }

    // -----------------------------------------------------------------------
    // find-next
    // -----------------------------------------------------------------------

    /// Verlaesst den aktuellen Partner und sucht einen neuen
    ///
    /// Wartet die Verbindung bereits, bleibt sie unveraendert eingereiht und
    /// erhaelt ihre aktuelle Position erneut.
    pub fn naechster(&self, id: ConnectionId) -> SignalingResult<()> {
        let mut z = self.zustand.lock();

        let Some(sender) = z.registry.sender(&id) else {
            tracing::debug!(connection_id = %id, "find-next fuer unbekannte Verbindung");
            return Err(SignalingError::UnbekannteVerbindung(id));
        };

        if let Some(position) = z.warteschlange.position(&id) {
            tracing::debug!(
                connection_id = %id,
                position,
                "find-next waehrend Wartens – keine Aenderung"
            );
            self.zustellen(
                &mut z,
                vec![Zustellung::neu(sender, ServerEvent::wartend(Some(position)))],
            );
            self.gauges_aktualisieren(&z);
            return Ok(());
        }

        let mut zustellungen = Vec::new();
        if let Some(alter_partner) = z.paarungen.entpaaren(&id) {
            if let Some(metriken) = &self.metriken {
                metriken.skips_total.inc();
            }
            tracing::info!(
                connection_id = %id,
                partner_id = %alter_partner,
                "Partner uebersprungen"
            );
            if let Some(partner_sender) = z.registry.sender(&alter_partner) {
                zustellungen.push(Zustellung::neu(
                    partner_sender,
                    ServerEvent::peer_getrennt(Some(GRUND_NAECHSTER.to_string())),
                ));
            }
        }

        let ergebnis = self.matchen(&mut z, id).map(|weitere| zustellungen.extend(weitere));
        self.zustellen(&mut z, zustellungen);
        self.gauges_aktualisieren(&z);
        ergebnis
    }

    // -----------------------------------------------------------------------
    // signal
    // -----------------------------------------------------------------------

    /// Leitet eine Payload unveraendert an den Partner von `von` weiter
    ///
    /// Nimmt der Partner die Payload nicht an (Queue voll oder geschlossen),
    /// wird er getrennt und `von` erhaelt `peer-disconnected`.
    pub fn signal(&self, von: ConnectionId, payload: SignalPayload) -> SignalingResult<()> {
        let mut z = self.zustand.lock();

        let ziel = match SignalingRelay::neu(&z.registry, &z.paarungen).ziel(&von) {
            Ok(ziel) => ziel,
            Err(e) => {
                tracing::debug!(connection_id = %von, fehler = %e, "Signal nicht zustellbar");
                return Err(e);
            }
        };

        tracing::trace!(
            connection_id = %von,
            partner_id = %ziel.connection_id,
            kind = payload.art().as_deref().unwrap_or("unbekannt"),
            bytes = payload.laenge(),
            "Signal weitergeleitet"
        );

        match relay::zustellen(&ziel, payload) {
            Ok(()) => {
                if let Some(metriken) = &self.metriken {
                    metriken.signals_relayed_total.inc();
                }
                Ok(())
            }
            Err(fehler) => {
                tracing::warn!(
                    connection_id = %von,
                    partner_id = %ziel.connection_id,
                    fehler = ?fehler,
                    "Partner nimmt keine Signale an – Paarung wird aufgeloest"
                );
                let folge = self.trennen_intern(&mut z, ziel.connection_id, GRUND_TRANSPORT);
                self.zustellen(&mut z, folge);
                self.gauges_aktualisieren(&z);
                Err(SignalingError::KeinAktiverPartner(von))
            }
        }
    }

    // -----------------------------------------------------------------------
    // disconnect
    // -----------------------------------------------------------------------

    /// Beendet eine Verbindung endgueltig
    ///
    /// Ein vorhandener Partner erhaelt genau ein `peer-disconnected` und bleibt
    /// ungepaart; er wird nicht automatisch wieder eingereiht. Unbekannte IDs
    /// sind ein No-op.
    pub fn trennen(&self, id: ConnectionId, grund: &str) {
        let mut z = self.zustand.lock();
        let zustellungen = self.trennen_intern(&mut z, id, grund);
        self.zustellen(&mut z, zustellungen);
        self.gauges_aktualisieren(&z);
    }

    fn trennen_intern(
        &self,
        z: &mut SitzungsZustand,
        id: ConnectionId,
        grund: &str,
    ) -> Vec<Zustellung> {
        let mut zustellungen = Vec::new();

        let partner = z.paarungen.entpaaren(&id);
        if let Some(partner) = partner {
            if let Some(partner_sender) = z.registry.sender(&partner) {
                zustellungen.push(Zustellung::neu(
                    partner_sender,
                    ServerEvent::peer_getrennt(Some(grund.to_string())),
                ));
            }
        }
        let war_wartend = z.warteschlange.entfernen(&id);
        let verbindung = z.registry.abmelden(&id);

        match verbindung {
            Some(verbindung) => {
                let dauer = chrono::Utc::now() - verbindung.metadata.verbunden_seit;
                tracing::info!(
                    connection_id = %id,
                    grund,
                    partner_id = ?partner,
                    war_wartend,
                    dauer_sek = dauer.num_seconds(),
                    "Verbindung getrennt"
                );
            }
            None => {
                tracing::debug!(connection_id = %id, grund, "Verbindung bereits getrennt");
            }
        }

        zustellungen
    }

    // -----------------------------------------------------------------------
    // sweep
    // -----------------------------------------------------------------------

    /// Entfernt alle Wartenden, die laenger als `max_alter` warten
    pub fn aufraeumen(&self, max_alter: Duration) -> Vec<ConnectionId> {
        self.aufraeumen_bei(max_alter, Instant::now())
    }

    /// Wie `aufraeumen`, relativ zu `jetzt`
    pub fn aufraeumen_bei(&self, max_alter: Duration, jetzt: Instant) -> Vec<ConnectionId> {
        let mut z = self.zustand.lock();
        let abgelaufen = z.warteschlange.abgelaufene_entfernen_bei(max_alter, jetzt);

        let mut zustellungen = Vec::new();
        let mut entfernt = Vec::with_capacity(abgelaufen.len());
        for eintrag in abgelaufen {
            let id = eintrag.connection_id;
            let wartezeit = eintrag.wartezeit(jetzt);
            tracing::info!(
                connection_id = %id,
                wartezeit_sek = wartezeit.as_secs(),
                "Wartender nach Zeitueberschreitung entfernt"
            );
            if let Some(metriken) = &self.metriken {
                metriken.queue_evictions_total.inc();
            }
            if let Some(event) = self.eviction_hook.on_evicted(id, wartezeit) {
                if let Some(sender) = z.registry.sender(&id) {
                    zustellungen.push(Zustellung::neu(sender, event));
                }
            }
            entfernt.push(id);
        }

        if !entfernt.is_empty() {
            tracing::info!(anzahl = entfernt.len(), "Warteschlangen-Sweep abgeschlossen");
        }

        self.zustellen(&mut z, zustellungen);
        self.gauges_aktualisieren(&z);
        entfernt
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Konsistenter Schnappschuss der Zaehler
    pub fn statistik(&self) -> SessionStats {
        self.zustand.lock().statistik()
    }

    /// Zustand einer Verbindung; `None` wenn sie nicht (mehr) registriert ist
    pub fn status(&self, id: &ConnectionId) -> Option<SitzungsStatus> {
        let z = self.zustand.lock();
        if !z.registry.ist_registriert(id) {
            return None;
        }
        if let Some(partner) = z.paarungen.partner_von(id) {
            return Some(SitzungsStatus::Gepaart { partner });
        }
        if let Some(position) = z.warteschlange.position(id) {
            return Some(SitzungsStatus::Wartend { position });
        }
        Some(SitzungsStatus::Ungepaart)
    }

    /// Prueft alle Invarianten zwischen Registry, Warteschlange und Paarungen
    ///
    /// Gibt die erste gefundene Verletzung als Text zurueck.
    pub fn invarianten_pruefen(&self) -> Result<(), String> {
        let z = self.zustand.lock();

        let mut gesehen = HashSet::new();
        for id in z.warteschlange.ids() {
            if !gesehen.insert(*id) {
                return Err(format!("{id} mehrfach in der Warteschlange"));
            }
            if !z.registry.ist_registriert(id) {
                return Err(format!("{id} wartet, ist aber nicht registriert"));
            }
            if z.paarungen.partner_von(id).is_some() {
                return Err(format!("{id} ist gleichzeitig wartend und gepaart"));
            }
        }

        for (a, b) in z.paarungen.eintraege() {
            if z.paarungen.partner_von(b) != Some(*a) {
                return Err(format!("Paarung {a} -> {b} ist nicht symmetrisch"));
            }
            if !z.registry.ist_registriert(a) {
                return Err(format!("{a} ist gepaart, aber nicht registriert"));
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    /// Matching-Policy fuer connect und find-next
    ///
    /// Der aelteste Wartende wird Initiator, die anfragende Verbindung nicht.
    /// Ohne Wartenden wird die anfragende Verbindung eingereiht.
    fn matchen(
        &self,
        z: &mut SitzungsZustand,
        id: ConnectionId,
    ) -> SignalingResult<Vec<Zustellung>> {
        let sender = z
            .registry
            .sender(&id)
            .ok_or(SignalingError::UnbekannteVerbindung(id))?;

        if z.paarungen.partner_von(&id).is_some() {
            return Err(self.verletzung(SignalingError::BereitsGepaart(id)));
        }
        if z.warteschlange.enthaelt(&id) {
            return Err(self.verletzung(SignalingError::BereitsWartend(id)));
        }

        while let Some(wartender) = z.warteschlange.aeltesten_entnehmen() {
            if !z.registry.ist_registriert(&wartender) {
                tracing::error!(
                    connection_id = %wartender,
                    "Wartender ist nicht registriert – Eintrag verworfen"
                );
                if let Some(metriken) = &self.metriken {
                    metriken.invariant_violations_total.inc();
                }
                continue;
            }
            // Socket bereits zu: die Verbindung wird gleich von ihrem Task getrennt
            let Some(wartender_sender) = z.registry.sender(&wartender).filter(|s| s.ist_offen())
            else {
                tracing::debug!(connection_id = %wartender, "Wartender nicht mehr erreichbar – uebersprungen");
                continue;
            };

            if let Err(e) = z.paarungen.paaren(wartender, id) {
                self.verletzung(e);
                continue;
            }

            if let Some(metriken) = &self.metriken {
                metriken.matches_total.inc();
            }
            tracing::info!(
                initiator = %wartender,
                partner_id = %id,
                "Paarung erstellt"
            );

            // Nicht-Initiator zuerst, damit dessen match-found vor einem Offer eintrifft
            return Ok(vec![
                Zustellung::neu(sender, ServerEvent::match_gefunden(wartender, false)),
                Zustellung::neu(wartender_sender, ServerEvent::match_gefunden(id, true)),
            ]);
        }

        if let Err(e) = z.warteschlange.einreihen(id) {
            return Err(self.verletzung(e));
        }
        let position = z.warteschlange.position(&id);
        tracing::debug!(connection_id = %id, position = ?position, "Wartet auf Partner");

        Ok(vec![Zustellung::neu(sender, ServerEvent::wartend(position))])
    }

    /// Protokolliert Invariantenverletzungen und gibt den Fehler zurueck
    fn verletzung(&self, fehler: SignalingError) -> SignalingError {
        if fehler.ist_invariantenverletzung() {
            tracing::error!(fehler = %fehler, "Invariantenverletzung – Operation abgelehnt");
            if let Some(metriken) = &self.metriken {
                metriken.invariant_violations_total.inc();
            }
        }
        fehler
    }

    fn gauges_aktualisieren(&self, z: &SitzungsZustand) {
        if let Some(metriken) = &self.metriken {
            let stats = z.statistik();
            metriken.gauges_setzen(
                stats.active_connections,
                stats.waiting_queue,
                stats.active_pairs,
            );
        }
    }

    /// Reiht vorbereitete Events ein (unter dem Lock, `try_send` blockiert nie)
    ///
    /// Ein Empfaenger mit voller oder geschlossener Queue wird getrennt; die
    /// Folge-Events landen wieder in derselben Arbeitsliste. Events an bereits
    /// getrennte Verbindungen entfallen.
    fn zustellen(&self, z: &mut SitzungsZustand, zustellungen: Vec<Zustellung>) {
        let mut offen: VecDeque<Zustellung> = zustellungen.into();
        while let Some(Zustellung { ziel, event }) = offen.pop_front() {
            if !z.registry.ist_registriert(&ziel.connection_id) {
                continue;
            }
            if let Err(fehler) = ziel.senden(event) {
                tracing::warn!(
                    connection_id = %ziel.connection_id,
                    fehler = ?fehler,
                    "Zustellung fehlgeschlagen – Verbindung wird getrennt"
                );
                offen.extend(self.trennen_intern(z, ziel.connection_id, GRUND_TRANSPORT));
            }
        }
    }
}

impl AuslastungsQuelle for SessionManager {
    fn auslastung(&self) -> Auslastung {
        Auslastung {
            verbindungen: self.zustand.lock().registry.anzahl(),
            max_verbindungen: self.max_verbindungen,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

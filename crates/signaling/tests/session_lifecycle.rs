//! Integration-Tests fuer den SessionManager (In-Memory Send-Queues)

use pairline_core::types::{ClientMetadata, ConnectionId};
use pairline_protocol::{ServerEvent, SignalPayload};
use pairline_signaling::{
    ClientSender, NotifyEviction, SessionManager, SignalingConfig, SignalingError, SitzungsStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

struct Client {
    id: ConnectionId,
    rx: mpsc::Receiver<ServerEvent>,
}

impl Client {
    fn events(&mut self) -> Vec<ServerEvent> {
        let mut alle = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            alle.push(event);
        }
        alle
    }
}

fn manager() -> SessionManager {
    SessionManager::neu(&SignalingConfig::default())
}

fn verbinden(manager: &SessionManager) -> Client {
    let id = ConnectionId::new();
    let (sender, rx) = ClientSender::kanal(id);
    manager
        .verbinden(id, ClientMetadata::neu(Some("test-agent".into()), None), sender)
        .unwrap();
    Client { id, rx }
}

fn ist_peer_disconnected(event: &ServerEvent) -> bool {
    matches!(event, ServerEvent::PeerDisconnected { .. })
}

#[test]
fn skip_szenario_a_b_c() {
    let m = manager();

    let mut a = verbinden(&m);
    assert_eq!(a.events(), vec![ServerEvent::wartend(Some(1))]);

    let mut b = verbinden(&m);
    assert_eq!(a.events(), vec![ServerEvent::match_gefunden(b.id, true)]);
    assert_eq!(b.events(), vec![ServerEvent::match_gefunden(a.id, false)]);

    let mut c = verbinden(&m);
    assert_eq!(c.events(), vec![ServerEvent::wartend(Some(1))]);

    // A ueberspringt B und trifft auf den wartenden C
    m.naechster(a.id).unwrap();
    assert_eq!(
        b.events(),
        vec![ServerEvent::peer_getrennt(Some("next".into()))]
    );
    assert_eq!(c.events(), vec![ServerEvent::match_gefunden(a.id, true)]);
    assert_eq!(a.events(), vec![ServerEvent::match_gefunden(c.id, false)]);

    assert_eq!(m.status(&b.id), Some(SitzungsStatus::Ungepaart));
    assert_eq!(m.status(&a.id), Some(SitzungsStatus::Gepaart { partner: c.id }));
    m.invarianten_pruefen().unwrap();
}

#[test]
fn wartende_werden_in_ankunftsreihenfolge_gepaart() {
    let m = manager();

    let mut paare = Vec::new();
    for _ in 0..3 {
        let wartender = verbinden(&m);
        let neu = verbinden(&m);
        paare.push((wartender, neu));
    }

    for (wartender, mut neu) in paare {
        assert_eq!(
            neu.events(),
            vec![ServerEvent::match_gefunden(wartender.id, false)]
        );
        assert_eq!(
            m.status(&wartender.id),
            Some(SitzungsStatus::Gepaart { partner: neu.id })
        );
    }
    m.invarianten_pruefen().unwrap();
}

#[test]
fn warteschlange_entnimmt_fifo() {
    use pairline_signaling::queue::WaitingQueue;

    let mut queue = WaitingQueue::neu();
    let ids: Vec<_> = (0..3).map(|_| ConnectionId::new()).collect();
    for id in &ids {
        queue.einreihen(*id).unwrap();
    }

    let entnommen: Vec<_> = std::iter::from_fn(|| queue.aeltesten_entnehmen()).collect();
    assert_eq!(entnommen, ids);
}

#[test]
fn find_next_waehrend_wartens_ist_no_op() {
    let m = manager();
    let mut a = verbinden(&m);
    a.events();

    m.naechster(a.id).unwrap();
    m.naechster(a.id).unwrap();

    assert_eq!(
        a.events(),
        vec![ServerEvent::wartend(Some(1)), ServerEvent::wartend(Some(1))]
    );
    assert_eq!(m.statistik().waiting_queue, 1);
    m.invarianten_pruefen().unwrap();
}

#[test]
fn disconnect_raeumt_auf_und_benachrichtigt_partner_einmal() {
    let m = manager();
    let mut a = verbinden(&m);
    let b = verbinden(&m);
    a.events();

    m.trennen(b.id, "closed");
    m.trennen(b.id, "closed");

    let events = a.events();
    assert_eq!(events.iter().filter(|e| ist_peer_disconnected(e)).count(), 1);
    assert_eq!(m.status(&b.id), None);
    assert_eq!(m.status(&a.id), Some(SitzungsStatus::Ungepaart));

    let stats = m.statistik();
    assert_eq!(stats.active_connections, 1);
    assert_eq!(stats.waiting_queue, 0);
    assert_eq!(stats.active_pairs, 0);
}

#[test]
fn disconnect_eines_wartenden() {
    let m = manager();
    let a = verbinden(&m);
    m.trennen(a.id, "timeout");

    assert_eq!(m.statistik().waiting_queue, 0);
    assert_eq!(m.statistik().active_connections, 0);

    // Naechste Verbindung darf nicht mit der beendeten gepaart werden
    let mut b = verbinden(&m);
    assert_eq!(b.events(), vec![ServerEvent::wartend(Some(1))]);
}

#[test]
fn signal_wird_identisch_weitergeleitet() {
    let m = manager();
    let mut a = verbinden(&m);
    let mut b = verbinden(&m);
    a.events();
    b.events();

    let roh = r#"{"type":"offer","sdp":"v=0\r\n","extra":[1,2,{"x":null}]}"#;
    m.signal(a.id, SignalPayload::aus_json(roh).unwrap()).unwrap();

    let events = b.events();
    assert_eq!(events.len(), 1);
    let ServerEvent::Signal { payload } = &events[0] else {
        panic!("Erwartet Signal-Event");
    };
    assert_eq!(payload.als_json(), roh);
    assert!(a.events().is_empty());
}

#[test]
fn signal_reihenfolge_bleibt_erhalten() {
    let m = manager();
    let mut a = verbinden(&m);
    let mut b = verbinden(&m);
    a.events();
    b.events();

    for i in 0..10 {
        let roh = format!(r#"{{"type":"candidate","n":{i}}}"#);
        m.signal(b.id, SignalPayload::aus_json(&roh).unwrap()).unwrap();
    }

    let nummern: Vec<String> = a
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::Signal { payload } => Some(payload.als_json().to_string()),
            _ => None,
        })
        .collect();
    let erwartet: Vec<String> = (0..10)
        .map(|i| format!(r#"{{"type":"candidate","n":{i}}}"#))
        .collect();
    assert_eq!(nummern, erwartet);
}

#[test]
fn signal_nach_partner_disconnect() {
    let m = manager();
    let a = verbinden(&m);
    let b = verbinden(&m);
    m.trennen(b.id, "closed");

    let ergebnis = m.signal(a.id, SignalPayload::aus_json("{}").unwrap());
    assert_eq!(ergebnis, Err(SignalingError::KeinAktiverPartner(a.id)));
}

#[test]
fn sweep_entfernt_nur_abgelaufene() {
    let m = manager();
    let a = verbinden(&m);
    let max = Duration::from_secs(5 * 60);

    let entfernt = m.aufraeumen_bei(max, Instant::now() + Duration::from_secs(60));
    assert!(entfernt.is_empty());
    assert_eq!(m.status(&a.id), Some(SitzungsStatus::Wartend { position: 1 }));

    let entfernt = m.aufraeumen_bei(max, Instant::now() + Duration::from_secs(6 * 60));
    assert_eq!(entfernt, vec![a.id]);
    assert_eq!(m.status(&a.id), Some(SitzungsStatus::Ungepaart));
    assert_eq!(m.statistik().active_connections, 1);
}

#[test]
fn sweep_mit_benachrichtigung() {
    let m = manager().mit_eviction_hook(Arc::new(NotifyEviction));
    let mut a = verbinden(&m);
    a.events();

    m.aufraeumen_bei(
        Duration::from_secs(300),
        Instant::now() + Duration::from_secs(400),
    );

    let events = a.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        ServerEvent::QueueExpired { waited_secs } if waited_secs >= 400
    ));

    // Danach kann der Client erneut suchen
    m.naechster(a.id).unwrap();
    assert_eq!(a.events(), vec![ServerEvent::wartend(Some(1))]);
}

#[test]
fn sweep_ohne_benachrichtigung_ist_still() {
    let m = manager();
    let mut a = verbinden(&m);
    a.events();

    m.aufraeumen_bei(Duration::from_secs(300), Instant::now() + Duration::from_secs(400));
    assert!(a.events().is_empty());
}

#[test]
fn geschlossene_send_queue_loest_paarung_auf() {
    let m = manager();
    let mut a = verbinden(&m);
    let b = verbinden(&m);
    a.events();
    let b_id = b.id;
    drop(b);

    // a sucht weiter: b bekommt peer-disconnected nicht mehr zugestellt und
    // wird als Transportfehler getrennt
    m.naechster(a.id).unwrap();
    assert_eq!(m.status(&b_id), None);
    assert_eq!(m.status(&a.id), Some(SitzungsStatus::Wartend { position: 1 }));
    m.invarianten_pruefen().unwrap();
}

/// Jedes Signal muss vom Partner aus dem zuletzt empfangenen match-found stammen
fn nur_signale_vom_aktuellen_partner(events: &[ServerEvent]) {
    let mut partner: Option<ConnectionId> = None;
    for event in events {
        match event {
            ServerEvent::MatchFound { partner_id, .. } => partner = Some(*partner_id),
            ServerEvent::PeerDisconnected { .. } | ServerEvent::WaitingForPeer { .. } => {
                partner = None
            }
            ServerEvent::Signal { payload } => {
                let partner = partner.expect("Signal ohne aktive Paarung empfangen");
                assert_eq!(payload.als_json(), absender_payload(partner));
            }
            _ => {}
        }
    }
}

fn absender_payload(id: ConnectionId) -> String {
    format!(r#"{{"von":"{}"}}"#, id.0)
}

#[test]
fn nebenlaeufige_signale_erreichen_nur_den_aktuellen_partner() {
    let m = Arc::new(manager());

    let threads: Vec<_> = (1..=4u64)
        .map(|seed| {
            let m = Arc::clone(&m);
            std::thread::spawn(move || {
                let mut client = verbinden(&m);
                let mut zufall = Lcg(seed);
                let mut protokoll = Vec::new();
                let roh = absender_payload(client.id);

                for _ in 0..500 {
                    // Fehler (kein Partner, getrennt) gehoeren zum erwarteten Ablauf
                    if zufall.naechste(4) == 0 {
                        let _ = m.naechster(client.id);
                    } else {
                        let _ = m.signal(client.id, SignalPayload::aus_json(&roh).unwrap());
                    }
                    protokoll.extend(client.events());
                }
                (client, protokoll)
            })
        })
        .collect();

    let mut ergebnisse: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    for (client, protokoll) in &mut ergebnisse {
        protokoll.extend(client.events());
        nur_signale_vom_aktuellen_partner(protokoll);
    }
    m.invarianten_pruefen().unwrap();
}

/// Einfacher deterministischer Zufallsgenerator (LCG)
struct Lcg(u64);

impl Lcg {
    fn naechste(&mut self, grenze: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % grenze
    }
}

#[test]
fn zufaellige_operationsfolgen_halten_invarianten() {
    for seed in 1..=20u64 {
        let m = manager();
        let mut zufall = Lcg(seed);
        let mut clients: HashMap<usize, Client> = HashMap::new();

        for _ in 0..300 {
            let slot = zufall.naechste(8);
            match zufall.naechste(4) {
                0 => {
                    if !clients.contains_key(&slot) {
                        clients.insert(slot, verbinden(&m));
                    }
                }
                1 => {
                    if let Some(client) = clients.remove(&slot) {
                        let partner = match m.status(&client.id) {
                            Some(SitzungsStatus::Gepaart { partner }) => Some(partner),
                            _ => None,
                        };
                        m.trennen(client.id, "closed");

                        if let Some(partner) = partner {
                            let partner_client = clients
                                .values_mut()
                                .find(|c| c.id == partner)
                                .unwrap();
                            let events = partner_client.events();
                            assert_eq!(
                                events.iter().filter(|e| ist_peer_disconnected(e)).count(),
                                1
                            );
                            assert_eq!(m.status(&partner), Some(SitzungsStatus::Ungepaart));
                        }
                    }
                }
                2 => {
                    if let Some(client) = clients.get(&slot) {
                        m.naechster(client.id).unwrap();
                    }
                }
                _ => {
                    if let Some(client) = clients.get(&slot) {
                        let payload = SignalPayload::aus_json(r#"{"type":"offer"}"#).unwrap();
                        let gepaart =
                            matches!(m.status(&client.id), Some(SitzungsStatus::Gepaart { .. }));
                        assert_eq!(m.signal(client.id, payload).is_ok(), gepaart);
                    }
                }
            }

            m.invarianten_pruefen().unwrap();
            for client in clients.values_mut() {
                // Send-Queues leeren, damit try_send nie an der Kapazitaet scheitert
                client.events();
                assert!(m.status(&client.id).is_some());
            }
            let stats = m.statistik();
            assert_eq!(stats.active_connections, clients.len());
            assert!(stats.waiting_queue <= 1);
        }
    }
}

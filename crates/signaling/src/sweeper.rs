//! Hintergrund-Task fuer den Warteschlangen-Sweep

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::manager::SessionManager;

/// Startet den periodischen Sweep
///
/// Entfernt bei jedem Tick alle Wartenden, die laenger als `max_wartezeit`
/// warten. Beendet sich beim Shutdown-Signal.
pub fn sweeper_starten(
    manager: Arc<SessionManager>,
    intervall: Duration,
    max_wartezeit: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + intervall, intervall);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            intervall_sek = intervall.as_secs(),
            max_wartezeit_sek = max_wartezeit.as_secs(),
            "Warteschlangen-Sweeper gestartet"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    manager.aufraeumen(max_wartezeit);
                }
                ergebnis = shutdown_rx.changed() => {
                    if ergebnis.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Warteschlangen-Sweeper beendet");
    })
}

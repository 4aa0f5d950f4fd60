//! Eviction-Hook – Entscheidet ueber Benachrichtigung abgelaufener Wartender
//!
//! Der Sweep entfernt Wartende still aus der Warteschlange. Ob der Client
//! davon erfaehrt, entscheidet der konfigurierte Hook.

use pairline_core::types::ConnectionId;
use pairline_protocol::ServerEvent;
use std::sync::Arc;
use std::time::Duration;

/// Wird einmal pro entferntem Wartenden aufgerufen (unter dem Lock, darf nicht blockieren)
pub trait EvictionHook: Send + Sync {
    /// Optionales Event fuer den entfernten Client
    fn on_evicted(&self, connection_id: ConnectionId, wartezeit: Duration) -> Option<ServerEvent>;
}

/// Keine Benachrichtigung
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentEviction;

impl EvictionHook for SilentEviction {
    fn on_evicted(&self, _connection_id: ConnectionId, _wartezeit: Duration) -> Option<ServerEvent> {
        None
    }
}

/// Sendet `queue-expired` an den entfernten Client
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyEviction;

impl EvictionHook for NotifyEviction {
    fn on_evicted(&self, _connection_id: ConnectionId, wartezeit: Duration) -> Option<ServerEvent> {
        Some(ServerEvent::QueueExpired {
            waited_secs: wartezeit.as_secs(),
        })
    }
}

/// Waehlt den Hook anhand der Konfiguration
pub fn hook_aus_config(benachrichtigen: bool) -> Arc<dyn EvictionHook> {
    if benachrichtigen {
        Arc::new(NotifyEviction)
    } else {
        Arc::new(SilentEviction)
    }
}

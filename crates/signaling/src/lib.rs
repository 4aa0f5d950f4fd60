//! pairline-signaling – Matchmaking und Signaling-Relay
//!
//! Dieser Crate paart anonyme, gleichzeitig verbundene Clients zu
//! kurzlebigen 1:1-Sitzungen und leitet Signaling-Nachrichten (SDP, ICE)
//! unveraendert zwischen den Partnern weiter. Medien laufen direkt
//! Peer-to-Peer und beruehren den Server nie.
//!
//! ## Architektur
//!
//! ```text
//! axum Router (/ws, /stats)
//!     |
//!     v
//! ClientConnection (pro WebSocket ein Task)
//!     |  connect / find-next / signal / disconnect
//!     v
//! SessionManager (ein Mutex, alle Operationen serialisiert)
//!     +-- ConnectionRegistry  (wer ist verbunden)
//!     +-- WaitingQueue        (FIFO der Wartenden)
//!     +-- PairingTable        (symmetrische Paarungen)
//!     +-- SignalingRelay      (Partner-Lookup fuer signal)
//!     +-- EvictionHook        (Reaktion auf abgelaufene Wartende)
//!
//! Sweeper – entfernt periodisch zu lange Wartende
//! ```

pub mod connection;
pub mod error;
pub mod eviction;
pub mod manager;
pub mod pairing;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod sender;
pub mod server;
pub mod server_state;
pub mod stats;
pub mod sweeper;

// Bequeme Re-Exporte
pub use connection::ClientConnection;
pub use error::{SignalingError, SignalingResult};
pub use eviction::{EvictionHook, NotifyEviction, SilentEviction};
pub use manager::{SessionManager, SitzungsStatus};
pub use sender::ClientSender;
pub use server::signaling_router;
pub use server_state::{SignalingConfig, SignalingState};
pub use stats::SessionStats;
pub use sweeper::sweeper_starten;

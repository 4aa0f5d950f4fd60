//! pairline-protocol – Nachrichten zwischen Browser-Client und Server
//!
//! Dieses Crate definiert die JSON-Frames, die ueber die WebSocket-Verbindung
//! ausgetauscht werden. Signaling-Payloads bleiben dabei opak.

pub mod messages;

pub use messages::{
    ClientEvent, ErrorCode, ErrorResponse, FrameFehler, ServerEvent, SignalPayload,
};

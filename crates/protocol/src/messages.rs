//! Signaling-Protokoll (WebSocket, JSON)
//!
//! Definiert alle Nachrichten die zwischen Browser-Client und Server
//! ausgetauscht werden.
//!
//! ## Design
//! - Jeder Frame ist ein JSON-Objekt mit einem `type`-Feld (kebab-case)
//! - Signaling-Payloads werden als rohes JSON (`RawValue`) gehalten und
//!   unveraendert weitergeleitet
//! - Eingehende Frames werden ueber einen flachen Umschlag (`ClientFrame`)
//!   gelesen, weil intern getaggte Enums keine `RawValue`-Felder tragen koennen

use pairline_core::types::ConnectionId;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer `error`-Events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Generischer Fehler (Invariantenverletzung im Server)
    InternalError,
    /// Frame konnte nicht gelesen werden
    InvalidRequest,
    /// Signal ohne aktiven Partner
    NoActivePeer,
    /// Operation auf bereits beendeter Verbindung
    UnknownConnection,
    /// Verbindungslimit erreicht
    ServerFull,
}

/// Inhalt eines `error`-Events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// SignalPayload
// ---------------------------------------------------------------------------

/// Opake Signaling-Nutzlast (SDP-Offer, Answer, ICE-Candidate, ...)
///
/// Der Server parst den Inhalt nicht. Einzige Ausnahme ist `art()`, das fuer
/// Logging einen evtl. vorhandenen `type`-Schluessel ausliest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalPayload(Box<RawValue>);

impl SignalPayload {
    /// Erstellt eine Payload aus rohem JSON-Text
    pub fn aus_json(json: &str) -> Result<Self, FrameFehler> {
        let raw = RawValue::from_string(json.to_string())
            .map_err(|e| FrameFehler::UngueltigesJson(e.to_string()))?;
        Ok(Self(raw))
    }

    /// Gibt den rohen JSON-Text zurueck
    pub fn als_json(&self) -> &str {
        self.0.get()
    }

    /// Laenge der Nutzlast in Bytes
    pub fn laenge(&self) -> usize {
        self.0.get().len()
    }

    /// Nachrichtenart fuer Logging (`offer`, `answer`, `candidate`, ...)
    pub fn art(&self) -> Option<String> {
        #[derive(Deserialize)]
        struct ArtPeek {
            #[serde(rename = "type")]
            art: Option<String>,
        }

        serde_json::from_str::<ArtPeek>(self.0.get())
            .ok()
            .and_then(|p| p.art)
    }
}

impl PartialEq for SignalPayload {
    fn eq(&self, other: &Self) -> bool {
        self.0.get() == other.0.get()
    }
}

impl Eq for SignalPayload {}

// ---------------------------------------------------------------------------
// Eingehende Frames (Client -> Server)
// ---------------------------------------------------------------------------

/// Fehler beim Lesen eines eingehenden Frames
#[derive(Debug, Error)]
pub enum FrameFehler {
    #[error("Ungueltiges JSON: {0}")]
    UngueltigesJson(String),

    #[error("Signal ohne Payload")]
    FehlendePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ClientFrameTyp {
    FindNext,
    Signal,
    Leave,
}

#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    typ: ClientFrameTyp,
    #[serde(default)]
    payload: Option<SignalPayload>,
}

/// Alle Events die ein Client senden kann
///
/// `connect` und `disconnect` ergeben sich aus dem Socket selbst und haben
/// daher keinen eigenen Frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Aktuellen Partner verlassen und einen neuen suchen
    FindNext,
    /// Payload an den aktuellen Partner weiterleiten
    Signal(SignalPayload),
    /// Sitzung sauber beenden
    Leave,
}

impl ClientEvent {
    /// Liest ein Event aus einem JSON-Textframe
    pub fn from_json(json: &str) -> Result<Self, FrameFehler> {
        let frame: ClientFrame =
            serde_json::from_str(json).map_err(|e| FrameFehler::UngueltigesJson(e.to_string()))?;

        match frame.typ {
            ClientFrameTyp::FindNext => Ok(Self::FindNext),
            ClientFrameTyp::Leave => Ok(Self::Leave),
            ClientFrameTyp::Signal => frame
                .payload
                .map(Self::Signal)
                .ok_or(FrameFehler::FehlendePayload),
        }
    }

    /// Kurzname fuer Logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::FindNext => "find-next",
            Self::Signal(_) => "signal",
            Self::Leave => "leave",
        }
    }
}

// ---------------------------------------------------------------------------
// Ausgehende Events (Server -> Client)
// ---------------------------------------------------------------------------

/// Alle Events die der Server an genau einen Client adressiert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Kein Partner verfuegbar, Client steht in der Warteschlange
    WaitingForPeer { position: Option<usize> },
    /// Partner gefunden; `is_initiator` bestimmt wer das Offer erzeugt
    MatchFound {
        partner_id: ConnectionId,
        is_initiator: bool,
    },
    /// Weitergeleitete Payload des Partners
    Signal { payload: SignalPayload },
    /// Partner hat die Sitzung verlassen
    PeerDisconnected { reason: Option<String> },
    /// Fehlermeldung
    Error(ErrorResponse),
    /// Warteschlangen-Eintrag ist abgelaufen
    QueueExpired { waited_secs: u64 },
}

impl ServerEvent {
    /// Erstellt ein `waiting-for-peer`-Event
    pub fn wartend(position: Option<usize>) -> Self {
        Self::WaitingForPeer { position }
    }

    /// Erstellt ein `match-found`-Event
    pub fn match_gefunden(partner_id: ConnectionId, is_initiator: bool) -> Self {
        Self::MatchFound {
            partner_id,
            is_initiator,
        }
    }

    /// Erstellt ein `peer-disconnected`-Event
    pub fn peer_getrennt(reason: Option<String>) -> Self {
        Self::PeerDisconnected { reason }
    }

    /// Erstellt ein `error`-Event
    pub fn fehler(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorResponse {
            code,
            message: message.into(),
        })
    }

    /// Kurzname fuer Logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::WaitingForPeer { .. } => "waiting-for-peer",
            Self::MatchFound { .. } => "match-found",
            Self::Signal { .. } => "signal",
            Self::PeerDisconnected { .. } => "peer-disconnected",
            Self::Error(_) => "error",
            Self::QueueExpired { .. } => "queue-expired",
        }
    }

    /// Serialisiert das Event als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Fehlertypen fuer das Sitzungsprotokoll

use std::io;
use thiserror::Error;

use crate::state::ServerState;

/// Fehlertyp fuer Envelope, Wire-Format und Transport
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Pflichtattribut fehlt oder hat den falschen Typ
    #[error("Ungueltige Nachricht '{tag}': {grund}")]
    Malformed { tag: String, grund: String },

    /// Kein Nachrichtentyp fuer diesen Tag bekannt
    #[error("Unbekannter Nachrichtentyp: {0}")]
    UnbekannterTag(String),

    /// JSON-(De-)Serialisierung fehlgeschlagen
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame ueberschreitet die konfigurierte Maximalgroesse
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    FrameZuGross { laenge: usize, maximum: usize },

    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    /// Keine Antwort innerhalb der Frist
    #[error("Zeitlimit ueberschritten")]
    Timeout,

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Unzulaessiger Wechsel des Server-Zustands
    #[error("Ungueltiger Zustandsuebergang: {von} -> {nach}")]
    Zustandsuebergang { von: ServerState, nach: ServerState },
}

impl ProtocolError {
    /// Erstellt einen Fehler fuer eine fehlerhafte Nachricht
    pub fn malformed(tag: impl Into<String>, grund: impl Into<String>) -> Self {
        Self::Malformed {
            tag: tag.into(),
            grund: grund.into(),
        }
    }

    /// Gibt true zurueck wenn der Fehler die Verbindung unbrauchbar macht
    pub fn ist_transportfehler(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::VerbindungGetrennt | Self::FrameZuGross { .. }
        )
    }
}

/// Result-Typ fuer das Protokoll-Crate
pub type ProtocolResult<T> = Result<T, ProtocolError>;

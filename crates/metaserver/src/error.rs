//! Fehlertypen fuer den Metaserver

use neuwelt_protocol::ProtocolError;
use thiserror::Error;

/// Fehlertyp fuer Verzeichnis und Front-End
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Der angemeldete Server ist vom Metaserver aus nicht erreichbar
    #[error("Server {adresse}:{port} nicht erreichbar: {quelle}")]
    Unerreichbar {
        adresse: String,
        port: u16,
        #[source]
        quelle: std::io::Error,
    },

    /// IO-Fehler (Listener, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Protokollfehler auf einer Front-End-Verbindung
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    /// Ungueltige Zeitparameter
    #[error("Ungueltige Konfiguration: {0}")]
    Konfiguration(String),
}

impl RegistryError {
    /// Schluessel der Fehlermeldung an den Aufrufer
    pub fn message_id(&self) -> &'static str {
        match self {
            Self::Unerreichbar { .. } => "metaServer.unreachable",
            Self::Protokoll(_) => "metaServer.malformedMessage",
            Self::Io(_) | Self::Konfiguration(_) => "metaServer.internal",
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

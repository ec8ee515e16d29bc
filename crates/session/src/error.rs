//! Fehlertypen fuer die Sitzungsschicht
//!
//! `RuleViolation` sind erwartete Ablehnungen einer Client-Anfrage. Der
//! Dispatcher wandelt sie in eine `error`-Nachricht an den Absender um,
//! die Verbindung bleibt bestehen. Alle uebrigen `SessionError`-Varianten
//! sind fatal fuer die betroffene Verbindung.

use neuwelt_protocol::{ProtocolError, ServerState};
use thiserror::Error;

/// Regelverstoss einer Client-Anfrage
///
/// Jede Variante traegt einen festen Meldungsschluessel (`message_id`),
/// ueber den der Client die lokalisierte Vorlage findet. `Display` liefert
/// den englischen Klartext als Rueckfall.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("Login without a user name")]
    MissingUserName,

    #[error("Login without a version")]
    MissingVersion,

    #[error("Client version '{client}' does not match server version '{server}'")]
    WrongVersion { client: String, server: String },

    #[error("Timed out waiting for the game to become available")]
    TimedOut,

    #[error("The game is full")]
    MaximumPlayers,

    #[error("The name '{0}' is already in use")]
    UserNameInUse(String),

    #[error("No player named '{name}' in this game (players: {})", .vorhanden.join(", "))]
    UserNameNotPresent { name: String, vorhanden: Vec<String> },

    #[error("Map editor games cannot be joined")]
    MapEditorGame,

    #[error("Only the administrator may do this")]
    NotAdmin,

    #[error("It is not your turn")]
    NotCurrentPlayer,

    #[error("Message '{tag}' is not allowed while the server is {state}")]
    BadState { tag: String, state: ServerState },

    #[error("Unsupported message '{0}'")]
    UnsupportedMessage(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

impl RuleViolation {
    /// Schluessel der Meldungsvorlage fuer den Client
    pub fn message_id(&self) -> &'static str {
        match self {
            Self::MissingUserName => "server.missingUserName",
            Self::MissingVersion => "server.missingVersion",
            Self::WrongVersion { .. } => "server.wrongVersion",
            Self::TimedOut => "server.timeOut",
            Self::MaximumPlayers => "server.maximumPlayers",
            Self::UserNameInUse(_) => "server.userNameInUse",
            Self::UserNameNotPresent { .. } => "server.userNameNotPresent",
            Self::MapEditorGame => "error.mapEditorGame",
            Self::NotAdmin => "server.notAdmin",
            Self::NotCurrentPlayer => "server.notCurrentPlayer",
            Self::BadState { .. } => "server.badState",
            Self::UnsupportedMessage(_) => "server.unsupportedMessage",
            Self::MalformedMessage(_) => "server.malformedMessage",
        }
    }
}

/// Fehlertyp der Sitzungsschicht
#[derive(Debug, Error)]
pub enum SessionError {
    /// Erwartete Ablehnung, wird dem Absender gemeldet
    #[error("Regelverstoss: {0}")]
    Regel(#[from] RuleViolation),

    /// Protokoll- oder Transportfehler
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Unzulaessiger Zustandswechsel des Servers
    #[error("Unzulaessiger Zustandswechsel {von} -> {nach}")]
    Zustand { von: ServerState, nach: ServerState },

    /// Interner Fehler, z.B. fehlendes Spiel mitten in einem Handler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SessionError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt den Regelverstoss zurueck, falls es einer ist
    pub fn als_regelverstoss(&self) -> Option<&RuleViolation> {
        match self {
            Self::Regel(v) => Some(v),
            _ => None,
        }
    }
}

/// Result-Typ der Sitzungsschicht
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meldungsschluessel() {
        assert_eq!(RuleViolation::MissingUserName.message_id(), "server.missingUserName");
        assert_eq!(
            RuleViolation::UserNameInUse("Alice".into()).message_id(),
            "server.userNameInUse"
        );
        assert_eq!(RuleViolation::MapEditorGame.message_id(), "error.mapEditorGame");
        assert_eq!(RuleViolation::TimedOut.message_id(), "server.timeOut");
    }

    #[test]
    fn name_nicht_vorhanden_zaehlt_spieler_auf() {
        let v = RuleViolation::UserNameNotPresent {
            name: "Zed".into(),
            vorhanden: vec!["Alice".into(), "Bob".into()],
        };
        let text = v.to_string();
        assert!(text.contains("Zed"));
        assert!(text.contains("Alice, Bob"));
    }

    #[test]
    fn regelverstoss_ist_erkennbar() {
        let e: SessionError = RuleViolation::NotAdmin.into();
        assert_eq!(e.als_regelverstoss(), Some(&RuleViolation::NotAdmin));
        assert!(SessionError::intern("kaputt").als_regelverstoss().is_none());
    }
}

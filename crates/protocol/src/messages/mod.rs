//! Typisierte Nachrichten
//!
//! Jeder Nachrichtentyp besitzt ein festes Attribut-/Kinder-Schema und
//! implementiert `TypedMessage`. `Message` ist der geschlossene Summentyp
//! ueber alle Typen dieser Protokollversion, unterschieden am Tag.
//!
//! Zusaetzlich deklariert jeder Client->Server-Typ in `MESSAGE_SPECS`, in
//! welchen Server-Zustaenden er verarbeitet werden darf und was ausserhalb
//! dieser Zustaende passiert.

pub mod directory;
pub mod game;
pub mod session;

use crate::envelope::Envelope;
use crate::error::{ProtocolError, ProtocolResult};
use crate::state::ServerState;

pub use directory::{
    OkMessage, RegisterServerMessage, RemoveServerMessage, ServerDescription, ServerListMessage,
    ServerListing, UpdateServerMessage,
};
pub use game::{
    AddPlayerMessage, EndTurnMessage, ErrorMessage, GameEndedMessage, PlayerSummary,
    RequestLaunchMessage, SetAiMessage, SetCurrentPlayerMessage, StartGameMessage,
};
pub use session::{LoginMessage, LogoutMessage, LogoutReason};

// ---------------------------------------------------------------------------
// TypedMessage
// ---------------------------------------------------------------------------

/// Gemeinsame Schnittstelle aller konkreten Nachrichtentypen
pub trait TypedMessage: Sized {
    /// Tag auf der Leitung
    const TAG: &'static str;

    /// Baut die Nachricht aus einem Envelope; fehlende oder falsch
    /// typisierte Pflichtattribute sind ein `Malformed`-Fehler
    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self>;

    fn to_envelope(&self) -> Envelope;
}

// ---------------------------------------------------------------------------
// Zustandsregeln
// ---------------------------------------------------------------------------

/// Verhalten, wenn eine Nachricht ausserhalb ihrer Zustaende eintrifft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalPolicy {
    /// Mit einer Fehlermeldung an den Absender ablehnen
    Refuse,
    /// Stillschweigend verwerfen
    Ignore,
}

/// Statische Zustandsregel eines Nachrichtentyps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpec {
    pub tag: &'static str,
    pub legal_states: &'static [ServerState],
    pub when_illegal: IllegalPolicy,
}

impl MessageSpec {
    pub fn is_legal_in(&self, state: ServerState) -> bool {
        self.legal_states.contains(&state)
    }
}

/// Zustandsregeln aller Nachrichten, die ein Spielserver annimmt
pub const MESSAGE_SPECS: &[MessageSpec] = &[
    MessageSpec {
        tag: LoginMessage::TAG,
        legal_states: &[ServerState::Assembling, ServerState::Active],
        when_illegal: IllegalPolicy::Refuse,
    },
    MessageSpec {
        tag: LogoutMessage::TAG,
        legal_states: &[ServerState::Assembling, ServerState::Active],
        when_illegal: IllegalPolicy::Ignore,
    },
    MessageSpec {
        tag: RequestLaunchMessage::TAG,
        legal_states: &[ServerState::Assembling],
        when_illegal: IllegalPolicy::Refuse,
    },
    MessageSpec {
        tag: EndTurnMessage::TAG,
        legal_states: &[ServerState::Active],
        when_illegal: IllegalPolicy::Refuse,
    },
];

/// Sucht die Zustandsregel fuer einen Tag
pub fn message_spec(tag: &str) -> Option<&'static MessageSpec> {
    MESSAGE_SPECS.iter().find(|s| s.tag == tag)
}

// ---------------------------------------------------------------------------
// Message (Summentyp)
// ---------------------------------------------------------------------------

/// Alle Nachrichten dieser Protokollversion
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Login(LoginMessage),
    Logout(LogoutMessage),
    Error(ErrorMessage),
    AddPlayer(AddPlayerMessage),
    SetAi(SetAiMessage),
    SetCurrentPlayer(SetCurrentPlayerMessage),
    RequestLaunch(RequestLaunchMessage),
    StartGame(StartGameMessage),
    EndTurn(EndTurnMessage),
    GameEnded(GameEndedMessage),
    Register(RegisterServerMessage),
    Update(UpdateServerMessage),
    Remove(RemoveServerMessage),
    ServerList(ServerListMessage),
    Ok(OkMessage),
}

impl Message {
    /// Dekodiert einen Envelope anhand seines Tags
    pub fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        Ok(match envelope.tag() {
            LoginMessage::TAG => Self::Login(LoginMessage::from_envelope(envelope)?),
            LogoutMessage::TAG => Self::Logout(LogoutMessage::from_envelope(envelope)?),
            ErrorMessage::TAG => Self::Error(ErrorMessage::from_envelope(envelope)?),
            AddPlayerMessage::TAG => Self::AddPlayer(AddPlayerMessage::from_envelope(envelope)?),
            SetAiMessage::TAG => Self::SetAi(SetAiMessage::from_envelope(envelope)?),
            SetCurrentPlayerMessage::TAG => {
                Self::SetCurrentPlayer(SetCurrentPlayerMessage::from_envelope(envelope)?)
            }
            RequestLaunchMessage::TAG => {
                Self::RequestLaunch(RequestLaunchMessage::from_envelope(envelope)?)
            }
            StartGameMessage::TAG => Self::StartGame(StartGameMessage::from_envelope(envelope)?),
            EndTurnMessage::TAG => Self::EndTurn(EndTurnMessage::from_envelope(envelope)?),
            GameEndedMessage::TAG => Self::GameEnded(GameEndedMessage::from_envelope(envelope)?),
            RegisterServerMessage::TAG => {
                Self::Register(RegisterServerMessage::from_envelope(envelope)?)
            }
            UpdateServerMessage::TAG => Self::Update(UpdateServerMessage::from_envelope(envelope)?),
            RemoveServerMessage::TAG => Self::Remove(RemoveServerMessage::from_envelope(envelope)?),
            ServerListMessage::TAG => {
                Self::ServerList(ServerListMessage::from_envelope(envelope)?)
            }
            OkMessage::TAG => Self::Ok(OkMessage::from_envelope(envelope)?),
            unbekannt => return Err(ProtocolError::UnbekannterTag(unbekannt.to_string())),
        })
    }

    pub fn to_envelope(&self) -> Envelope {
        match self {
            Self::Login(m) => m.to_envelope(),
            Self::Logout(m) => m.to_envelope(),
            Self::Error(m) => m.to_envelope(),
            Self::AddPlayer(m) => m.to_envelope(),
            Self::SetAi(m) => m.to_envelope(),
            Self::SetCurrentPlayer(m) => m.to_envelope(),
            Self::RequestLaunch(m) => m.to_envelope(),
            Self::StartGame(m) => m.to_envelope(),
            Self::EndTurn(m) => m.to_envelope(),
            Self::GameEnded(m) => m.to_envelope(),
            Self::Register(m) => m.to_envelope(),
            Self::Update(m) => m.to_envelope(),
            Self::Remove(m) => m.to_envelope(),
            Self::ServerList(m) => m.to_envelope(),
            Self::Ok(m) => m.to_envelope(),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Login(_) => LoginMessage::TAG,
            Self::Logout(_) => LogoutMessage::TAG,
            Self::Error(_) => ErrorMessage::TAG,
            Self::AddPlayer(_) => AddPlayerMessage::TAG,
            Self::SetAi(_) => SetAiMessage::TAG,
            Self::SetCurrentPlayer(_) => SetCurrentPlayerMessage::TAG,
            Self::RequestLaunch(_) => RequestLaunchMessage::TAG,
            Self::StartGame(_) => StartGameMessage::TAG,
            Self::EndTurn(_) => EndTurnMessage::TAG,
            Self::GameEnded(_) => GameEndedMessage::TAG,
            Self::Register(_) => RegisterServerMessage::TAG,
            Self::Update(_) => UpdateServerMessage::TAG,
            Self::Remove(_) => RemoveServerMessage::TAG,
            Self::ServerList(_) => ServerListMessage::TAG,
            Self::Ok(_) => OkMessage::TAG,
        }
    }

    /// Zustandsregel dieser Nachricht (nur fuer Client->Server-Typen)
    pub fn spec(&self) -> Option<&'static MessageSpec> {
        message_spec(self.tag())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

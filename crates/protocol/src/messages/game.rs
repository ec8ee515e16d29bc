//! Spiel-Nachrichten – Fehler, Spieler-Deltas, Zugwechsel, Spielende

use neuwelt_core::{NationId, PlayerId};

use super::TypedMessage;
use crate::envelope::Envelope;
use crate::error::{ProtocolError, ProtocolResult};

const PLAYER: &str = "player";

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehlermeldung an einen einzelnen Client
///
/// `message_id` ist der Schluessel der Meldungsvorlage im Katalog des
/// Clients, `message` ein englischer Klartext als Rueckfall.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub message_id: String,
    pub message: Option<String>,
}

impl ErrorMessage {
    pub fn new(message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            message: Some(message.into()),
        }
    }
}

impl TypedMessage for ErrorMessage {
    const TAG: &'static str = "error";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            message_id: envelope.require("messageId")?.to_string(),
            message: envelope.attribute("message").map(str::to_string),
        })
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG)
            .with_attribute("messageId", &self.message_id)
            .with_optional_attribute("message", self.message.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Spieler
// ---------------------------------------------------------------------------

/// Oeffentliche Sicht auf einen Teilnehmer
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub nation: Option<NationId>,
    pub ai: bool,
    pub admin: bool,
    pub connected: bool,
}

impl PlayerSummary {
    pub const TAG: &'static str = "player";

    pub fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            id: envelope.require_parsed("id")?,
            name: envelope.require("userName")?.to_string(),
            nation: envelope.attribute("nation").map(NationId::new),
            ai: envelope.bool_or("ai", false)?,
            admin: envelope.bool_or("admin", false)?,
            connected: envelope.bool_or("connected", false)?,
        })
    }

    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG)
            .with_attribute("id", self.id)
            .with_attribute("userName", &self.name)
            .with_optional_attribute("nation", self.nation.as_ref())
            .with_attribute("ai", self.ai)
            .with_attribute("admin", self.admin)
            .with_attribute("connected", self.connected)
    }
}

/// Ein neuer Teilnehmer ist der Partie beigetreten
#[derive(Debug, Clone, PartialEq)]
pub struct AddPlayerMessage {
    pub player: PlayerSummary,
}

impl TypedMessage for AddPlayerMessage {
    const TAG: &'static str = "addPlayer";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        let kind = envelope
            .child_envelopes(PlayerSummary::TAG)
            .next()
            .ok_or_else(|| ProtocolError::malformed(Self::TAG, "Kind 'player' fehlt"))?;
        Ok(Self {
            player: PlayerSummary::from_envelope(kind)?,
        })
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG).with_child(self.player.to_envelope())
    }
}

/// Wechsel zwischen KI- und menschlicher Steuerung
#[derive(Debug, Clone, PartialEq)]
pub struct SetAiMessage {
    pub player: PlayerId,
    pub ai: bool,
}

impl TypedMessage for SetAiMessage {
    const TAG: &'static str = "setAI";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            player: envelope.require_parsed(PLAYER)?,
            ai: envelope.require_bool("ai")?,
        })
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG)
            .with_attribute(PLAYER, self.player)
            .with_attribute("ai", self.ai)
    }
}

/// Der Zug geht an einen anderen Spieler
#[derive(Debug, Clone, PartialEq)]
pub struct SetCurrentPlayerMessage {
    pub player: PlayerId,
}

impl TypedMessage for SetCurrentPlayerMessage {
    const TAG: &'static str = "setCurrentPlayer";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            player: envelope.require_parsed(PLAYER)?,
        })
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG).with_attribute(PLAYER, self.player)
    }
}

// ---------------------------------------------------------------------------
// Spielablauf
// ---------------------------------------------------------------------------

/// Admin startet die zusammengestellte Partie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestLaunchMessage;

impl TypedMessage for RequestLaunchMessage {
    const TAG: &'static str = "requestLaunch";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self)
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG)
    }
}

/// Die Partie wurde gestartet; traegt den Spielstand als Objekt-Kind
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StartGameMessage {
    pub game: Option<serde_json::Value>,
}

impl TypedMessage for StartGameMessage {
    const TAG: &'static str = "startGame";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            game: envelope.first_object().cloned(),
        })
    }

    fn to_envelope(&self) -> Envelope {
        match &self.game {
            Some(game) => Envelope::new(Self::TAG).with_object(game.clone()),
            None => Envelope::new(Self::TAG),
        }
    }
}

/// Der aktuelle Spieler beendet seinen Zug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndTurnMessage;

impl TypedMessage for EndTurnMessage {
    const TAG: &'static str = "endTurn";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self)
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG)
    }
}

/// Die Partie ist beendet
#[derive(Debug, Clone, PartialEq)]
pub struct GameEndedMessage {
    pub winner: Option<PlayerId>,
}

impl TypedMessage for GameEndedMessage {
    const TAG: &'static str = "gameEnded";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            winner: envelope.optional_parsed("winner")?,
        })
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG).with_optional_attribute("winner", self.winner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

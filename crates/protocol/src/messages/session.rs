//! Sitzungs-Nachrichten – Login und Logout

use neuwelt_core::PlayerId;
use std::fmt;
use std::str::FromStr;

use super::TypedMessage;
use crate::envelope::Envelope;
use crate::error::ProtocolResult;

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

const USER_NAME: &str = "userName";
const VERSION: &str = "version";
const START_GAME: &str = "startGame";
const SINGLE_PLAYER: &str = "singlePlayer";
const CURRENT_PLAYER: &str = "currentPlayer";

/// Beitritts-Anfrage des Clients bzw. Bestaetigung des Servers
///
/// `current_player` und `game` sind nur in der Antwort belegt. Fehlende
/// Flags nehmen die Standardwerte an: `startGame=false`,
/// `singlePlayer=true`, `currentPlayer=false`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginMessage {
    pub user_name: String,
    pub version: String,
    pub start_game: bool,
    pub single_player: bool,
    pub current_player: bool,
    /// Vollstaendiger Spielstand (nur in der Antwort)
    pub game: Option<serde_json::Value>,
}

impl LoginMessage {
    /// Einfache Beitritts-Anfrage
    pub fn request(user_name: impl Into<String>, version: impl Into<String>, start_game: bool) -> Self {
        Self {
            user_name: user_name.into(),
            version: version.into(),
            start_game,
            single_player: false,
            current_player: false,
            game: None,
        }
    }
}

impl TypedMessage for LoginMessage {
    const TAG: &'static str = "login";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            user_name: envelope.require(USER_NAME)?.to_string(),
            version: envelope.require(VERSION)?.to_string(),
            start_game: envelope.bool_or(START_GAME, false)?,
            single_player: envelope.bool_or(SINGLE_PLAYER, true)?,
            current_player: envelope.bool_or(CURRENT_PLAYER, false)?,
            game: envelope.first_object().cloned(),
        })
    }

    fn to_envelope(&self) -> Envelope {
        let env = Envelope::new(Self::TAG)
            .with_attribute(USER_NAME, &self.user_name)
            .with_attribute(VERSION, &self.version)
            .with_attribute(START_GAME, self.start_game)
            .with_attribute(SINGLE_PLAYER, self.single_player)
            .with_attribute(CURRENT_PLAYER, self.current_player);
        match &self.game {
            Some(game) => env.with_object(game.clone()),
            None => env,
        }
    }
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

/// Grund fuer das Verlassen einer Partie
///
/// Wird nur protokolliert, nicht lokalisiert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogoutReason {
    /// Spieler beendet bewusst
    Quit,
    /// Transportverbindung verloren
    Disconnected,
    /// Vom Admin entfernt
    Kicked,
    /// Im Spiel besiegt
    Defeated,
    /// Client verbindet sich neu
    Reconnect,
    /// Client startet eine neue Partie
    NewGame,
    /// Client kehrt ins Hauptmenue zurueck
    MainTitle,
}

impl LogoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quit => "QUIT",
            Self::Disconnected => "DISCONNECTED",
            Self::Kicked => "KICKED",
            Self::Defeated => "DEFEATED",
            Self::Reconnect => "RECONNECT",
            Self::NewGame => "NEW_GAME",
            Self::MainTitle => "MAIN_TITLE",
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogoutReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "QUIT" => Self::Quit,
            "DISCONNECTED" => Self::Disconnected,
            "KICKED" => Self::Kicked,
            "DEFEATED" => Self::Defeated,
            "RECONNECT" => Self::Reconnect,
            "NEW_GAME" => Self::NewGame,
            "MAIN_TITLE" => Self::MainTitle,
            anderes => return Err(format!("unbekannter Logout-Grund '{}'", anderes)),
        })
    }
}

const PLAYER: &str = "player";
const REASON: &str = "reason";

/// Abmeldung eines Spielers
#[derive(Debug, Clone, PartialEq)]
pub struct LogoutMessage {
    pub player: PlayerId,
    pub reason: LogoutReason,
}

impl LogoutMessage {
    pub fn new(player: PlayerId, reason: LogoutReason) -> Self {
        Self { player, reason }
    }
}

impl TypedMessage for LogoutMessage {
    const TAG: &'static str = "logout";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            player: envelope.require_parsed(PLAYER)?,
            reason: envelope.require_parsed(REASON)?,
        })
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG)
            .with_attribute(PLAYER, self.player)
            .with_attribute(REASON, self.reason)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

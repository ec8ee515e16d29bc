//! Metaserver-Nachrichten – Anmelden, Aktualisieren, Entfernen, Auflisten

use super::TypedMessage;
use crate::envelope::Envelope;
use crate::error::ProtocolResult;

const NAME: &str = "name";
const ADDRESS: &str = "address";
const PORT: &str = "port";
const SLOTS_AVAILABLE: &str = "slotsAvailable";
const CURRENTLY_PLAYING: &str = "currentlyPlaying";
const IS_GAME_STARTED: &str = "isGameStarted";
const VERSION: &str = "version";
const GAME_STATE: &str = "gameState";
const LAST_UPDATED: &str = "lastUpdated";

/// Beschreibung eines laufenden Spielservers, wie er sich anmeldet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescription {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub slots_available: u32,
    pub currently_playing: u32,
    pub is_game_started: bool,
    pub version: String,
    /// Grober Zustandscode (siehe `ServerState::code`)
    pub game_state: i32,
}

impl ServerDescription {
    fn read(envelope: &Envelope) -> ProtocolResult<Self> {
        Ok(Self {
            name: envelope.require(NAME)?.to_string(),
            address: envelope.require(ADDRESS)?.to_string(),
            port: envelope.require_parsed(PORT)?,
            slots_available: envelope.require_parsed(SLOTS_AVAILABLE)?,
            currently_playing: envelope.require_parsed(CURRENTLY_PLAYING)?,
            is_game_started: envelope.require_bool(IS_GAME_STARTED)?,
            version: envelope.require(VERSION)?.to_string(),
            game_state: envelope.require_parsed(GAME_STATE)?,
        })
    }

    fn write(&self, tag: &str) -> Envelope {
        Envelope::new(tag)
            .with_attribute(NAME, &self.name)
            .with_attribute(ADDRESS, &self.address)
            .with_attribute(PORT, self.port)
            .with_attribute(SLOTS_AVAILABLE, self.slots_available)
            .with_attribute(CURRENTLY_PLAYING, self.currently_playing)
            .with_attribute(IS_GAME_STARTED, self.is_game_started)
            .with_attribute(VERSION, &self.version)
            .with_attribute(GAME_STATE, self.game_state)
    }
}

/// Erstanmeldung eines Spielservers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterServerMessage(pub ServerDescription);

impl TypedMessage for RegisterServerMessage {
    const TAG: &'static str = "register";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        ServerDescription::read(envelope).map(Self)
    }

    fn to_envelope(&self) -> Envelope {
        self.0.write(Self::TAG)
    }
}

/// Aktualisierung eines (ggf. noch unbekannten) Spielservers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateServerMessage(pub ServerDescription);

impl TypedMessage for UpdateServerMessage {
    const TAG: &'static str = "update";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        ServerDescription::read(envelope).map(Self)
    }

    fn to_envelope(&self) -> Envelope {
        self.0.write(Self::TAG)
    }
}

/// Abmeldung eines Spielservers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveServerMessage {
    pub address: String,
    pub port: u16,
}

impl TypedMessage for RemoveServerMessage {
    const TAG: &'static str = "remove";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            address: envelope.require(ADDRESS)?.to_string(),
            port: envelope.require_parsed(PORT)?,
        })
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG)
            .with_attribute(ADDRESS, &self.address)
            .with_attribute(PORT, self.port)
    }
}

/// Ein Eintrag der Serverliste
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerListing {
    pub description: ServerDescription,
    /// Zeitpunkt der letzten Aktualisierung (Unix-Millisekunden)
    pub last_updated_ms: i64,
}

impl ServerListing {
    pub const TAG: &'static str = "serverInfo";

    pub fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self {
            description: ServerDescription::read(envelope)?,
            last_updated_ms: envelope.require_parsed(LAST_UPDATED)?,
        })
    }

    pub fn to_envelope(&self) -> Envelope {
        self.description
            .write(Self::TAG)
            .with_attribute(LAST_UPDATED, self.last_updated_ms)
    }
}

/// Anfrage (ohne Kinder) bzw. Antwort (mit `serverInfo`-Kindern)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerListMessage {
    pub servers: Vec<ServerListing>,
}

impl TypedMessage for ServerListMessage {
    const TAG: &'static str = "serverList";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        let servers = envelope
            .child_envelopes(ServerListing::TAG)
            .map(ServerListing::from_envelope)
            .collect::<ProtocolResult<Vec<_>>>()?;
        Ok(Self { servers })
    }

    fn to_envelope(&self) -> Envelope {
        self.servers
            .iter()
            .fold(Envelope::new(Self::TAG), |env, s| env.with_child(s.to_envelope()))
    }
}

/// Bestaetigung des Metaservers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OkMessage;

impl TypedMessage for OkMessage {
    const TAG: &'static str = "ok";

    fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        envelope.expect_tag(Self::TAG)?;
        Ok(Self)
    }

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::TAG)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn beschreibung() -> ServerDescription {
        ServerDescription {
            name: "Karibik".into(),
            address: "10.0.0.5".into(),
            port: 3541,
            slots_available: 4,
            currently_playing: 2,
            is_game_started: false,
            version: "0.1.0".into(),
            game_state: 0,
        }
    }

    #[test]
    fn register_und_update_round_trip() {
        let reg = RegisterServerMessage(beschreibung());
        assert_eq!(RegisterServerMessage::from_envelope(&reg.to_envelope()).unwrap(), reg);

        let upd = UpdateServerMessage(beschreibung());
        assert_eq!(UpdateServerMessage::from_envelope(&upd.to_envelope()).unwrap(), upd);
    }

    #[test]
    fn grenzwerte_round_trip() {
        let mut d = beschreibung();
        d.name = String::new();
        d.port = u16::MAX;
        d.slots_available = u32::MAX;
        d.currently_playing = u32::MAX;
        d.game_state = i32::MIN;
        let msg = UpdateServerMessage(d);
        assert_eq!(UpdateServerMessage::from_envelope(&msg.to_envelope()).unwrap(), msg);
    }

    #[test]
    fn tags_nicht_austauschbar() {
        let env = RegisterServerMessage(beschreibung()).to_envelope();
        assert!(UpdateServerMessage::from_envelope(&env).is_err());
    }

    #[test]
    fn port_ausserhalb_des_bereichs() {
        let env = RegisterServerMessage(beschreibung())
            .to_envelope()
            .with_attribute("port", 70000);
        assert!(RegisterServerMessage::from_envelope(&env).is_err());
    }

    #[test]
    fn serverliste_round_trip() {
        let msg = ServerListMessage {
            servers: vec![
                ServerListing {
                    description: beschreibung(),
                    last_updated_ms: 1_700_000_000_000,
                },
                ServerListing {
                    description: ServerDescription {
                        port: 4000,
                        ..beschreibung()
                    },
                    last_updated_ms: 0,
                },
            ],
        };
        assert_eq!(ServerListMessage::from_envelope(&msg.to_envelope()).unwrap(), msg);
    }

    #[test]
    fn leere_serverliste_ist_anfrage() {
        let env = ServerListMessage::default().to_envelope();
        assert!(env.children().is_empty());
        assert!(ServerListMessage::from_envelope(&env).unwrap().servers.is_empty());
    }

    #[test]
    fn remove_round_trip() {
        let msg = RemoveServerMessage {
            address: "10.0.0.5".into(),
            port: 3541,
        };
        assert_eq!(RemoveServerMessage::from_envelope(&msg.to_envelope()).unwrap(), msg);
    }
}

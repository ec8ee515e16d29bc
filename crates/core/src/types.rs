//! Gemeinsame Identifikationstypen fuer Neuwelt
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Die Textform
//! (`Display`/`FromStr`) ist die Form, die im Wire-Envelope als Attribut
//! uebertragen wird.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

const PLAYER_PRAEFIX: &str = "player:";

/// Eindeutige Spieler-ID (stabil ueber Reconnects hinweg)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Erstellt eine neue zufaellige PlayerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PLAYER_PRAEFIX, self.0)
    }
}

impl FromStr for PlayerId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let roh = s
            .strip_prefix(PLAYER_PRAEFIX)
            .ok_or_else(|| CoreError::ungueltige_id(s, "player:<uuid>"))?;
        Uuid::parse_str(roh)
            .map(Self)
            .map_err(|_| CoreError::ungueltige_id(s, "player:<uuid>"))
    }
}

/// Nation, die ein Spieler in einer Partie steuert (z.B. "dutch")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NationId(pub String);

impl NationId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prozesslokale ID einer akzeptierten Verbindung
///
/// Wird vom Server beim Accept vergeben und nie ueber das Netz gesendet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_eindeutig() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        assert_ne!(a, b, "Zwei neue PlayerIds muessen verschieden sein");
    }

    #[test]
    fn player_id_textform_round_trip() {
        let id = PlayerId::new();
        let text = id.to_string();
        assert!(text.starts_with("player:"));
        let zurueck: PlayerId = text.parse().unwrap();
        assert_eq!(id, zurueck);
    }

    #[test]
    fn player_id_ohne_praefix_abgelehnt() {
        let roh = Uuid::nil().to_string();
        assert!(roh.parse::<PlayerId>().is_err());
        assert!("player:kein-uuid".parse::<PlayerId>().is_err());
    }

    #[test]
    fn nation_id_display() {
        assert_eq!(NationId::new("dutch").to_string(), "dutch");
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let pid = PlayerId::new();
        let json = serde_json::to_string(&pid).unwrap();
        let pid2: PlayerId = serde_json::from_str(&json).unwrap();
        assert_eq!(pid, pid2);
    }
}

//! Lebenszyklus eines Spielservers
//!
//! Zustandsuebergaenge:
//! ```text
//! ASSEMBLING ──> ACTIVE ──> ENDED
//!     │                       ^
//!     └───────────────────────┘
//! ```
//! Uebergaenge laufen nur vorwaerts. Ein geladener Spielstand startet
//! direkt in `ACTIVE`. `ENDED` ist terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProtocolError, ProtocolResult};

/// Zustand des Spielservers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerState {
    /// Partie wird zusammengestellt (Lobby / Laden)
    #[default]
    Assembling,
    /// Partie laeuft
    Active,
    /// Partie beendet
    Ended,
}

impl ServerState {
    /// Alle Zustaende in Lebenszyklus-Reihenfolge
    pub const ALLE: [ServerState; 3] = [Self::Assembling, Self::Active, Self::Ended];

    /// Grober Zustandscode fuer die Metaserver-Anzeige
    pub fn code(&self) -> i32 {
        match self {
            Self::Assembling => 0,
            Self::Active => 1,
            Self::Ended => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALLE.into_iter().find(|s| s.code() == code)
    }

    /// Prueft einen Zustandsuebergang
    pub fn can_transition_to(&self, next: ServerState) -> bool {
        use ServerState::*;

        matches!(
            (self, next),
            (Assembling, Active) | (Assembling, Ended) | (Active, Ended)
        )
    }

    /// Fuehrt einen Zustandsuebergang durch
    ///
    /// Bei ungueltigem Uebergang bleibt der Zustand unveraendert.
    pub fn transition_to(&mut self, next: ServerState) -> ProtocolResult<()> {
        if self.can_transition_to(next) {
            *self = next;
            Ok(())
        } else {
            Err(ProtocolError::Zustandsuebergang {
                von: *self,
                nach: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::Ended
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assembling => "ASSEMBLING",
            Self::Active => "ACTIVE",
            Self::Ended => "ENDED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gueltige_uebergaenge() {
        let mut s = ServerState::default();
        assert_eq!(s, ServerState::Assembling);
        s.transition_to(ServerState::Active).unwrap();
        s.transition_to(ServerState::Ended).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn keine_rueckwaertsuebergaenge() {
        let mut s = ServerState::Active;
        assert!(s.transition_to(ServerState::Assembling).is_err());
        assert_eq!(s, ServerState::Active);

        let mut s = ServerState::Ended;
        for ziel in ServerState::ALLE {
            assert!(s.transition_to(ziel).is_err());
        }
        assert_eq!(s, ServerState::Ended);
    }

    #[test]
    fn gleicher_zustand_ist_kein_uebergang() {
        assert!(!ServerState::Active.can_transition_to(ServerState::Active));
    }

    #[test]
    fn zustandscodes() {
        for s in ServerState::ALLE {
            assert_eq!(ServerState::from_code(s.code()), Some(s));
        }
        assert_eq!(ServerState::from_code(7), None);
        assert_eq!(ServerState::Ended.to_string(), "ENDED");
    }
}

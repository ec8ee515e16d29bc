//! Aenderungsmengen – Ergebnis einer Nachrichtenverarbeitung
//!
//! Ein Handler mutiert den Spielzustand und sammelt die daraus folgenden
//! Nachrichten in einem `ChangeSet`. Jede Aenderung traegt eine Sichtbarkeit
//! (wer sie bekommt) und eine Prioritaet (kleiner = frueher). Beim Ausliefern
//! werden die fuer eine Verbindung sichtbaren Aenderungen stabil nach
//! Prioritaet sortiert; gleiche Prioritaeten behalten ihre Einfuegereihenfolge.

use neuwelt_core::{ConnectionId, PlayerId};
use neuwelt_protocol::messages::{ErrorMessage, TypedMessage};
use neuwelt_protocol::Envelope;
use std::fmt;
use std::sync::Arc;

use crate::error::RuleViolation;
use crate::player::ServerPlayer;

// ---------------------------------------------------------------------------
// Prioritaet
// ---------------------------------------------------------------------------

/// Auslieferungsprioritaet einer Aenderung (kleiner = frueher)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    /// Kampfergebnisse vor allem anderen
    pub const ATTACK: Self = Self(0);
    pub const EARLY: Self = Self(10);
    pub const NORMAL: Self = Self(20);
    /// Besitzwechsel nach den normalen Aenderungen
    pub const OWNED: Self = Self(30);
    pub const LATE: Self = Self(40);
    /// Sammel-Updates ganz am Ende
    pub const UPDATE: Self = Self(50);
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

// ---------------------------------------------------------------------------
// Sichtbarkeit
// ---------------------------------------------------------------------------

/// Benannter Empfaenger einer Aenderung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Die Verbindung, an die der Spieler gerade gebunden ist
    Player(PlayerId),
    /// Eine bestimmte Verbindung, auch vor dem Login
    Connection(ConnectionId),
}

/// Praedikat fuer `See::Matching`
pub type SeePredicate = Arc<dyn Fn(&ServerPlayer) -> bool + Send + Sync>;

/// Wer eine Aenderung sieht
#[derive(Clone)]
pub enum See {
    Only(Recipient),
    /// Alle verbundenen Spieler
    All,
    /// Alle verbundenen Spieler ausser einem
    AllBut(PlayerId),
    /// Alle verbundenen Spieler, fuer die das Praedikat gilt
    Matching(SeePredicate),
}

impl See {
    pub fn only(player: PlayerId) -> Self {
        Self::Only(Recipient::Player(player))
    }

    pub fn connection(connection: ConnectionId) -> Self {
        Self::Only(Recipient::Connection(connection))
    }

    pub fn matching(praedikat: impl Fn(&ServerPlayer) -> bool + Send + Sync + 'static) -> Self {
        Self::Matching(Arc::new(praedikat))
    }

    /// Prueft, ob eine Verbindung mit optional gebundenem Spieler die
    /// Aenderung sieht
    ///
    /// Verbindungen ohne Spieler sehen nur `Only(Connection(..))`.
    pub fn sieht(&self, connection: ConnectionId, player: Option<&ServerPlayer>) -> bool {
        match self {
            Self::Only(Recipient::Connection(c)) => *c == connection,
            Self::Only(Recipient::Player(id)) => player.is_some_and(|p| p.id == *id),
            Self::All => player.is_some_and(|p| p.connected),
            Self::AllBut(id) => player.is_some_and(|p| p.connected && p.id != *id),
            Self::Matching(praedikat) => player.is_some_and(|p| p.connected && praedikat(p)),
        }
    }
}

impl fmt::Debug for See {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Only(r) => f.debug_tuple("Only").field(r).finish(),
            Self::All => f.write_str("All"),
            Self::AllBut(id) => f.debug_tuple("AllBut").field(id).finish(),
            Self::Matching(_) => f.write_str("Matching(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// Eine einzelne auszuliefernde Aenderung
#[derive(Debug, Clone)]
pub struct Change {
    pub see: See,
    pub priority: Priority,
    pub payload: Envelope,
}

/// Geordnete Sammlung von Aenderungen
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aenderungsmenge mit einer einzigen Nachricht
    pub fn einzeln<M: TypedMessage>(see: See, nachricht: &M) -> Self {
        let mut cs = Self::new();
        cs.add(see, Priority::NORMAL, nachricht);
        cs
    }

    /// Fehlermeldung nur an den Verursacher
    pub fn client_error(recipient: Recipient, verstoss: &RuleViolation) -> Self {
        let fehler = ErrorMessage::new(verstoss.message_id(), verstoss.to_string());
        Self::einzeln(See::Only(recipient), &fehler)
    }

    /// Fuegt eine typisierte Nachricht an
    pub fn add<M: TypedMessage>(&mut self, see: See, priority: Priority, nachricht: &M) -> &mut Self {
        self.add_envelope(see, priority, nachricht.to_envelope())
    }

    /// Fuegt einen fertigen Envelope an
    pub fn add_envelope(&mut self, see: See, priority: Priority, payload: Envelope) -> &mut Self {
        self.changes.push(Change {
            see,
            priority,
            payload,
        });
        self
    }

    /// Haengt alle Aenderungen einer anderen Menge hinten an
    pub fn merge(&mut self, andere: ChangeSet) -> &mut Self {
        self.changes.extend(andere.changes);
        self
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Sichtbare Aenderungen fuer eine Verbindung, stabil nach Prioritaet
    pub fn for_recipient(
        &self,
        connection: ConnectionId,
        player: Option<&ServerPlayer>,
    ) -> Vec<&Envelope> {
        let mut sichtbar: Vec<&Change> = self
            .changes
            .iter()
            .filter(|c| c.see.sieht(connection, player))
            .collect();
        // sort_by_key ist stabil
        sichtbar.sort_by_key(|c| c.priority);
        sichtbar.into_iter().map(|c| &c.payload).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Spielzustand und Spielregeln
//!
//! `Game` haelt nur, was die Sitzungsschicht braucht: Nationen, Teilnehmer
//! in Beitrittsreihenfolge, den aktuellen Spieler und die Zugnummer. Die
//! eigentlichen Spielregeln stecken hinter dem `GameRules`-Trait.

use neuwelt_core::{NationId, PlayerId};
use neuwelt_protocol::messages::SetCurrentPlayerMessage;
use serde_json::json;

use crate::change::{ChangeSet, Priority, See};
use crate::player::ServerPlayer;

/// Reservierter Spielername des Karteneditors
pub const MAP_EDITOR_NAME: &str = "mapEditor";

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    nations: Vec<NationId>,
    players: Vec<ServerPlayer>,
    current_player: Option<PlayerId>,
    turn: u32,
}

impl Game {
    /// Neue, leere Partie mit den spielbaren Nationen
    pub fn neu(nations: impl IntoIterator<Item = NationId>) -> Self {
        Self {
            nations: nations.into_iter().collect(),
            players: Vec::new(),
            current_player: None,
            turn: 1,
        }
    }

    pub fn nations(&self) -> &[NationId] {
        &self.nations
    }

    pub fn players(&self) -> &[ServerPlayer] {
        &self.players
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.current_player
    }

    pub fn set_current_player(&mut self, player: Option<PlayerId>) {
        self.current_player = player;
    }

    /// Erhoeht die Zugnummer und gibt die neue zurueck
    pub fn naechster_zug(&mut self) -> u32 {
        self.turn = self.turn.saturating_add(1);
        self.turn
    }

    /// Erste konfigurierte Nation ohne Spieler
    pub fn vacant_nation(&self) -> Option<NationId> {
        self.nations
            .iter()
            .find(|n| !self.players.iter().any(|p| p.nation.as_ref() == Some(*n)))
            .cloned()
    }

    /// Anzahl der noch freien Nationen
    pub fn freie_plaetze(&self) -> usize {
        self.nations
            .iter()
            .filter(|n| !self.players.iter().any(|p| p.nation.as_ref() == Some(*n)))
            .count()
    }

    /// Ein Name gilt als belegt, wenn ein verbundener menschlicher Spieler
    /// ihn traegt
    pub fn player_name_in_use(&self, name: &str) -> bool {
        self.players
            .iter()
            .any(|p| p.name == name && p.ist_aktiver_mensch())
    }

    /// Namen aller Spieler der Partie, KI-gesteuerte eingeschlossen
    ///
    /// Ein KI-Spieler kann per Wiederbeitritt uebernommen werden und
    /// gehoert deshalb in die Aufzaehlung.
    pub fn live_player_names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    /// Gibt es bereits einen menschlichen Spieler?
    pub fn hat_menschen(&self) -> bool {
        self.players.iter().any(|p| !p.ai)
    }

    /// Anzahl der verbundenen menschlichen Spieler
    pub fn aktive_menschen(&self) -> usize {
        self.players.iter().filter(|p| p.ist_aktiver_mensch()).count()
    }

    pub fn add_player(&mut self, player: ServerPlayer) {
        self.players.push(player);
    }

    /// Entfernt einen Spieler samt Nation aus der Partie
    ///
    /// War er am Zug, wird der naechste verbliebene Spieler aktuell; war er
    /// Admin, uebernimmt der erste verbliebene Mensch.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<ServerPlayer> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let entfernt = self.players.remove(index);
        if self.current_player == Some(id) {
            self.current_player = self
                .players
                .get(index)
                .or_else(|| self.players.first())
                .map(|p| p.id);
        }
        if entfernt.admin {
            if let Some(nachfolger) = self.players.iter_mut().find(|p| !p.ai) {
                nachfolger.admin = true;
            }
        }
        Some(entfernt)
    }

    pub fn player(&self, id: PlayerId) -> Option<&ServerPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut ServerPlayer> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_by_name_mut(&mut self, name: &str) -> Option<&mut ServerPlayer> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    /// Setzt den aktuellen Spieler, falls noch keiner gesetzt ist
    ///
    /// Gibt `true` zurueck, wenn `player` dadurch aktuell wurde.
    pub fn current_player_setzen_falls_leer(&mut self, player: PlayerId) -> bool {
        if self.current_player.is_none() {
            self.current_player = Some(player);
            true
        } else {
            false
        }
    }

    /// Markiert nach einem Spielstand-Import alle Spieler als getrennt
    pub fn alle_trennen(&mut self) {
        for p in &mut self.players {
            p.connection = None;
            p.connected = false;
        }
    }

    /// Vollstaendiger Spielstand als JSON-Objekt fuer die Login-Antwort
    pub fn snapshot(&self) -> serde_json::Value {
        let spieler: Vec<_> = self
            .players
            .iter()
            .map(|p| {
                json!({
                    "id": p.id.to_string(),
                    "userName": p.name,
                    "nation": p.nation.as_ref().map(NationId::as_str),
                    "ai": p.ai,
                    "admin": p.admin,
                    "connected": p.connected,
                })
            })
            .collect();
        json!({
            "turn": self.turn,
            "currentPlayer": self.current_player.map(|id| id.to_string()),
            "nations": self.nations.iter().map(NationId::as_str).collect::<Vec<_>>(),
            "players": spieler,
        })
    }
}

// ---------------------------------------------------------------------------
// Spielregeln
// ---------------------------------------------------------------------------

/// Ergebnis einer beendeten Partie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    pub winner: Option<PlayerId>,
}

/// Spielregeln, die der Sitzungsschicht von aussen gegeben werden
pub trait GameRules: Send + Sync + 'static {
    /// Beendet den Zug von `player` und liefert die resultierenden Aenderungen
    fn end_turn(&self, game: &mut Game, player: PlayerId) -> ChangeSet;

    /// Prueft nach einer Spielnachricht, ob die Partie entschieden ist
    fn check_game_over(&self, game: &Game) -> Option<GameOutcome>;
}

/// Reihum-Zugfolge in Beitrittsreihenfolge; die Partie endet nie von selbst
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinRules;

impl GameRules for RoundRobinRules {
    fn end_turn(&self, game: &mut Game, player: PlayerId) -> ChangeSet {
        let mut cs = ChangeSet::new();
        let anzahl = game.players.len();
        let start = match game.players.iter().position(|p| p.id == player) {
            Some(i) => i,
            None => return cs,
        };

        // Naechster verbundener oder KI-Spieler nach `player`
        let naechster = (1..=anzahl)
            .map(|schritt| (start + schritt) % anzahl)
            .find(|&i| game.players[i].connected || game.players[i].ai);

        if let Some(i) = naechster {
            if i <= start {
                game.naechster_zug();
            }
            let id = game.players[i].id;
            game.set_current_player(Some(id));
            cs.add(See::All, Priority::NORMAL, &SetCurrentPlayerMessage { player: id });
            tracing::debug!(player = %id, zug = game.turn(), "Zug weitergegeben");
        }
        cs
    }

    fn check_game_over(&self, _game: &Game) -> Option<GameOutcome> {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

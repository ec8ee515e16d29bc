//! Server-seitige Spielerdaten

use neuwelt_core::{ConnectionId, NationId, PlayerId};
use neuwelt_protocol::messages::PlayerSummary;

/// Ein Teilnehmer der Partie aus Sicht des Servers
///
/// Ist an hoechstens eine Verbindung gebunden. `connected` ist genau dann
/// gesetzt, wenn `connection` belegt ist.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerPlayer {
    pub id: PlayerId,
    pub name: String,
    pub nation: Option<NationId>,
    pub ai: bool,
    pub admin: bool,
    pub connected: bool,
    pub connection: Option<ConnectionId>,
}

impl ServerPlayer {
    /// Menschlicher Spieler, direkt an eine Verbindung gebunden
    pub fn mensch(
        name: impl Into<String>,
        nation: NationId,
        admin: bool,
        connection: ConnectionId,
    ) -> Self {
        Self {
            id: PlayerId::new(),
            name: name.into(),
            nation: Some(nation),
            ai: false,
            admin,
            connected: true,
            connection: Some(connection),
        }
    }

    /// KI-gesteuerter Spieler ohne Verbindung
    pub fn ki(name: impl Into<String>, nation: NationId) -> Self {
        Self {
            id: PlayerId::new(),
            name: name.into(),
            nation: Some(nation),
            ai: true,
            admin: false,
            connected: false,
            connection: None,
        }
    }

    /// Bindet den Spieler an eine (neue) Verbindung
    pub fn binden(&mut self, connection: ConnectionId) {
        self.connection = Some(connection);
        self.connected = true;
    }

    /// Loest die Bindung, sofern sie noch zu `connection` gehoert
    ///
    /// Gibt `true` zurueck, wenn die Bindung tatsaechlich geloest wurde.
    pub fn trennen(&mut self, connection: ConnectionId) -> bool {
        if self.connection != Some(connection) {
            return false;
        }
        self.connection = None;
        self.connected = false;
        true
    }

    /// Verbunden und nicht von der KI gesteuert
    pub fn ist_aktiver_mensch(&self) -> bool {
        self.connected && !self.ai
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            name: self.name.clone(),
            nation: self.nation.clone(),
            ai: self.ai,
            admin: self.admin,
            connected: self.connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trennen_nur_fuer_eigene_verbindung() {
        let mut p = ServerPlayer::mensch("Alice", NationId::new("dutch"), true, ConnectionId(1));
        assert!(!p.trennen(ConnectionId(2)));
        assert!(p.connected);

        assert!(p.trennen(ConnectionId(1)));
        assert!(!p.connected);
        assert!(p.connection.is_none());
        // Wiederholtes Trennen ist wirkungslos
        assert!(!p.trennen(ConnectionId(1)));
    }

    #[test]
    fn ki_spieler_ist_nicht_verbunden() {
        let p = ServerPlayer::ki("Alice", NationId::new("dutch"));
        assert!(p.ai);
        assert!(!p.connected);
        assert!(!p.ist_aktiver_mensch());
    }

    #[test]
    fn summary_spiegelt_flags() {
        let mut p = ServerPlayer::ki("Bob", NationId::new("french"));
        p.binden(ConnectionId(7));
        let s = p.summary();
        assert_eq!(s.id, p.id);
        assert!(s.connected);
        assert!(s.ai);
    }
}

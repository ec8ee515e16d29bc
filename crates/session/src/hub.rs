//! Verbindungs-Hub – Send-Queues aller verbundenen Clients
//!
//! Der Hub verwaltet pro akzeptierter Verbindung eine Send-Queue und die
//! Bindung an einen Spieler. `flush` liefert eine Aenderungsmenge aus: jede
//! Verbindung bekommt genau die fuer sie sichtbaren Aenderungen, stabil
//! nach Prioritaet sortiert.
//!
//! Verbindungen, die zwischen Berechnung und Auslieferung verschwunden
//! sind, werden stillschweigend uebersprungen.

use dashmap::DashMap;
use neuwelt_core::{ConnectionId, PlayerId};
use neuwelt_protocol::Envelope;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::change::ChangeSet;
use crate::player::ServerPlayer;

/// Groesse der Send-Queue pro Verbindung
const SEND_QUEUE_GROESSE: usize = 256;

// ---------------------------------------------------------------------------
// ConnectionEntry
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ConnectionEntry {
    pub connection: ConnectionId,
    pub player: Option<PlayerId>,
    tx: mpsc::Sender<Envelope>,
}

impl ConnectionEntry {
    /// Reiht einen Envelope nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, envelope: Envelope) -> bool {
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection = %self.connection, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection = %self.connection, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Zentrale Verteilung an alle Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<DashMap<ConnectionId, ConnectionEntry>>,
}

impl Hub {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine neue Verbindung und gibt ihre Empfangs-Queue zurueck
    pub fn registrieren(&self, connection: ConnectionId) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        self.inner.insert(
            connection,
            ConnectionEntry {
                connection,
                player: None,
                tx,
            },
        );
        tracing::debug!(connection = %connection, "Verbindung im Hub registriert");
        rx
    }

    /// Bindet eine Verbindung an einen Spieler
    pub fn binden(&self, connection: ConnectionId, player: PlayerId) {
        if let Some(mut eintrag) = self.inner.get_mut(&connection) {
            eintrag.player = Some(player);
        }
    }

    /// Entfernt eine Verbindung; mehrfacher Aufruf ist wirkungslos
    ///
    /// Gibt den gebundenen Spieler zurueck, falls die Verbindung noch
    /// registriert war.
    pub fn entfernen(&self, connection: ConnectionId) -> Option<Option<PlayerId>> {
        let entfernt = self.inner.remove(&connection).map(|(_, e)| e.player);
        if entfernt.is_some() {
            tracing::debug!(connection = %connection, "Verbindung aus Hub entfernt");
        }
        entfernt
    }

    pub fn ist_registriert(&self, connection: ConnectionId) -> bool {
        self.inner.contains_key(&connection)
    }

    pub fn anzahl(&self) -> usize {
        self.inner.len()
    }

    /// Direkter Versand an eine Verbindung, an der Aenderungsmenge vorbei
    pub fn an_verbindung_senden(&self, connection: ConnectionId, envelope: Envelope) -> bool {
        match self.inner.get(&connection) {
            Some(eintrag) => eintrag.senden(envelope),
            None => false,
        }
    }

    /// Liefert eine Aenderungsmenge aus
    ///
    /// `players` ist ein Schnappschuss der Spieler zum Zeitpunkt der
    /// Berechnung. Gibt die Anzahl der eingereihten Envelopes zurueck.
    pub fn flush(&self, changes: &ChangeSet, players: &[ServerPlayer]) -> usize {
        if changes.is_empty() {
            return 0;
        }
        // Eintraege kopieren, damit keine DashMap-Sperre waehrend des
        // Einreihens gehalten wird
        let eintraege: Vec<ConnectionEntry> =
            self.inner.iter().map(|e| e.value().clone()).collect();

        let mut gesendet = 0;
        for eintrag in eintraege {
            let spieler = eintrag
                .player
                .and_then(|id| players.iter().find(|p| p.id == id));
            for envelope in changes.for_recipient(eintrag.connection, spieler) {
                if !eintrag.senden(envelope.clone()) {
                    break;
                }
                gesendet += 1;
            }
        }
        gesendet
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Priority, See};
    use neuwelt_core::NationId;

    fn spieler(name: &str, conn: u64) -> ServerPlayer {
        ServerPlayer::mensch(name, NationId::new(name), false, ConnectionId(conn))
    }

    #[tokio::test]
    async fn flush_nach_sichtbarkeit() {
        let hub = Hub::neu();
        let (p1, p2) = (spieler("P1", 1), spieler("P2", 2));
        let mut rx1 = hub.registrieren(ConnectionId(1));
        let mut rx2 = hub.registrieren(ConnectionId(2));
        let mut rx3 = hub.registrieren(ConnectionId(3)); // nicht angemeldet
        hub.binden(ConnectionId(1), p1.id);
        hub.binden(ConnectionId(2), p2.id);

        let mut cs = ChangeSet::new();
        cs.add_envelope(See::AllBut(p1.id), Priority::NORMAL, Envelope::new("addPlayer"));
        cs.add_envelope(See::only(p1.id), Priority::NORMAL, Envelope::new("login"));

        let gesendet = hub.flush(&cs, &[p1, p2]);
        assert_eq!(gesendet, 2);
        assert_eq!(rx1.try_recv().unwrap().tag(), "login");
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap().tag(), "addPlayer");
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn gemischte_sichtbarkeit_erreicht_die_richtigen_empfaenger() {
        let hub = Hub::neu();
        let (p1, p2, p3) = (spieler("P1", 1), spieler("P2", 2), spieler("P3", 3));
        let mut p4 = spieler("P4", 4);
        let mut rx: Vec<_> = (1..=4).map(|c| hub.registrieren(ConnectionId(c))).collect();
        for (c, p) in [(1, &p1), (2, &p2), (3, &p3), (4, &p4)] {
            hub.binden(ConnectionId(c), p.id);
        }
        // Verbindung noch im Hub, Spieler aber schon getrennt
        assert!(p4.trennen(ConnectionId(4)));

        let mut cs = ChangeSet::new();
        cs.add_envelope(See::only(p1.id), Priority::NORMAL, Envelope::new("nurP1"));
        cs.add_envelope(See::All, Priority::NORMAL, Envelope::new("alle"));
        cs.add_envelope(See::AllBut(p1.id), Priority::NORMAL, Envelope::new("ausserP1"));

        let gesendet = hub.flush(&cs, &[p1, p2, p3, p4]);
        assert_eq!(gesendet, 6);

        let mut tags = |i: usize| {
            let mut t = Vec::new();
            while let Ok(env) = rx[i].try_recv() {
                t.push(env.tag().to_string());
            }
            t
        };
        assert_eq!(tags(0), vec!["nurP1", "alle"]);
        assert_eq!(tags(1), vec!["alle", "ausserP1"]);
        assert_eq!(tags(2), vec!["alle", "ausserP1"]);
        assert!(tags(3).is_empty());
    }

    #[tokio::test]
    async fn flush_in_prioritaetsreihenfolge() {
        let hub = Hub::neu();
        let p1 = spieler("P1", 1);
        let mut rx = hub.registrieren(ConnectionId(1));
        hub.binden(ConnectionId(1), p1.id);

        let mut cs = ChangeSet::new();
        for (prio, tag) in [(5, "fuenf"), (1, "eins"), (3, "drei")] {
            cs.add_envelope(See::All, Priority(prio), Envelope::new(tag));
        }
        hub.flush(&cs, &[p1]);

        let empfangen: Vec<_> = (0..3).map(|_| rx.try_recv().unwrap().tag().to_string()).collect();
        assert_eq!(empfangen, vec!["eins", "drei", "fuenf"]);
    }

    #[tokio::test]
    async fn verschwundene_verbindung_wird_uebersprungen() {
        let hub = Hub::neu();
        let (p1, p2) = (spieler("P1", 1), spieler("P2", 2));
        let rx1 = hub.registrieren(ConnectionId(1));
        let mut rx2 = hub.registrieren(ConnectionId(2));
        hub.binden(ConnectionId(1), p1.id);
        hub.binden(ConnectionId(2), p2.id);
        drop(rx1);

        let mut cs = ChangeSet::new();
        cs.add_envelope(See::All, Priority::NORMAL, Envelope::new("x"));
        assert_eq!(hub.flush(&cs, &[p1, p2]), 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn entfernen_ist_idempotent() {
        let hub = Hub::neu();
        let p = PlayerId::new();
        let _rx = hub.registrieren(ConnectionId(1));
        hub.binden(ConnectionId(1), p);

        assert_eq!(hub.entfernen(ConnectionId(1)), Some(Some(p)));
        assert_eq!(hub.entfernen(ConnectionId(1)), None);
        assert!(!hub.ist_registriert(ConnectionId(1)));
        assert_eq!(hub.anzahl(), 0);
    }
}

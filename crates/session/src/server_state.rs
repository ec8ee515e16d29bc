//! Gemeinsamer Sitzungszustand
//!
//! Haelt Konfiguration, Spielregeln, Hub und Melder sowie den eigentlichen
//! Spielzustand (`SessionCore`) hinter einer `parking_lot::Mutex`. Die Sperre
//! wird nie ueber ein `.await` gehalten.
//!
//! ## Warten auf das Spiel
//! Ein Login waehrend `ASSEMBLING` kann vor dem Anlegen des Spiels
//! eintreffen. `auf_spiel_warten` wartet dann ueber einen `watch`-Kanal mit
//! fester Frist; der Aufrufer prueft den Kern nach dem Aufwachen erneut
//! unter der Sperre.

use neuwelt_core::{ConnectionId, NationId, PlayerId};
use neuwelt_protocol::messages::{GameEndedMessage, LogoutMessage, LogoutReason, StartGameMessage};
use neuwelt_protocol::ServerState;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::advertiser::{Advertiser, ServerAdvert};
use crate::change::{ChangeSet, Priority, See};
use crate::error::{SessionError, SessionResult};
use crate::game::{Game, GameOutcome, GameRules};
use crate::hub::Hub;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration der Sitzungsschicht
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Anzeigename im Metaserver
    pub server_name: String,
    /// Protokollversion; Clients muessen exakt uebereinstimmen
    pub version: String,
    pub single_player: bool,
    /// Spielbare Nationen in Vergabereihenfolge
    pub nations: Vec<NationId>,
    /// Fester Admin-Name; sonst wird der erste Beitretende Admin
    pub admin: Option<String>,
    /// Frist fuer das Warten auf das Spiel beim Login
    pub login_timeout: Duration,
    /// Port, unter dem der Server Clients annimmt (fuer den Melder)
    pub port: u16,
    pub max_frame_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_name: "Neuwelt Server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            single_player: false,
            nations: ["dutch", "english", "french", "spanish"]
                .into_iter()
                .map(NationId::new)
                .collect(),
            admin: None,
            login_timeout: Duration::from_secs(20),
            port: 3541,
            max_frame_size: neuwelt_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionCore
// ---------------------------------------------------------------------------

/// Veraenderlicher Kern: Server-Zustand und Spiel
#[derive(Debug, Default)]
pub struct SessionCore {
    pub state: ServerState,
    pub game: Option<Game>,
}

impl SessionCore {
    pub fn game_mut(&mut self) -> SessionResult<&mut Game> {
        self.game
            .as_mut()
            .ok_or_else(|| SessionError::intern("kein Spiel vorhanden"))
    }

    fn wechseln(&mut self, nach: ServerState) -> SessionResult<()> {
        let von = self.state;
        self.state
            .transition_to(nach)
            .map_err(|_| SessionError::Zustand { von, nach })?;
        tracing::info!(von = %von, nach = %nach, "Server-Zustand gewechselt");
        Ok(())
    }

    /// Startet die Partie (ASSEMBLING -> ACTIVE) und meldet es allen
    pub fn starten(&mut self) -> SessionResult<ChangeSet> {
        self.wechseln(ServerState::Active)?;
        let snapshot = self.game.as_ref().map(Game::snapshot);
        Ok(ChangeSet::einzeln(See::All, &StartGameMessage { game: snapshot }))
    }

    /// Beendet die Partie (-> ENDED) und meldet es allen
    pub fn beenden(&mut self, ergebnis: GameOutcome) -> SessionResult<ChangeSet> {
        self.wechseln(ServerState::Ended)?;
        let mut cs = ChangeSet::new();
        cs.add(
            See::All,
            Priority::LATE,
            &GameEndedMessage {
                winner: ergebnis.winner,
            },
        );
        Ok(cs)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Gemeinsamer Sitzungszustand (thread-safe, Arc-geteilt)
pub struct SessionState<R: GameRules> {
    pub config: Arc<SessionConfig>,
    pub rules: R,
    pub hub: Hub,
    advertiser: Arc<dyn Advertiser>,
    core: Mutex<SessionCore>,
    spiel_bereit: watch::Sender<bool>,
    naechste_verbindung: AtomicU64,
}

impl<R: GameRules> SessionState<R> {
    pub fn neu(config: SessionConfig, rules: R, advertiser: Arc<dyn Advertiser>) -> Arc<Self> {
        let (spiel_bereit, _) = watch::channel(false);
        Arc::new(Self {
            config: Arc::new(config),
            rules,
            hub: Hub::neu(),
            advertiser,
            core: Mutex::new(SessionCore::default()),
            spiel_bereit,
            naechste_verbindung: AtomicU64::new(1),
        })
    }

    /// Sperrt den Kern; nie ueber ein `.await` halten
    pub fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock()
    }

    pub fn server_state(&self) -> ServerState {
        self.core.lock().state
    }

    pub fn naechste_verbindungs_id(&self) -> ConnectionId {
        ConnectionId(self.naechste_verbindung.fetch_add(1, Ordering::Relaxed))
    }

    /// Legt eine neue Partie mit den konfigurierten Nationen an
    pub fn neues_spiel_anlegen(&self) -> SessionResult<()> {
        self.install_game(Game::neu(self.config.nations.iter().cloned()))
    }

    /// Setzt das Spiel fuer die Zusammenstellung ein
    pub fn install_game(&self, game: Game) -> SessionResult<()> {
        {
            let mut core = self.core.lock();
            if core.state != ServerState::Assembling {
                return Err(SessionError::Zustand {
                    von: core.state,
                    nach: ServerState::Assembling,
                });
            }
            core.game = Some(game);
        }
        self.spiel_bereit.send_replace(true);
        tracing::info!("Spiel angelegt, Beitritte moeglich");
        self.refresh_advert();
        Ok(())
    }

    /// Setzt einen geladenen Spielstand ein; der Server ist danach ACTIVE
    ///
    /// Alle Spieler gelten als getrennt und treten ueber den ACTIVE-Zweig
    /// des Logins wieder bei.
    pub fn install_saved_game(&self, mut game: Game) -> SessionResult<()> {
        game.alle_trennen();
        {
            let mut core = self.core.lock();
            if core.state != ServerState::Assembling {
                return Err(SessionError::Zustand {
                    von: core.state,
                    nach: ServerState::Active,
                });
            }
            core.game = Some(game);
            core.wechseln(ServerState::Active)?;
        }
        self.spiel_bereit.send_replace(true);
        tracing::info!("Spielstand geladen, Wiederbeitritt moeglich");
        self.refresh_advert();
        Ok(())
    }

    /// Wartet hoechstens `frist` darauf, dass ein Spiel vorhanden ist
    ///
    /// Gibt `false` bei Fristablauf zurueck.
    pub async fn auf_spiel_warten(&self, frist: Duration) -> bool {
        let mut rx = self.spiel_bereit.subscribe();
        let bereit = matches!(
            tokio::time::timeout(frist, rx.wait_for(|bereit| *bereit)).await,
            Ok(Ok(_))
        );
        bereit
    }

    /// Beendet die Partie von aussen (z.B. beim Herunterfahren)
    pub fn end_game(&self, winner: Option<PlayerId>) -> SessionResult<()> {
        let cs = self.lock().beenden(GameOutcome { winner })?;
        self.flush(&cs);
        self.refresh_advert();
        Ok(())
    }

    /// Liefert eine Aenderungsmenge ueber den Hub aus
    pub fn flush(&self, changes: &ChangeSet) -> usize {
        if changes.is_empty() {
            return 0;
        }
        let spieler = {
            let core = self.core.lock();
            core.game
                .as_ref()
                .map(|g| g.players().to_vec())
                .unwrap_or_default()
        };
        self.hub.flush(changes, &spieler)
    }

    /// Aktueller Eintrag fuer den Metaserver
    pub fn advert(&self) -> ServerAdvert {
        let core = self.core.lock();
        let (frei, spielend) = core
            .game
            .as_ref()
            .map(|g| (g.freie_plaetze() as u32, g.aktive_menschen() as u32))
            .unwrap_or((0, 0));
        ServerAdvert {
            name: self.config.server_name.clone(),
            port: self.config.port,
            slots_available: frei,
            currently_playing: spielend,
            is_game_started: core.state != ServerState::Assembling,
            version: self.config.version.clone(),
            state: core.state,
        }
    }

    pub fn refresh_advert(&self) {
        if self.config.single_player {
            return;
        }
        self.advertiser.refresh(self.advert());
    }

    /// Aufraeumen nach dem Ende einer Verbindung
    ///
    /// Entfernt die Verbindung aus dem Hub, markiert den gebundenen Spieler
    /// als getrennt und meldet das den uebrigen Spielern. Mehrfacher Aufruf
    /// ist wirkungslos.
    pub fn verbindung_beendet(&self, connection: ConnectionId) {
        let player = match self.hub.entfernen(connection) {
            Some(Some(player)) => player,
            _ => return,
        };

        let cs = {
            let mut core = self.core.lock();
            let zustand = core.state;
            let Some(game) = core.game.as_mut() else {
                return;
            };
            let getrennt = game
                .player_mut(player)
                .is_some_and(|p| p.trennen(connection));
            if !getrennt {
                return;
            }
            tracing::info!(player = %player, connection = %connection, "Spieler getrennt");
            // Vor dem Start haelt ein getrennter Spieler weder Namen noch Nation
            if zustand == ServerState::Assembling {
                game.remove_player(player);
                tracing::debug!(player = %player, "Spieler aus der Aufstellung entfernt");
            }
            if zustand.is_terminal() {
                ChangeSet::new()
            } else {
                ChangeSet::einzeln(
                    See::AllBut(player),
                    &LogoutMessage::new(player, LogoutReason::Disconnected),
                )
            }
        };
        self.flush(&cs);
        self.refresh_advert();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertiser::NoAdvertiser;
    use crate::game::RoundRobinRules;
    use crate::player::ServerPlayer;

    fn zustand() -> Arc<SessionState<RoundRobinRules>> {
        SessionState::neu(SessionConfig::default(), RoundRobinRules, Arc::new(NoAdvertiser))
    }

    #[tokio::test]
    async fn warten_ohne_spiel_laeuft_ab() {
        let s = zustand();
        assert!(!s.auf_spiel_warten(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn warten_endet_beim_anlegen() {
        let s = zustand();
        let s2 = Arc::clone(&s);
        let warten = tokio::spawn(async move { s2.auf_spiel_warten(Duration::from_secs(5)).await });
        tokio::task::yield_now().await;
        s.neues_spiel_anlegen().unwrap();
        assert!(warten.await.unwrap());
        // Spaetere Warter kehren sofort zurueck
        assert!(s.auf_spiel_warten(Duration::from_millis(1)).await);
    }

    #[test]
    fn gespeichertes_spiel_startet_aktiv() {
        let s = zustand();
        let mut game = Game::neu([NationId::new("dutch")]);
        game.add_player(ServerPlayer::mensch("Alice", NationId::new("dutch"), true, ConnectionId(1)));
        s.install_saved_game(game).unwrap();

        let core = s.lock();
        assert_eq!(core.state, ServerState::Active);
        assert!(core.game.as_ref().unwrap().players().iter().all(|p| !p.connected));
    }

    #[test]
    fn ende_ist_endgueltig() {
        let s = zustand();
        s.neues_spiel_anlegen().unwrap();
        s.end_game(None).unwrap();
        assert_eq!(s.server_state(), ServerState::Ended);
        assert!(s.end_game(None).is_err());
        assert!(s.neues_spiel_anlegen().is_err());

        let mut core = s.lock();
        assert!(core.starten().is_err());
        assert_eq!(core.state, ServerState::Ended);
    }

    #[test]
    fn advert_zaehlt_plaetze() {
        let s = zustand();
        s.neues_spiel_anlegen().unwrap();
        {
            let mut core = s.lock();
            let game = core.game_mut().unwrap();
            game.add_player(ServerPlayer::mensch("A", NationId::new("dutch"), true, ConnectionId(1)));
        }
        let advert = s.advert();
        assert_eq!(advert.slots_available, 3);
        assert_eq!(advert.currently_playing, 1);
        assert!(!advert.is_game_started);
        assert_eq!(advert.state, ServerState::Assembling);
    }

    #[tokio::test]
    async fn getrennter_spieler_wird_gemeldet() {
        let s = zustand();
        s.neues_spiel_anlegen().unwrap();
        let (a, b) = (
            ServerPlayer::mensch("A", NationId::new("dutch"), true, ConnectionId(1)),
            ServerPlayer::mensch("B", NationId::new("english"), false, ConnectionId(2)),
        );
        let (a_id, b_id) = (a.id, b.id);
        {
            let mut core = s.lock();
            let game = core.game_mut().unwrap();
            game.add_player(a);
            game.add_player(b);
        }
        let _rx_a = s.hub.registrieren(ConnectionId(1));
        let mut rx_b = s.hub.registrieren(ConnectionId(2));
        s.hub.binden(ConnectionId(1), a_id);
        s.hub.binden(ConnectionId(2), b_id);

        s.verbindung_beendet(ConnectionId(1));
        s.verbindung_beendet(ConnectionId(1));

        let meldung = rx_b.try_recv().unwrap();
        assert_eq!(meldung.tag(), "logout");
        assert_eq!(meldung.attribute("reason"), Some("DISCONNECTED"));
        assert!(rx_b.try_recv().is_err(), "Nur eine Meldung trotz doppeltem Aufraeumen");

        // In der Aufstellung verschwindet der Spieler samt Nation
        let core = s.lock();
        let game = core.game.as_ref().unwrap();
        assert!(game.player(a_id).is_none());
        assert_eq!(game.vacant_nation(), Some(NationId::new("dutch")));
        assert!(game.player(b_id).unwrap().admin);
    }

    #[test]
    fn getrennter_spieler_bleibt_in_laufender_partie() {
        let s = zustand();
        s.neues_spiel_anlegen().unwrap();
        let a = ServerPlayer::mensch("A", NationId::new("dutch"), true, ConnectionId(1));
        let a_id = a.id;
        {
            let mut core = s.lock();
            core.game_mut().unwrap().add_player(a);
            core.starten().unwrap();
        }
        let _rx_a = s.hub.registrieren(ConnectionId(1));
        s.hub.binden(ConnectionId(1), a_id);

        s.verbindung_beendet(ConnectionId(1));

        let core = s.lock();
        let a = core.game.as_ref().unwrap().player(a_id).unwrap();
        assert!(!a.connected);
        assert_eq!(a.nation, Some(NationId::new("dutch")));
    }
}

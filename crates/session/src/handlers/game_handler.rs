//! Spielablauf-Handler – Partie starten, Zug beenden

use neuwelt_protocol::messages::{EndTurnMessage, RequestLaunchMessage, TypedMessage};
use neuwelt_protocol::ServerState;
use std::sync::Arc;

use crate::change::ChangeSet;
use crate::dispatcher::{ConnectionContext, HandlerTable};
use crate::error::{RuleViolation, SessionResult};
use crate::game::GameRules;
use crate::server_state::SessionState;

/// Startet die zusammengestellte Partie (nur Admin)
pub fn handle_request_launch<R: GameRules>(
    ctx: &mut ConnectionContext,
    state: &Arc<SessionState<R>>,
) -> SessionResult<ChangeSet> {
    let player = ctx.player.ok_or(RuleViolation::NotAdmin)?;
    let cs = {
        let mut core = state.lock();
        if core.state != ServerState::Assembling {
            return Err(RuleViolation::BadState {
                tag: RequestLaunchMessage::TAG.to_string(),
                state: core.state,
            }
            .into());
        }
        let ist_admin = core
            .game
            .as_ref()
            .and_then(|g| g.player(player))
            .is_some_and(|p| p.admin);
        if !ist_admin {
            return Err(RuleViolation::NotAdmin.into());
        }
        core.starten()?
    };

    ctx.table = HandlerTable::InGame;
    tracing::info!(player = %player, "Partie vom Admin gestartet");
    state.refresh_advert();
    Ok(cs)
}

/// Beendet den Zug des aktuellen Spielers
pub fn handle_end_turn<R: GameRules>(
    ctx: &mut ConnectionContext,
    state: &Arc<SessionState<R>>,
) -> SessionResult<ChangeSet> {
    let player = ctx.player.ok_or(RuleViolation::NotCurrentPlayer)?;
    let mut core = state.lock();
    if core.state != ServerState::Active {
        return Err(RuleViolation::BadState {
            tag: EndTurnMessage::TAG.to_string(),
            state: core.state,
        }
        .into());
    }

    let game = core.game_mut()?;
    if game.current_player() != Some(player) {
        return Err(RuleViolation::NotCurrentPlayer.into());
    }
    let mut cs = state.rules.end_turn(game, player);
    let ergebnis = state.rules.check_game_over(game);
    let beendet = match ergebnis {
        Some(ergebnis) => {
            tracing::info!(sieger = ?ergebnis.winner, "Partie entschieden");
            cs.merge(core.beenden(ergebnis)?);
            true
        }
        None => false,
    };
    drop(core);

    if beendet {
        state.refresh_advert();
    }
    Ok(cs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertiser::NoAdvertiser;
    use crate::error::SessionError;
    use crate::game::{Game, GameOutcome, RoundRobinRules};
    use crate::player::ServerPlayer;
    use crate::server_state::SessionConfig;
    use neuwelt_core::{ConnectionId, NationId, PlayerId};

    /// Regeln, die nach dem ersten Zugende den Beender zum Sieger erklaeren
    struct SofortSieg;

    impl GameRules for SofortSieg {
        fn end_turn(&self, game: &mut Game, player: PlayerId) -> ChangeSet {
            RoundRobinRules.end_turn(game, player)
        }

        fn check_game_over(&self, game: &Game) -> Option<GameOutcome> {
            (game.turn() > 1).then(|| GameOutcome {
                winner: game.players().first().map(|p| p.id),
            })
        }
    }

    fn aufbau<R: GameRules>(rules: R) -> (Arc<SessionState<R>>, ConnectionContext, ConnectionContext) {
        let state = SessionState::neu(SessionConfig::default(), rules, Arc::new(NoAdvertiser));
        state.neues_spiel_anlegen().unwrap();
        let admin = ServerPlayer::mensch("Admin", NationId::new("dutch"), true, ConnectionId(1));
        let gast = ServerPlayer::mensch("Gast", NationId::new("english"), false, ConnectionId(2));
        let mut ctx_admin = ConnectionContext::neu(ConnectionId(1), "127.0.0.1:1".parse().unwrap());
        let mut ctx_gast = ConnectionContext::neu(ConnectionId(2), "127.0.0.1:2".parse().unwrap());
        ctx_admin.player = Some(admin.id);
        ctx_admin.table = HandlerTable::PreGame;
        ctx_gast.player = Some(gast.id);
        ctx_gast.table = HandlerTable::PreGame;
        {
            let mut core = state.lock();
            let game = core.game_mut().unwrap();
            game.set_current_player(Some(admin.id));
            game.add_player(admin);
            game.add_player(gast);
        }
        (state, ctx_admin, ctx_gast)
    }

    fn verstoss<T: std::fmt::Debug>(ergebnis: SessionResult<T>) -> RuleViolation {
        match ergebnis {
            Err(SessionError::Regel(v)) => v,
            anderes => panic!("Regelverstoss erwartet: {:?}", anderes),
        }
    }

    #[test]
    fn nur_admin_darf_starten() {
        let (state, mut admin, mut gast) = aufbau(RoundRobinRules);
        assert_eq!(
            verstoss(handle_request_launch(&mut gast, &state).map(|c| c.len())),
            RuleViolation::NotAdmin
        );
        assert_eq!(state.server_state(), ServerState::Assembling);

        let cs = handle_request_launch(&mut admin, &state).unwrap();
        assert_eq!(state.server_state(), ServerState::Active);
        assert_eq!(admin.table, HandlerTable::InGame);
        assert_eq!(cs.changes()[0].payload.tag(), "startGame");
    }

    #[test]
    fn nur_aktueller_spieler_beendet_zug() {
        let (state, mut admin, mut gast) = aufbau(RoundRobinRules);
        handle_request_launch(&mut admin, &state).unwrap();

        assert_eq!(
            verstoss(handle_end_turn(&mut gast, &state).map(|c| c.len())),
            RuleViolation::NotCurrentPlayer
        );
        let cs = handle_end_turn(&mut admin, &state).unwrap();
        assert_eq!(cs.changes()[0].payload.tag(), "setCurrentPlayer");
        assert_eq!(
            state.lock().game.as_ref().unwrap().current_player(),
            gast.player
        );
    }

    #[test]
    fn entschiedene_partie_endet() {
        let (state, mut admin, mut gast) = aufbau(SofortSieg);
        handle_request_launch(&mut admin, &state).unwrap();
        handle_end_turn(&mut admin, &state).unwrap();
        assert_eq!(state.server_state(), ServerState::Active);

        // Gast beendet, Zug 2 beginnt: SofortSieg entscheidet
        let cs = handle_end_turn(&mut gast, &state).unwrap();
        assert_eq!(state.server_state(), ServerState::Ended);
        let ende = cs
            .changes()
            .iter()
            .find(|c| c.payload.tag() == "gameEnded")
            .unwrap();
        assert_eq!(ende.payload.attribute("winner"), Some(admin.player.unwrap().to_string().as_str()));
    }
}

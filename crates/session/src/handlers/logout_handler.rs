//! Logout-Handler – Spieler verlaesst die Partie
//!
//! Im Einzelspieler ist Verlassen immer folgenlos. Im Mehrspieler beendet
//! ein Admin mit `QUIT` die ganze Partie; haelt der Gehende gerade den Zug,
//! wird dieser regulaer beendet. Der Gehende bekommt eine Bestaetigung.

use neuwelt_protocol::messages::{LogoutMessage, LogoutReason};
use neuwelt_protocol::ServerState;
use std::sync::Arc;

use crate::change::{ChangeSet, Priority, See};
use crate::dispatcher::ConnectionContext;
use crate::error::SessionResult;
use crate::game::{GameOutcome, GameRules};
use crate::server_state::SessionState;

/// Verarbeitet eine Logout-Nachricht
///
/// Vor dem Login und nach Spielende gibt es nichts zu tun (`Ok(None)`).
pub fn handle_logout<R: GameRules>(
    logout: LogoutMessage,
    ctx: &mut ConnectionContext,
    state: &Arc<SessionState<R>>,
) -> SessionResult<Option<ChangeSet>> {
    let Some(player) = ctx.player else {
        tracing::debug!(connection = %ctx.connection, "Logout ohne gebundenen Spieler");
        return Ok(None);
    };
    if logout.player != player {
        tracing::warn!(
            connection = %ctx.connection,
            gebunden = %player,
            angegeben = %logout.player,
            "Logout fuer fremden Spieler, verwende gebundenen"
        );
    }

    let mut cs = ChangeSet::new();
    let mut spiel_beendet = false;
    {
        let mut core = state.lock();
        let zustand = core.state;
        match zustand {
            ServerState::Ended => return Ok(None),
            ServerState::Assembling => {}
            ServerState::Active => {
                let game = core.game_mut()?;
                let ist_admin = game.player(player).is_some_and(|p| p.admin);

                if state.config.single_player {
                    // Einzelspieler: Verlassen ist immer erlaubt
                } else if ist_admin && logout.reason == LogoutReason::Quit {
                    tracing::info!(player = %player, "Admin verlaesst die Partie, Spielende");
                    cs.merge(core.beenden(GameOutcome { winner: None })?);
                    spiel_beendet = true;
                } else if game.current_player() == Some(player) {
                    // TODO: Gehenden Spieler an die KI uebergeben statt nur den Zug zu beenden
                    cs.merge(state.rules.end_turn(game, player));
                    if let Some(ergebnis) = state.rules.check_game_over(game) {
                        cs.merge(core.beenden(ergebnis)?);
                        spiel_beendet = true;
                    }
                }
            }
        }
    }

    cs.add(
        See::only(player),
        Priority::NORMAL,
        &LogoutMessage::new(player, logout.reason),
    );
    tracing::info!(
        player = %player,
        grund = %logout.reason,
        spiel_beendet,
        "Spieler abgemeldet"
    );
    state.refresh_advert();
    Ok(Some(cs))
}

//! Login-Handler – Beitritt und Wiederbeitritt
//!
//! Vor jedem Zustandszweig werden Name und Version geprueft. Danach:
//! - `ASSEMBLING`: auf das Spiel warten, freie Nation vergeben, neuen
//!   Spieler anlegen und den uebrigen melden.
//! - `ACTIVE`: vorhandenen Spieler per Name suchen und neu binden; ein
//!   KI-gesteuerter Spieler wird dabei wieder menschlich.
//!
//! Alle Pruefungen laufen vor der ersten Mutation, eine Ablehnung
//! hinterlaesst keinen halb angelegten Spieler.

use neuwelt_protocol::messages::{AddPlayerMessage, LoginMessage, SetAiMessage, TypedMessage};
use neuwelt_protocol::ServerState;
use std::sync::Arc;

use crate::change::{ChangeSet, Priority, See};
use crate::dispatcher::{ConnectionContext, HandlerTable};
use crate::error::{RuleViolation, SessionResult};
use crate::game::{Game, GameRules, MAP_EDITOR_NAME};
use crate::player::ServerPlayer;
use crate::server_state::SessionState;

/// Verarbeitet eine Login-Anfrage
pub async fn handle_login<R: GameRules>(
    login: LoginMessage,
    ctx: &mut ConnectionContext,
    state: &Arc<SessionState<R>>,
) -> SessionResult<ChangeSet> {
    if login.user_name.is_empty() {
        return Err(RuleViolation::MissingUserName.into());
    }
    if login.version.is_empty() {
        return Err(RuleViolation::MissingVersion.into());
    }
    if login.version != state.config.version {
        tracing::warn!(
            peer = %ctx.peer_addr,
            client_version = %login.version,
            "Login mit falscher Version"
        );
        return Err(RuleViolation::WrongVersion {
            client: login.version,
            server: state.config.version.clone(),
        }
        .into());
    }

    match state.server_state() {
        ServerState::Assembling => beitreten(login, ctx, state).await,
        ServerState::Active => wieder_beitreten(&login, ctx, state),
        zustand @ ServerState::Ended => Err(RuleViolation::BadState {
            tag: LoginMessage::TAG.to_string(),
            state: zustand,
        }
        .into()),
    }
}

/// Beitritt waehrend der Zusammenstellung
async fn beitreten<R: GameRules>(
    login: LoginMessage,
    ctx: &mut ConnectionContext,
    state: &Arc<SessionState<R>>,
) -> SessionResult<ChangeSet> {
    if !state.auf_spiel_warten(state.config.login_timeout).await {
        tracing::warn!(peer = %ctx.peer_addr, user = %login.user_name, "Kein Spiel innerhalb der Frist");
        return Err(RuleViolation::TimedOut.into());
    }

    let mut core = state.lock();
    let zustand = core.state;
    match zustand {
        ServerState::Assembling => {}
        ServerState::Active => {
            // Partie wurde waehrend des Wartens gestartet
            drop(core);
            return wieder_beitreten(&login, ctx, state);
        }
        ServerState::Ended => {
            return Err(RuleViolation::BadState {
                tag: LoginMessage::TAG.to_string(),
                state: zustand,
            }
            .into())
        }
    }

    let game = core.game_mut()?;
    let nation = game.vacant_nation().ok_or(RuleViolation::MaximumPlayers)?;
    if game.player_name_in_use(&login.user_name) {
        return Err(RuleViolation::UserNameInUse(login.user_name).into());
    }

    let admin = match state.config.admin.as_deref() {
        Some(name) => name == login.user_name,
        None => !game.hat_menschen(),
    };
    let player = ServerPlayer::mensch(&login.user_name, nation, admin, ctx.connection);
    let id = player.id;
    let mut cs = ChangeSet::new();
    cs.add(
        See::AllBut(id),
        Priority::NORMAL,
        &AddPlayerMessage {
            player: player.summary(),
        },
    );
    game.add_player(player);
    game.current_player_setzen_falls_leer(id);
    let ist_aktuell = game.current_player() == Some(id);

    let sofort_starten = login.start_game && admin;
    if sofort_starten {
        cs.merge(core.starten()?);
    }

    let antwort = LoginMessage {
        user_name: login.user_name,
        version: state.config.version.clone(),
        start_game: sofort_starten,
        single_player: state.config.single_player,
        current_player: ist_aktuell,
        game: core.game.as_ref().map(Game::snapshot),
    };
    drop(core);

    cs.add(See::only(id), Priority::EARLY, &antwort);
    ctx.player = Some(id);
    ctx.table = if sofort_starten {
        HandlerTable::InGame
    } else {
        HandlerTable::PreGame
    };
    state.hub.binden(ctx.connection, id);
    tracing::info!(
        player = %id,
        user = %antwort.user_name,
        admin,
        connection = %ctx.connection,
        "Spieler beigetreten"
    );
    state.refresh_advert();
    Ok(cs)
}

/// Wiederbeitritt in eine laufende Partie
fn wieder_beitreten<R: GameRules>(
    login: &LoginMessage,
    ctx: &mut ConnectionContext,
    state: &Arc<SessionState<R>>,
) -> SessionResult<ChangeSet> {
    if login.user_name == MAP_EDITOR_NAME {
        return Err(RuleViolation::MapEditorGame.into());
    }

    let mut core = state.lock();
    if core.state != ServerState::Active {
        return Err(RuleViolation::BadState {
            tag: LoginMessage::TAG.to_string(),
            state: core.state,
        }
        .into());
    }
    let game = core.game_mut()?;

    let vorhanden = game
        .players()
        .iter()
        .find(|p| p.name == login.user_name)
        .map(|p| p.id);
    let Some(id) = vorhanden else {
        return Err(RuleViolation::UserNameNotPresent {
            name: login.user_name.clone(),
            vorhanden: game.live_player_names(),
        }
        .into());
    };

    let mut cs = ChangeSet::new();
    if let Some(player) = game.player_mut(id) {
        if player.ist_aktiver_mensch() {
            return Err(RuleViolation::UserNameInUse(login.user_name.clone()).into());
        }
        let war_ki = player.ai;
        player.binden(ctx.connection);
        player.ai = false;
        if war_ki {
            tracing::info!(player = %id, "KI-Spieler wird wieder menschlich gesteuert");
            cs.add(See::AllBut(id), Priority::NORMAL, &SetAiMessage { player: id, ai: false });
        }
    }
    game.current_player_setzen_falls_leer(id);

    let antwort = LoginMessage {
        user_name: login.user_name.clone(),
        version: state.config.version.clone(),
        start_game: true,
        single_player: state.config.single_player,
        current_player: game.current_player() == Some(id),
        game: Some(game.snapshot()),
    };
    drop(core);

    cs.add(See::only(id), Priority::EARLY, &antwort);
    ctx.player = Some(id);
    ctx.table = HandlerTable::InGame;
    state.hub.binden(ctx.connection, id);
    tracing::info!(player = %id, user = %login.user_name, connection = %ctx.connection, "Spieler wieder beigetreten");
    state.refresh_advert();
    Ok(cs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Message-Dispatcher – Routet eingehende Envelopes an die Handler
//!
//! Jede Verbindung traegt eine `HandlerTable`, die festlegt, welche Tags sie
//! gerade senden darf. Der Dispatcher
//! 1. gleicht die Tabelle mit dem Server-Zustand ab (PreGame -> InGame
//!    sobald die Partie laeuft),
//! 2. lehnt Tags ausserhalb der Tabelle als "unsupported" ab,
//! 3. dekodiert die typisierte Nachricht (Fehler -> "malformed"),
//! 4. prueft die Zustandsregel der Nachricht und
//! 5. ruft den Handler auf.
//!
//! Regelverstoesse werden zu einer Fehlermeldung nur an den Absender; alle
//! anderen Fehler sind fatal fuer die Verbindung.

use neuwelt_core::{ConnectionId, PlayerId};
use neuwelt_protocol::messages::{
    self, EndTurnMessage, IllegalPolicy, LoginMessage, LogoutMessage, Message,
    RequestLaunchMessage, TypedMessage,
};
use neuwelt_protocol::{Envelope, ServerState};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::change::{ChangeSet, Recipient};
use crate::error::{RuleViolation, SessionError, SessionResult};
use crate::game::GameRules;
use crate::handlers::{game_handler, login_handler, logout_handler};
use crate::server_state::SessionState;

// ---------------------------------------------------------------------------
// HandlerTable
// ---------------------------------------------------------------------------

/// Menge der Nachrichten, die eine Verbindung gerade senden darf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerTable {
    /// Vor dem Login
    #[default]
    PreLogin,
    /// Beigetreten, Partie noch nicht gestartet
    PreGame,
    /// Partie laeuft
    InGame,
}

impl HandlerTable {
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            Self::PreLogin => &[LoginMessage::TAG, LogoutMessage::TAG],
            Self::PreGame => &[LogoutMessage::TAG, RequestLaunchMessage::TAG],
            Self::InGame => &[LogoutMessage::TAG, EndTurnMessage::TAG],
        }
    }

    pub fn handles(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }

    /// Tabelle passend zum Server-Zustand
    fn abgeglichen(self, state: ServerState) -> Self {
        match (self, state) {
            (Self::PreGame, ServerState::Active) => Self::InGame,
            (tabelle, _) => tabelle,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionContext
// ---------------------------------------------------------------------------

/// Zustand einer einzelnen Verbindung
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection: ConnectionId,
    pub peer_addr: SocketAddr,
    /// Gebundener Spieler (None vor dem Login)
    pub player: Option<PlayerId>,
    pub table: HandlerTable,
}

impl ConnectionContext {
    pub fn neu(connection: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            connection,
            peer_addr,
            player: None,
            table: HandlerTable::PreLogin,
        }
    }

    /// Empfaenger fuer Fehlermeldungen an diese Verbindung
    pub fn recipient(&self) -> Recipient {
        Recipient::Connection(self.connection)
    }
}

// ---------------------------------------------------------------------------
// MessageDispatcher
// ---------------------------------------------------------------------------

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher<R: GameRules> {
    state: Arc<SessionState<R>>,
}

impl<R: GameRules> MessageDispatcher<R> {
    pub fn neu(state: Arc<SessionState<R>>) -> Self {
        Self { state }
    }

    /// Verarbeitet einen eingehenden Envelope
    ///
    /// `Ok(None)` heisst: nichts auszuliefern. `Err` ist fatal fuer die
    /// Verbindung.
    pub async fn dispatch(
        &self,
        envelope: Envelope,
        ctx: &mut ConnectionContext,
    ) -> SessionResult<Option<ChangeSet>> {
        let tag = envelope.tag().to_string();
        tracing::trace!(connection = %ctx.connection, tag = %tag, "Nachricht empfangen");

        match self.verarbeiten(&envelope, ctx).await {
            Ok(antwort) => Ok(antwort),
            Err(SessionError::Regel(verstoss)) => {
                tracing::info!(
                    connection = %ctx.connection,
                    tag = %tag,
                    grund = verstoss.message_id(),
                    "Anfrage abgelehnt"
                );
                Ok(Some(ChangeSet::client_error(ctx.recipient(), &verstoss)))
            }
            Err(e) => {
                tracing::error!(
                    connection = %ctx.connection,
                    tag = %tag,
                    fehler = %e,
                    "Fataler Fehler bei der Verarbeitung"
                );
                Err(e)
            }
        }
    }

    async fn verarbeiten(
        &self,
        envelope: &Envelope,
        ctx: &mut ConnectionContext,
    ) -> SessionResult<Option<ChangeSet>> {
        let zustand = self.state.server_state();
        ctx.table = ctx.table.abgeglichen(zustand);

        let tag = envelope.tag();
        if !ctx.table.handles(tag) {
            return Err(RuleViolation::UnsupportedMessage(tag.to_string()).into());
        }

        let nachricht = Message::from_envelope(envelope).map_err(|e| {
            tracing::warn!(connection = %ctx.connection, tag = %tag, fehler = %e, "Fehlerhafte Nachricht");
            RuleViolation::MalformedMessage(e.to_string())
        })?;

        if let Some(regel) = messages::message_spec(tag) {
            if !regel.is_legal_in(zustand) {
                return match regel.when_illegal {
                    IllegalPolicy::Refuse => Err(RuleViolation::BadState {
                        tag: tag.to_string(),
                        state: zustand,
                    }
                    .into()),
                    IllegalPolicy::Ignore => {
                        tracing::debug!(
                            connection = %ctx.connection,
                            tag = %tag,
                            zustand = %zustand,
                            "Nachricht im aktuellen Zustand ignoriert"
                        );
                        Ok(None)
                    }
                };
            }
        }

        match nachricht {
            Message::Login(login) => login_handler::handle_login(login, ctx, &self.state)
                .await
                .map(Some),
            Message::Logout(logout) => logout_handler::handle_logout(logout, ctx, &self.state),
            Message::RequestLaunch(_) => {
                game_handler::handle_request_launch(ctx, &self.state).map(Some)
            }
            Message::EndTurn(_) => game_handler::handle_end_turn(ctx, &self.state).map(Some),
            andere => Err(RuleViolation::UnsupportedMessage(andere.tag().to_string()).into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

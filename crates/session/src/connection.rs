//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede akzeptierte Verbindung bekommt eine `ClientConnection` in einem
//! eigenen tokio-Task. Die Schleife liest Frames, dispatcht sie und leert
//! die Send-Queue der Verbindung im Hub in den Socket.
//!
//! ## Fehlerklassen
//! - Nicht dekodierbare Payload: Fehlermeldung an den Client, weiter.
//! - Regelverstoss: vom Dispatcher als Fehlermeldung geliefert, weiter.
//! - Transportfehler, EOF, fataler Handler-Fehler: Verbindung endet.
//!
//! Am Ende wird die Verbindung immer ueber
//! `SessionState::verbindung_beendet` aufgeraeumt.

use futures_util::{SinkExt, StreamExt};
use neuwelt_protocol::wire::FrameCodec;
use neuwelt_protocol::ProtocolError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::change::ChangeSet;
use crate::dispatcher::{ConnectionContext, MessageDispatcher};
use crate::error::RuleViolation;
use crate::game::GameRules;
use crate::server_state::SessionState;

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection<R: GameRules> {
    state: Arc<SessionState<R>>,
    peer_addr: SocketAddr,
}

impl<R: GameRules> ClientConnection<R> {
    pub fn neu(state: Arc<SessionState<R>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let connection = self.state.naechste_verbindungs_id();
        tracing::info!(peer = %peer_addr, connection = %connection, "Neue Verbindung");

        let mut framed = Framed::new(
            stream,
            FrameCodec::with_max_size(self.state.config.max_frame_size),
        );
        let mut sende_rx = self.state.hub.registrieren(connection);
        let mut ctx = ConnectionContext::neu(connection, peer_addr);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        loop {
            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(Ok(envelope))) => {
                            match dispatcher.dispatch(envelope, &mut ctx).await {
                                Ok(Some(changes)) => {
                                    self.state.flush(&changes);
                                }
                                Ok(None) => {}
                                Err(_) => break,
                            }
                        }
                        Some(Ok(Err(e))) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Nicht dekodierbare Nachricht"
                            );
                            let fehler = ChangeSet::client_error(
                                ctx.recipient(),
                                &RuleViolation::MalformedMessage(e.to_string()),
                            );
                            self.state.flush(&fehler);
                        }
                        Some(Err(ProtocolError::FrameZuGross { laenge, maximum })) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                laenge,
                                maximum,
                                "Frame zu gross – Verbindung wird getrennt"
                            );
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus dem Hub
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            fehler = %e,
                            "Senden fehlgeschlagen"
                        );
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        // Bereits eingereihte Nachrichten noch zustellen
                        while let Ok(ausgehend) = sende_rx.try_recv() {
                            if framed.send(ausgehend).await.is_err() {
                                break;
                            }
                        }
                        break;
                    }
                }
            }
        }

        self.state.verbindung_beendet(connection);
        tracing::info!(peer = %peer_addr, connection = %connection, "Verbindungs-Task beendet");
    }
}

//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SessionServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer
//! `ClientConnection`. Der Spielzustand liegt hinter einer
//! `parking_lot::Mutex`, die nie ueber ein `.await` gehalten wird; die
//! Tasks laufen daher auf dem normalen Multi-Thread-Runtime.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::connection::ClientConnection;
use crate::game::GameRules;
use crate::server_state::SessionState;

/// TCP-Server der Sitzungsschicht
pub struct SessionServer<R: GameRules> {
    state: Arc<SessionState<R>>,
    listener: TcpListener,
}

impl<R: GameRules> SessionServer<R> {
    /// Bindet den Socket
    ///
    /// Port 0 waehlt einen freien Port, siehe `local_addr`.
    pub async fn binden(state: Arc<SessionState<R>>, bind_addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(
        self,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "Spielserver gestartet");

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }
                            let verbindung = ClientConnection::neu(Arc::clone(&self.state), peer_addr);
                            let shutdown_rx_clone = shutdown_rx.clone();
                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Spielserver: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("Spielserver gestoppt");
        Ok(())
    }
}

//! TCP-Front-End des Metaservers
//!
//! Pro Verbindung ein Task, der Anfragen der Reihe nach beantwortet:
//! `register`/`update` → `ok` oder `error`, `remove` → `ok`,
//! `serverList` → `serverList` mit allen Eintraegen. Eine leere Adresse
//! in `register`/`update`/`remove` wird durch die IP des Absenders ersetzt.

use neuwelt_protocol::messages::{
    ErrorMessage, Message, OkMessage, RegisterServerMessage, ServerDescription, ServerListMessage,
    TypedMessage, UpdateServerMessage,
};
use neuwelt_protocol::wire::FrameCodec;
use neuwelt_protocol::{Connection, Envelope, ProtocolError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::error::RegistryError;
use crate::registry::Registry;

/// Metaserver: Verzeichnis plus TCP-Listener
pub struct MetaServer {
    registry: Arc<Registry>,
    listener: TcpListener,
}

impl MetaServer {
    pub async fn binden(registry: Arc<Registry>, bind_addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { registry, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "Metaserver gestartet");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "Metaserver-Verbindung akzeptiert");
                            let registry = Arc::clone(&self.registry);
                            let shutdown_rx_clone = shutdown_rx.clone();
                            tokio::spawn(async move {
                                verbindung_bedienen(registry, stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Metaserver: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("Metaserver gestoppt");
        Ok(())
    }
}

async fn verbindung_bedienen(
    registry: Arc<Registry>,
    stream: TcpStream,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut conn = match Connection::from_stream(stream, FrameCodec::new()) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(fehler = %e, "Verbindung nicht uebernommen");
            return;
        }
    };
    let peer_addr = conn.peer_addr();

    loop {
        let eingang = tokio::select! {
            eingang = conn.receive() => eingang,
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        };

        let antwort = match eingang {
            Ok(anfrage) => beantworten(&registry, peer_addr, &anfrage).await,
            Err(e) if e.ist_transportfehler() => {
                tracing::debug!(peer = %peer_addr, fehler = %e, "Metaserver-Verbindung beendet");
                break;
            }
            Err(e) => {
                tracing::warn!(peer = %peer_addr, fehler = %e, "Nicht dekodierbare Anfrage");
                fehler_antwort(&RegistryError::Protokoll(e))
            }
        };

        if let Err(e) = conn.send(&antwort).await {
            tracing::debug!(peer = %peer_addr, fehler = %e, "Antwort nicht gesendet");
            break;
        }
    }

    conn.disconnect().await;
}

/// Beantwortet eine einzelne Anfrage
async fn beantworten(registry: &Registry, peer_addr: SocketAddr, anfrage: &Envelope) -> Envelope {
    let nachricht = match Message::from_envelope(anfrage) {
        Ok(nachricht) => nachricht,
        Err(ProtocolError::UnbekannterTag(tag)) => return nicht_unterstuetzt(&tag),
        Err(e) => return fehler_antwort(&RegistryError::Protokoll(e)),
    };
    tracing::debug!(peer = %peer_addr, tag = nachricht.tag(), "Metaserver-Anfrage");

    match nachricht {
        Message::Register(RegisterServerMessage(beschreibung))
        | Message::Update(UpdateServerMessage(beschreibung)) => {
            let beschreibung = adresse_ergaenzen(beschreibung, peer_addr);
            match registry.advertise(beschreibung).await {
                Ok(_) => OkMessage.to_envelope(),
                Err(e) => fehler_antwort(&e),
            }
        }
        Message::Remove(abmeldung) => {
            let adresse = if abmeldung.address.is_empty() {
                peer_addr.ip().to_string()
            } else {
                abmeldung.address
            };
            registry.remove(&adresse, abmeldung.port);
            OkMessage.to_envelope()
        }
        Message::ServerList(_) => ServerListMessage {
            servers: registry.list().iter().map(|e| e.listing()).collect(),
        }
        .to_envelope(),
        andere => nicht_unterstuetzt(andere.tag()),
    }
}

fn adresse_ergaenzen(mut beschreibung: ServerDescription, peer_addr: SocketAddr) -> ServerDescription {
    if beschreibung.address.is_empty() {
        beschreibung.address = peer_addr.ip().to_string();
    }
    beschreibung
}

fn fehler_antwort(fehler: &RegistryError) -> Envelope {
    ErrorMessage::new(fehler.message_id(), fehler.to_string()).to_envelope()
}

fn nicht_unterstuetzt(tag: &str) -> Envelope {
    ErrorMessage::new(
        "metaServer.unsupportedMessage",
        format!("Message '{tag}' is not handled by the metaserver"),
    )
    .to_envelope()
}

//! Transport-Verbindung zu einem Peer
//!
//! Nutzt den `FrameCodec` fuer das Wire-Format (u32 BE length + JSON).
//! Wird von Clients, vom Metaserver-Melder des Spielservers und von der
//! Erreichbarkeitspruefung des Metaservers verwendet. Alle Operationen
//! sind async; `disconnect` ist idempotent.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::envelope::Envelope;
use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::FrameCodec;

/// Bidirektionale Envelope-Verbindung ueber TCP
pub struct Connection {
    /// `None` nach `disconnect`
    framed: Option<Framed<TcpStream, FrameCodec>>,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Baut eine TCP-Verbindung auf
    pub async fn connect(addr: impl ToSocketAddrs) -> ProtocolResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream, FrameCodec::new())
    }

    /// Baut eine TCP-Verbindung mit Frist fuer den Verbindungsaufbau auf
    pub async fn connect_timeout(
        addr: impl ToSocketAddrs,
        frist: Duration,
    ) -> ProtocolResult<Self> {
        match tokio::time::timeout(frist, TcpStream::connect(addr)).await {
            Ok(stream) => Self::from_stream(stream?, FrameCodec::new()),
            Err(_) => Err(ProtocolError::Timeout),
        }
    }

    /// Uebernimmt einen bereits verbundenen Stream
    pub fn from_stream(stream: TcpStream, codec: FrameCodec) -> ProtocolResult<Self> {
        let peer_addr = stream.peer_addr()?;
        tracing::debug!(peer = %peer_addr, "Transport-Verbindung hergestellt");
        Ok(Self {
            framed: Some(Framed::new(stream, codec)),
            peer_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    fn framed(&mut self) -> ProtocolResult<&mut Framed<TcpStream, FrameCodec>> {
        self.framed.as_mut().ok_or(ProtocolError::VerbindungGetrennt)
    }

    /// Sendet einen Envelope
    pub async fn send(&mut self, envelope: &Envelope) -> ProtocolResult<()> {
        let ergebnis = self.framed()?.send(envelope.clone()).await;
        if let Err(ref e) = ergebnis {
            if e.ist_transportfehler() {
                self.framed = None;
            }
        }
        ergebnis
    }

    /// Wartet auf den naechsten Envelope
    ///
    /// Ein geschlossener Stream liefert `VerbindungGetrennt` und
    /// markiert die Verbindung als getrennt. Eine nicht dekodierbare
    /// Payload liefert ihren Fehler, die Verbindung bleibt bestehen.
    pub async fn receive(&mut self) -> ProtocolResult<Envelope> {
        let naechster = self.framed()?.next().await;
        match naechster {
            Some(Ok(payload)) => payload,
            Some(Err(e)) => {
                if e.ist_transportfehler() {
                    self.framed = None;
                }
                Err(e)
            }
            None => {
                tracing::debug!(peer = %self.peer_addr, "Verbindung vom Peer getrennt");
                self.framed = None;
                Err(ProtocolError::VerbindungGetrennt)
            }
        }
    }

    /// Wie `receive`, aber mit Frist
    pub async fn receive_timeout(&mut self, frist: Duration) -> ProtocolResult<Envelope> {
        match tokio::time::timeout(frist, self.receive()).await {
            Ok(ergebnis) => ergebnis,
            Err(_) => Err(ProtocolError::Timeout),
        }
    }

    /// Sendet eine Anfrage und wartet auf die naechste eingehende Nachricht
    pub async fn ask(&mut self, envelope: &Envelope, frist: Duration) -> ProtocolResult<Envelope> {
        self.send(envelope).await?;
        self.receive_timeout(frist).await
    }

    /// Trennt die Verbindung; mehrfacher Aufruf ist wirkungslos
    pub async fn disconnect(&mut self) {
        if let Some(mut framed) = self.framed.take() {
            if let Err(e) = framed.close().await {
                tracing::debug!(peer = %self.peer_addr, fehler = %e, "Fehler beim Schliessen");
            }
            tracing::debug!(peer = %self.peer_addr, "Transport-Verbindung getrennt");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

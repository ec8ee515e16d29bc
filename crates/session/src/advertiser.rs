//! Melder – haelt den Eintrag des Servers im Metaserver aktuell
//!
//! Die Sitzungsschicht ruft `refresh` nach jeder Aenderung an der
//! Teilnehmerzahl oder am Zustand auf. Fehlschlaege werden protokolliert
//! und nicht wiederholt; der naechste `refresh` traegt ohnehin den
//! aktuellen Stand.

use neuwelt_protocol::messages::{
    Message, RegisterServerMessage, RemoveServerMessage, ServerDescription, TypedMessage,
    UpdateServerMessage,
};
use neuwelt_protocol::{Connection, Envelope, ProtocolError, ProtocolResult, ServerState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Momentaufnahme dessen, was der Server ueber sich veroeffentlicht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAdvert {
    pub name: String,
    pub port: u16,
    pub slots_available: u32,
    pub currently_playing: u32,
    pub is_game_started: bool,
    pub version: String,
    pub state: ServerState,
}

impl ServerAdvert {
    /// Beschreibung fuer den Metaserver mit der oeffentlichen Adresse
    pub fn beschreibung(&self, adresse: &str) -> ServerDescription {
        ServerDescription {
            name: self.name.clone(),
            address: adresse.to_string(),
            port: self.port,
            slots_available: self.slots_available,
            currently_playing: self.currently_playing,
            is_game_started: self.is_game_started,
            version: self.version.clone(),
            game_state: self.state.code(),
        }
    }
}

/// Empfaenger von Eintrags-Aktualisierungen
pub trait Advertiser: Send + Sync + 'static {
    fn refresh(&self, advert: ServerAdvert);
}

/// Veroeffentlicht nichts (Server ohne Metaserver)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvertiser;

impl Advertiser for NoAdvertiser {
    fn refresh(&self, advert: ServerAdvert) {
        tracing::trace!(
            plaetze = advert.slots_available,
            spielend = advert.currently_playing,
            "Kein Metaserver konfiguriert"
        );
    }
}

// ---------------------------------------------------------------------------
// MetaServerAdvertiser
// ---------------------------------------------------------------------------

/// Ziel und Serialisierung der Anfragen an den Metaserver
#[derive(Debug)]
struct MeldeZiel {
    /// "host:port" des Metaservers
    metaserver: String,
    /// Adresse, unter der Clients diesen Server erreichen
    oeffentliche_adresse: String,
    frist: Duration,
    /// Haelt Anfragen in Reihenfolge; nach `abmelden` gesetzt
    sperre: tokio::sync::Mutex<bool>,
}

impl MeldeZiel {
    /// Sendet eine Anfrage und erwartet `ok`
    async fn anfrage(&self, nachricht: &Envelope) -> ProtocolResult<()> {
        let mut verbindung = Connection::connect_timeout(&self.metaserver, self.frist).await?;
        let antwort = verbindung.ask(nachricht, self.frist).await;
        verbindung.disconnect().await;

        match Message::from_envelope(&antwort?)? {
            Message::Ok(_) => Ok(()),
            Message::Error(fehler) => Err(ProtocolError::malformed(
                nachricht.tag(),
                format!(
                    "Metaserver lehnt ab: {}",
                    fehler.message.unwrap_or(fehler.message_id)
                ),
            )),
            andere => Err(ProtocolError::malformed(
                nachricht.tag(),
                format!("unerwartete Antwort '{}'", andere.tag()),
            )),
        }
    }

    /// `update` mit dem Stand von `advert`; nach der Abmeldung wirkungslos
    async fn aktualisieren(&self, advert: &ServerAdvert) -> ProtocolResult<bool> {
        let abgemeldet = self.sperre.lock().await;
        if *abgemeldet {
            return Ok(false);
        }
        let nachricht =
            UpdateServerMessage(advert.beschreibung(&self.oeffentliche_adresse)).to_envelope();
        self.anfrage(&nachricht).await?;
        Ok(true)
    }
}

type AdvertRx = watch::Receiver<Option<ServerAdvert>>;

/// Meldet den Server bei einem Metaserver an
///
/// `refresh` legt nur den neuesten Stand in einen `watch`-Kanal. Ein
/// einzelner Task sendet ihn der Reihe nach; Zwischenstaende, die vor dem
/// naechsten Senden ueberschrieben werden, entfallen.
#[derive(Debug, Clone)]
pub struct MetaServerAdvertiser {
    ziel: Arc<MeldeZiel>,
    neuester: Arc<watch::Sender<Option<ServerAdvert>>>,
    /// Empfaenger bis zum Start des Tasks beim ersten `refresh`
    arbeiter: Arc<Mutex<Option<AdvertRx>>>,
}

impl MetaServerAdvertiser {
    pub fn neu(
        metaserver: impl Into<String>,
        oeffentliche_adresse: impl Into<String>,
        frist: Duration,
    ) -> Self {
        let (neuester, rx) = watch::channel(None);
        Self {
            ziel: Arc::new(MeldeZiel {
                metaserver: metaserver.into(),
                oeffentliche_adresse: oeffentliche_adresse.into(),
                frist,
                sperre: tokio::sync::Mutex::new(false),
            }),
            neuester: Arc::new(neuester),
            arbeiter: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Erstanmeldung (beim Serverstart)
    pub async fn registrieren(&self, advert: &ServerAdvert) -> ProtocolResult<()> {
        let _reihenfolge = self.ziel.sperre.lock().await;
        let nachricht =
            RegisterServerMessage(advert.beschreibung(&self.ziel.oeffentliche_adresse))
                .to_envelope();
        self.ziel.anfrage(&nachricht).await
    }

    /// Abmeldung (beim Herunterfahren); spaetere `refresh` senden nichts mehr
    pub async fn abmelden(&self, port: u16) -> ProtocolResult<()> {
        let mut abgemeldet = self.ziel.sperre.lock().await;
        *abgemeldet = true;
        let nachricht = RemoveServerMessage {
            address: self.ziel.oeffentliche_adresse.clone(),
            port,
        }
        .to_envelope();
        self.ziel.anfrage(&nachricht).await
    }

    fn arbeiter_starten(&self) {
        let Some(mut rx) = self.arbeiter.lock().take() else {
            return;
        };
        let ziel = Arc::clone(&self.ziel);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let advert = rx.borrow_and_update().clone();
                let Some(advert) = advert else {
                    continue;
                };
                match ziel.aktualisieren(&advert).await {
                    Ok(true) => tracing::debug!(
                        metaserver = %ziel.metaserver,
                        plaetze = advert.slots_available,
                        "Metaserver-Eintrag aktualisiert"
                    ),
                    Ok(false) => {}
                    Err(e) => tracing::warn!(
                        metaserver = %ziel.metaserver,
                        fehler = %e,
                        "Metaserver-Aktualisierung fehlgeschlagen"
                    ),
                }
            }
            tracing::debug!(metaserver = %ziel.metaserver, "Melde-Task beendet");
        });
    }
}

impl Advertiser for MetaServerAdvertiser {
    fn refresh(&self, advert: ServerAdvert) {
        self.neuester.send_replace(Some(advert));
        self.arbeiter_starten();
    }
}

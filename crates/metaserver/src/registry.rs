//! Verzeichnis – angemeldete Spielserver mit Zeitstempel
//!
//! Eintraege sind eindeutig nach (Adresse, Port). Jede Anmeldung prueft
//! zuerst die Erreichbarkeit mit einem kurzen Verbindungsaufbau; erst
//! danach wird die Liste unter der Mutex veraendert. Ein periodischer
//! Sweep entfernt Eintraege, die laenger als `stale_after` nicht
//! aufgefrischt wurden.

use chrono::{DateTime, Utc};
use neuwelt_protocol::messages::{ServerDescription, ServerListing};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{RegistryError, RegistryResult};

/// Standard-Periode des Sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Standard-Alter, ab dem ein Eintrag als tot gilt
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(90);
/// Standard-Frist der Erreichbarkeitspruefung
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// ServerInfo
// ---------------------------------------------------------------------------

/// Ein Eintrag im Verzeichnis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub description: ServerDescription,
    pub last_updated: DateTime<Utc>,
}

impl ServerInfo {
    fn gehoert_zu(&self, adresse: &str, port: u16) -> bool {
        self.description.address == adresse && self.description.port == port
    }

    /// Wire-Form fuer die Serverliste
    pub fn listing(&self) -> ServerListing {
        ServerListing {
            description: self.description.clone(),
            last_updated_ms: self.last_updated.timestamp_millis(),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Zeitparameter des Verzeichnisses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub probe_timeout: Duration,
    pub sweep_interval: Duration,
    pub stale_after: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

impl RegistryConfig {
    /// Prueft die Zeitparameter
    ///
    /// Das Hoechstalter muss die Sweep-Periode uebersteigen, sonst
    /// koennte ein regelmaessig auffrischender Server zwischen zwei
    /// Meldungen entfernt werden.
    pub fn pruefen(&self) -> RegistryResult<()> {
        if self.sweep_interval.is_zero() {
            return Err(RegistryError::Konfiguration(
                "sweep_interval darf nicht 0 sein".into(),
            ));
        }
        if self.stale_after <= self.sweep_interval {
            return Err(RegistryError::Konfiguration(format!(
                "stale_after ({:?}) muss groesser als sweep_interval ({:?}) sein",
                self.stale_after, self.sweep_interval
            )));
        }
        if self.probe_timeout.is_zero() {
            return Err(RegistryError::Konfiguration(
                "probe_timeout darf nicht 0 sein".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Verzeichnis der laufenden Spielserver
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    stale_after: chrono::Duration,
    eintraege: Mutex<Vec<ServerInfo>>,
}

impl Registry {
    pub fn neu(config: RegistryConfig) -> RegistryResult<Self> {
        config.pruefen()?;
        let stale_after = chrono::Duration::from_std(config.stale_after)
            .map_err(|e| RegistryError::Konfiguration(format!("stale_after: {e}")))?;
        Ok(Self {
            config,
            stale_after,
            eintraege: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Meldet einen Server an oder frischt seinen Eintrag auf
    ///
    /// Ist der Server nicht erreichbar, bleibt das Verzeichnis unveraendert.
    /// Gibt `true` zurueck, wenn der Eintrag neu ist.
    pub async fn advertise(&self, description: ServerDescription) -> RegistryResult<bool> {
        self.erreichbarkeit_pruefen(&description.address, description.port)
            .await?;
        Ok(self.eintragen(description, Utc::now()))
    }

    /// Verbindet sich kurz mit dem Server und schliesst sofort wieder
    async fn erreichbarkeit_pruefen(&self, adresse: &str, port: u16) -> RegistryResult<()> {
        let verbindung =
            tokio::time::timeout(self.config.probe_timeout, TcpStream::connect((adresse, port)))
                .await;
        let fehler = match verbindung {
            Ok(Ok(stream)) => {
                drop(stream);
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(_) => std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Erreichbarkeitspruefung abgelaufen",
            ),
        };
        tracing::warn!(adresse, port, fehler = %fehler, "Server nicht erreichbar");
        Err(RegistryError::Unerreichbar {
            adresse: adresse.to_string(),
            port,
            quelle: fehler,
        })
    }

    fn eintragen(&self, description: ServerDescription, jetzt: DateTime<Utc>) -> bool {
        let mut eintraege = self.eintraege.lock();
        let vorhanden = eintraege
            .iter()
            .position(|e| e.gehoert_zu(&description.address, description.port));
        match vorhanden {
            Some(index) => {
                let eintrag = &mut eintraege[index];
                tracing::debug!(
                    name = %description.name,
                    adresse = %description.address,
                    port = description.port,
                    "Server aktualisiert"
                );
                eintrag.description = description;
                eintrag.last_updated = jetzt;
                false
            }
            None => {
                tracing::info!(
                    name = %description.name,
                    adresse = %description.address,
                    port = description.port,
                    "Server hinzugefuegt"
                );
                eintraege.push(ServerInfo {
                    description,
                    last_updated: jetzt,
                });
                true
            }
        }
    }

    /// Kopie aller Eintraege in Anmeldereihenfolge
    pub fn list(&self) -> Vec<ServerInfo> {
        self.eintraege.lock().clone()
    }

    /// Entfernt den Eintrag fuer (Adresse, Port)
    pub fn remove(&self, adresse: &str, port: u16) -> bool {
        let mut eintraege = self.eintraege.lock();
        match eintraege.iter().position(|e| e.gehoert_zu(adresse, port)) {
            Some(index) => {
                let entfernt = eintraege.remove(index);
                tracing::info!(
                    name = %entfernt.description.name,
                    adresse,
                    port,
                    "Server abgemeldet"
                );
                true
            }
            None => {
                tracing::warn!(adresse, port, "Abmeldung eines unbekannten Servers");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.eintraege.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.lock().is_empty()
    }

    /// Entfernt veraltete Eintraege
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Wie `sweep`, mit explizitem Zeitpunkt
    pub fn sweep_at(&self, jetzt: DateTime<Utc>) -> usize {
        let grenze = jetzt - self.stale_after;
        let mut eintraege = self.eintraege.lock();
        let vorher = eintraege.len();
        eintraege.retain(|e| {
            let lebendig = e.last_updated >= grenze;
            if !lebendig {
                tracing::info!(
                    name = %e.description.name,
                    adresse = %e.description.address,
                    port = e.description.port,
                    "Veralteten Server entfernt"
                );
            }
            lebendig
        });
        vorher - eintraege.len()
    }

    /// Startet den periodischen Sweep als eigenen Task
    pub fn start_sweeper(self: &Arc<Self>) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let periode = self.config.sweep_interval;

        let task = tokio::spawn(async move {
            let mut takt = tokio::time::interval(periode);
            takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Der erste Tick kommt sofort
            takt.tick().await;

            loop {
                tokio::select! {
                    _ = takt.tick() => {
                        let entfernt = registry.sweep();
                        tracing::debug!(entfernt, verbleibend = registry.len(), "Sweep durchgefuehrt");
                    }
                    ergebnis = shutdown_rx.changed() => {
                        if ergebnis.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Sweep-Task beendet");
        });

        tracing::info!(periode_sek = periode.as_secs(), "Sweep-Task gestartet");
        SweepHandle { shutdown_tx, task }
    }
}

// ---------------------------------------------------------------------------
// SweepHandle
// ---------------------------------------------------------------------------

/// Steuerung des laufenden Sweep-Tasks
#[derive(Debug)]
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    pub fn laeuft(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stoppt den Sweep und wartet auf das Ende des Tasks
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(fehler = %e, "Sweep-Task abgebrochen");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn beschreibung(adresse: &str, port: u16) -> ServerDescription {
        ServerDescription {
            name: "Karibik".into(),
            address: adresse.into(),
            port,
            slots_available: 4,
            currently_playing: 0,
            is_game_started: false,
            version: "0.1.0".into(),
            game_state: 0,
        }
    }

    fn registry() -> Registry {
        Registry::neu(RegistryConfig::default()).unwrap()
    }

    #[test]
    fn config_verlangt_alter_ueber_periode() {
        let gleich = RegistryConfig {
            stale_after: DEFAULT_SWEEP_INTERVAL,
            ..RegistryConfig::default()
        };
        assert!(matches!(gleich.pruefen(), Err(RegistryError::Konfiguration(_))));
        assert!(Registry::neu(gleich).is_err());
        assert!(RegistryConfig::default().pruefen().is_ok());
    }

    #[test]
    fn eintragen_ist_eindeutig_nach_adresse_und_port() {
        let r = registry();
        let t0 = Utc::now();
        assert!(r.eintragen(beschreibung("10.0.0.1", 3541), t0));
        assert!(r.eintragen(beschreibung("10.0.0.1", 3542), t0));

        let mut neu = beschreibung("10.0.0.1", 3541);
        neu.currently_playing = 3;
        let t1 = t0 + chrono::Duration::seconds(10);
        assert!(!r.eintragen(neu, t1));

        let liste = r.list();
        assert_eq!(liste.len(), 2);
        assert_eq!(liste[0].description.currently_playing, 3);
        assert_eq!(liste[0].last_updated, t1);
    }

    #[test]
    fn liste_ist_kopie() {
        let r = registry();
        r.eintragen(beschreibung("10.0.0.1", 3541), Utc::now());
        let kopie = r.list();
        r.remove("10.0.0.1", 3541);
        assert_eq!(kopie.len(), 1);
        assert!(r.is_empty());
    }

    #[test]
    fn unbekannten_server_entfernen() {
        let r = registry();
        assert!(!r.remove("10.0.0.9", 1));
    }

    #[test]
    fn sweep_entfernt_nur_veraltete() {
        let r = registry();
        let t0 = Utc::now();
        r.eintragen(beschreibung("10.0.0.1", 3541), t0);
        r.eintragen(beschreibung("10.0.0.2", 3541), t0 + chrono::Duration::seconds(60));

        assert_eq!(r.sweep_at(t0 + chrono::Duration::seconds(90)), 0);
        assert_eq!(r.sweep_at(t0 + chrono::Duration::seconds(91)), 1);
        let liste = r.list();
        assert_eq!(liste.len(), 1);
        assert_eq!(liste[0].description.address, "10.0.0.2");
    }

    #[test]
    fn auffrischen_rettet_vor_dem_sweep() {
        let r = registry();
        let t0 = Utc::now();
        r.eintragen(beschreibung("10.0.0.1", 3541), t0);
        for i in 1..=5 {
            let t = t0 + chrono::Duration::seconds(60 * i);
            r.eintragen(beschreibung("10.0.0.1", 3541), t);
            assert_eq!(r.sweep_at(t + chrono::Duration::seconds(30)), 0);
        }
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn listing_traegt_millisekunden() {
        use chrono::TimeZone;
        let t = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let info = ServerInfo {
            description: beschreibung("10.0.0.1", 3541),
            last_updated: t,
        };
        assert_eq!(info.listing().last_updated_ms, 1_700_000_000_123);
    }
}

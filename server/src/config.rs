//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass Spielserver und Metaserver ohne
//! Konfigurationsdatei lauffaehig sind.

use anyhow::Context;
use neuwelt_core::NationId;
use neuwelt_metaserver::RegistryConfig;
use neuwelt_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::Duration;

/// Vollstaendige Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Spiel- und Sitzungseinstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Metaserver (Anmeldung bzw. Betrieb)
    pub metaserver: MetaserverEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Spiel- und Sitzungseinstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Protokollversion (leer = Paketversion)
    pub version: Option<String>,
    /// Einzelspieler-Partie (kein Metaserver, kein Spielende durch Admin)
    pub single_player: bool,
    /// Spielbare Nationen in Vergabereihenfolge
    pub nations: Vec<String>,
    /// Fester Admin-Name (leer = erster Beitretender)
    pub admin: Option<String>,
    /// Wartezeit eines Logins auf das Spiel in Sekunden
    pub login_timeout_sek: u64,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_size: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        let sitzung = SessionConfig::default();
        Self {
            name: sitzung.server_name,
            version: None,
            single_player: false,
            nations: sitzung
                .nations
                .iter()
                .map(|n| n.as_str().to_string())
                .collect(),
            admin: None,
            login_timeout_sek: sitzung.login_timeout.as_secs(),
            max_frame_size: sitzung.max_frame_size,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer Spielserver und Metaserver
    pub bind_adresse: String,
    /// Port des Spielservers
    pub port: u16,
    /// Adresse, unter der Clients den Spielserver erreichen
    /// (leer = der Metaserver nimmt die Absender-IP)
    pub public_adresse: Option<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3541,
            public_adresse: None,
        }
    }
}

/// Metaserver-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaserverEinstellungen {
    /// Spielserver meldet sich beim Metaserver an
    pub enabled: bool,
    /// Host des Metaservers
    pub adresse: String,
    /// Port des Metaservers
    pub port: u16,
    /// Periode des Sweeps in Sekunden
    pub sweep_interval_sek: u64,
    /// Alter in Sekunden, ab dem ein Eintrag entfernt wird
    pub stale_after_sek: u64,
    /// Frist der Erreichbarkeitspruefung in Sekunden
    pub probe_timeout_sek: u64,
}

impl Default for MetaserverEinstellungen {
    fn default() -> Self {
        let registry = RegistryConfig::default();
        Self {
            enabled: false,
            adresse: "127.0.0.1".into(),
            port: 3540,
            sweep_interval_sek: registry.sweep_interval.as_secs(),
            stale_after_sek: registry.stale_after.as_secs(),
            probe_timeout_sek: registry.probe_timeout.as_secs(),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config: Self = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.server.nations.is_empty() {
            anyhow::bail!("[server] nations darf nicht leer sein");
        }
        if self.server.login_timeout_sek == 0 {
            anyhow::bail!("[server] login_timeout_sek muss groesser als 0 sein");
        }
        self.registry_config()
            .pruefen()
            .map_err(|e| anyhow::anyhow!("[metaserver] {e}"))?;
        Ok(())
    }

    /// Konfiguration der Sitzungsschicht
    pub fn session_config(&self) -> SessionConfig {
        let standard = SessionConfig::default();
        SessionConfig {
            server_name: self.server.name.clone(),
            version: self.server.version.clone().unwrap_or(standard.version),
            single_player: self.server.single_player,
            nations: self.server.nations.iter().map(NationId::new).collect(),
            admin: self.server.admin.clone(),
            login_timeout: Duration::from_secs(self.server.login_timeout_sek),
            port: self.netzwerk.port,
            max_frame_size: self.server.max_frame_size,
        }
    }

    /// Zeitparameter des Verzeichnisses
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            probe_timeout: Duration::from_secs(self.metaserver.probe_timeout_sek),
            sweep_interval: Duration::from_secs(self.metaserver.sweep_interval_sek),
            stale_after: Duration::from_secs(self.metaserver.stale_after_sek),
        }
    }

    /// Bind-Adresse des Spielservers
    pub fn spiel_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        self.bind_adresse(self.netzwerk.port)
    }

    /// Bind-Adresse des Metaservers
    pub fn metaserver_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        self.bind_adresse(self.metaserver.port)
    }

    fn bind_adresse(&self, port: u16) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .netzwerk
            .bind_adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.netzwerk.bind_adresse))?;
        Ok(SocketAddr::new(ip, port))
    }

    /// "host:port", unter dem der Spielserver den Metaserver erreicht
    ///
    /// IPv6-Literale werden in eckige Klammern gesetzt.
    pub fn metaserver_ziel(&self) -> String {
        let host = &self.metaserver.adresse;
        if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{host}]:{}", self.metaserver.port)
        } else {
            format!("{host}:{}", self.metaserver.port)
        }
    }
}

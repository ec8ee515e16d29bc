//! neuwelt-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Sitzungsschicht und Metaserver zu den beiden
//! Binaries `neuwelt-server` und `neuwelt-metaserver`.

pub mod config;
pub mod logging;

use anyhow::{Context, Result};
use config::ServerConfig;
use neuwelt_metaserver::{MetaServer, Registry};
use neuwelt_session::{
    Advertiser, MetaServerAdvertiser, NoAdvertiser, RoundRobinRules, SessionServer, SessionState,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Frist fuer Anfragen des Spielservers an den Metaserver
const MELDER_FRIST: Duration = Duration::from_secs(5);

/// Der Spielserver mit gebundenem Listener
pub struct Server {
    pub config: ServerConfig,
    state: Arc<SessionState<RoundRobinRules>>,
    listener: SessionServer<RoundRobinRules>,
    melder: Option<MetaServerAdvertiser>,
}

impl Server {
    /// Legt Sitzungszustand und leeres Spiel an und bindet den Listener
    pub async fn binden(config: ServerConfig) -> Result<Self> {
        let sitzung = config.session_config();
        let melder = (config.metaserver.enabled && !sitzung.single_player).then(|| {
            MetaServerAdvertiser::neu(
                config.metaserver_ziel(),
                config.netzwerk.public_adresse.clone().unwrap_or_default(),
                MELDER_FRIST,
            )
        });
        let advertiser: Arc<dyn Advertiser> = match &melder {
            Some(m) => Arc::new(m.clone()),
            None => Arc::new(NoAdvertiser),
        };

        let state = SessionState::neu(sitzung, RoundRobinRules, advertiser);
        state.neues_spiel_anlegen()?;

        let bind_addr = config.spiel_bind_adresse()?;
        let listener = SessionServer::binden(Arc::clone(&state), bind_addr)
            .await
            .with_context(|| format!("Spielserver kann {bind_addr} nicht binden"))?;

        Ok(Self {
            config,
            state,
            listener,
            melder,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &Arc<SessionState<RoundRobinRules>> {
        &self.state
    }

    /// Laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        self.laufen(ctrl_c()).await
    }

    /// Nimmt Verbindungen an, bis `shutdown` abgeschlossen ist
    ///
    /// Reihenfolge:
    /// 1. Beim Metaserver anmelden (falls aktiviert)
    /// 2. Auf Shutdown warten
    /// 3. Partie beenden, damit alle Clients `gameEnded` erhalten
    /// 4. Metaserver-Eintrag entfernen, Listener und Verbindungen stoppen
    pub async fn laufen(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let Self {
            config,
            state,
            listener,
            melder,
        } = self;
        tracing::info!(
            server_name = %state.config.server_name,
            adresse = %listener.local_addr()?,
            version = %state.config.version,
            "Spielserver bereit"
        );

        if let Some(m) = &melder {
            match m.registrieren(&state.advert()).await {
                Ok(()) => tracing::info!(
                    metaserver = %config.metaserver_ziel(),
                    "Beim Metaserver angemeldet"
                ),
                Err(e) => tracing::warn!(
                    metaserver = %config.metaserver_ziel(),
                    fehler = %e,
                    "Anmeldung beim Metaserver fehlgeschlagen"
                ),
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept = tokio::spawn(listener.starten(shutdown_rx));

        shutdown.await;
        tracing::info!("Shutdown-Signal empfangen, Spielserver wird beendet");
        if !state.server_state().is_terminal() {
            if let Err(e) = state.end_game(None) {
                tracing::warn!(fehler = %e, "Partie konnte nicht beendet werden");
            }
        }

        if let Some(m) = &melder {
            if let Err(e) = m.abmelden(state.config.port).await {
                tracing::warn!(fehler = %e, "Abmeldung beim Metaserver fehlgeschlagen");
            }
        }

        let _ = shutdown_tx.send(true);
        accept.await??;
        Ok(())
    }
}

/// Der Metaserver als eigener Dienst
pub struct MetaDienst {
    pub config: ServerConfig,
}

impl MetaDienst {
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        self.laufen(ctrl_c()).await
    }

    /// Startet Verzeichnis, Sweep und Listener bis `shutdown` abgeschlossen ist
    pub async fn laufen(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let registry = Arc::new(Registry::neu(self.config.registry_config())?);
        let sweeper = registry.start_sweeper();

        let bind_addr = self.config.metaserver_bind_adresse()?;
        let server = MetaServer::binden(Arc::clone(&registry), bind_addr)
            .await
            .with_context(|| format!("Metaserver kann {bind_addr} nicht binden"))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = tokio::spawn(server.starten(shutdown_rx));

        shutdown.await;
        tracing::info!("Shutdown-Signal empfangen, Metaserver wird beendet");
        let _ = shutdown_tx.send(true);
        sweeper.stop().await;

        listener.await??;
        Ok(())
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
        std::future::pending::<()>().await;
    }
}

//! Neuwelt Metaserver – Einstiegspunkt

use anyhow::Result;
use neuwelt_server::{config::ServerConfig, logging::logging_initialisieren, MetaDienst};

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var("NEUWELT_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = ServerConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Neuwelt Metaserver wird initialisiert"
    );

    MetaDienst::neu(config).starten().await
}

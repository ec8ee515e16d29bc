//! Logging-Initialisierung fuer beide Binaries
//!
//! `RUST_LOG` hat Vorrang vor allem anderen; danach gelten
//! `NW_LOG_LEVEL` / `NW_LOG_FORMAT` vor den Werten aus `[logging]`.

use crate::config::LoggingEinstellungen;

/// Level und Format nach Anwendung der Umgebungsvariablen
pub fn wirksame_einstellungen(config: &LoggingEinstellungen) -> LoggingEinstellungen {
    LoggingEinstellungen {
        level: std::env::var("NW_LOG_LEVEL").unwrap_or_else(|_| config.level.clone()),
        format: std::env::var("NW_LOG_FORMAT").unwrap_or_else(|_| config.format.clone()),
    }
}

/// Initialisiert tracing-subscriber mit dem konfigurierten Level und Format
pub fn logging_initialisieren(config: &LoggingEinstellungen) {
    use tracing_subscriber::{fmt, EnvFilter};

    let wirksam = wirksame_einstellungen(config);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&wirksam.level));

    match wirksam.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

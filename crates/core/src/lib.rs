//! neuwelt-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Identifikationstypen bereit, die Protokoll,
//! Session-Layer und Metaserver gemeinsam verwenden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{CoreError, Result};
pub use types::{ConnectionId, NationId, PlayerId};

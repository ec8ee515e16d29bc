//! neuwelt-metaserver – Verzeichnisdienst fuer Spielserver
//!
//! Spielserver melden sich mit `register`/`update` an und mit `remove`
//! ab; Clients fragen mit `serverList` die aktuell bekannten Server ab.
//!
//! ## Architektur
//!
//! ```text
//! MetaServer (TCP-Listener, ein Task pro Verbindung)
//!     |
//!     v
//! Registry  (Mutex<Vec<ServerInfo>>, eindeutig nach Adresse + Port)
//!     ^
//!     |
//! SweepHandle (periodischer Task, entfernt veraltete Eintraege)
//! ```

pub mod error;
pub mod registry;
pub mod server;

pub use error::{RegistryError, RegistryResult};
pub use registry::{Registry, RegistryConfig, ServerInfo, SweepHandle};
pub use server::MetaServer;

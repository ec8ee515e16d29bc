//! neuwelt-session – Sitzungsschicht des Spielservers
//!
//! Dieses Crate nimmt Client-Verbindungen an, ordnet sie Spielern zu und
//! verteilt die Folgen jeder Nachricht als `ChangeSet` an genau die
//! Verbindungen, die sie sehen duerfen.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SessionServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  HandlerTable: PreLogin -> PreGame -> InGame
//!     |
//!     v
//! MessageDispatcher  (Tabelle, Dekodierung, Zustandsregel)
//!     |
//!     +-- login_handler   (Beitritt, Wiederbeitritt)
//!     +-- logout_handler  (Verlassen, Spielende durch Admin)
//!     +-- game_handler    (Partie starten, Zug beenden)
//!     |
//!     v
//! ChangeSet --flush--> Hub (Send-Queues aller Verbindungen)
//!
//! SessionState – ServerState + Game hinter einer Mutex, Regeln, Melder
//! ```

pub mod advertiser;
pub mod change;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod game;
pub mod handlers;
pub mod hub;
pub mod player;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use advertiser::{Advertiser, MetaServerAdvertiser, NoAdvertiser, ServerAdvert};
pub use change::{ChangeSet, Priority, Recipient, See};
pub use connection::ClientConnection;
pub use dispatcher::{ConnectionContext, HandlerTable, MessageDispatcher};
pub use error::{RuleViolation, SessionError, SessionResult};
pub use game::{Game, GameOutcome, GameRules, RoundRobinRules};
pub use hub::Hub;
pub use player::ServerPlayer;
pub use server_state::{SessionConfig, SessionCore, SessionState};
pub use tcp::SessionServer;

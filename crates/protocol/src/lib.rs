//! neuwelt-protocol – Sitzungsprotokoll-Definitionen
//!
//! Dieses Crate definiert den selbstbeschreibenden Nachrichten-Envelope
//! (Tag + benannte String-Attribute + verschachtelte Kinder), dessen
//! Wire-Form, die typisierten Nachrichten und die client-seitige
//! Transport-Verbindung.
//!
//! ## Schichten
//!
//! ```text
//! Message (typisiert, Summentyp nach Tag)
//!     |  from_envelope / to_envelope
//!     v
//! Envelope (tag, attributes, children)
//!     |  codec::encode / codec::decode   (JSON)
//!     v
//! FrameCodec (u32 BE Laenge + Payload)
//!     |
//!     v
//! TCP-Stream
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod messages;
pub mod state;
pub mod transport;
pub mod wire;

pub use envelope::{Attributes, Child, Envelope};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{IllegalPolicy, Message, MessageSpec, TypedMessage};
pub use state::ServerState;
pub use transport::Connection;

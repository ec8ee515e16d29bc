//! Handler fuer alle Client-Nachrichten
//!
//! Jeder Handler bekommt den typisierten Inhalt, den Verbindungskontext und
//! den gemeinsamen `SessionState` und liefert eine Aenderungsmenge.
//! Ablehnungen laufen als `RuleViolation` ueber den Fehlerkanal.

pub mod game_handler;
pub mod login_handler;
pub mod logout_handler;

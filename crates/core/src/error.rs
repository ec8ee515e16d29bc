//! Fehlertypen fuer Neuwelt-Grundtypen

use thiserror::Error;

/// Result-Alias fuer das Core-Crate
pub type Result<T> = std::result::Result<T, CoreError>;

/// Fehler beim Umgang mit Grundtypen
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Eine ID konnte nicht aus ihrer Textform gelesen werden
    #[error("Ungueltige ID '{wert}': erwartet {erwartet}")]
    UngueltigeId { wert: String, erwartet: &'static str },
}

impl CoreError {
    /// Erstellt einen Parse-Fehler fuer eine ID
    pub fn ungueltige_id(wert: impl Into<String>, erwartet: &'static str) -> Self {
        Self::UngueltigeId {
            wert: wert.into(),
            erwartet,
        }
    }
}

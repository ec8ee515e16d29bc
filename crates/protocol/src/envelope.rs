//! Nachrichten-Envelope
//!
//! Ein `Envelope` ist die selbstbeschreibende Grundeinheit auf der Leitung:
//! ein Tag, eine flache Menge benannter String-Attribute (Schluessel
//! eindeutig, Reihenfolge erhalten) und beliebig viele Kinder. Kinder sind
//! entweder verschachtelte Envelopes oder opake JSON-Objekte (z.B. der
//! Spielstand in der Login-Antwort).
//!
//! Die typisierten Zugriffsfunktionen (`require`, `bool_or`, ...) liefern
//! `ProtocolError::Malformed`, wenn ein Pflichtattribut fehlt oder sich nicht
//! in den erwarteten Typ wandeln laesst. Unbekannte Attribute werden nie
//! bemaengelt.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, ProtocolResult};

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// Geordnete Attributliste mit eindeutigen Schluesseln
///
/// Auf der Leitung ein JSON-Objekt; doppelte Schluessel sind dort ein
/// Dekodierfehler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Setzt ein Attribut; ein vorhandener Schluessel wird ueberschrieben
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(eintrag) => eintrag.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct AttributesVisitor;

impl<'de> Visitor<'de> for AttributesVisitor {
    type Value = Attributes;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ein Objekt mit String-Attributen")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut eintraege: Vec<(String, String)> =
            Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, String>()? {
            if eintraege.iter().any(|(vorhanden, _)| *vorhanden == k) {
                return Err(serde::de::Error::custom(format!(
                    "doppeltes Attribut '{}'",
                    k
                )));
            }
            eintraege.push((k, v));
        }
        Ok(Attributes(eintraege))
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributesVisitor)
    }
}

// ---------------------------------------------------------------------------
// Kinder
// ---------------------------------------------------------------------------

/// Kind eines Envelopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Child {
    /// Verschachtelte Nachricht
    Envelope(Envelope),
    /// Opakes Unterobjekt, wird vom Protokoll nicht interpretiert
    Object(serde_json::Value),
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Unveraenderlicher Nachrichten-Envelope
///
/// Aufbau ueber die `with_*`-Builder, danach nur noch lesender Zugriff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    tag: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Child>,
}

impl Envelope {
    /// Erstellt einen leeren Envelope mit gegebenem Tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key, value.to_string());
        self
    }

    /// Setzt das Attribut nur, wenn ein Wert vorhanden ist
    pub fn with_optional_attribute(
        self,
        key: impl Into<String>,
        value: Option<impl ToString>,
    ) -> Self {
        match value {
            Some(v) => self.with_attribute(key, v),
            None => self,
        }
    }

    pub fn with_child(mut self, child: Envelope) -> Self {
        self.children.push(Child::Envelope(child));
        self
    }

    pub fn with_object(mut self, object: serde_json::Value) -> Self {
        self.children.push(Child::Object(object));
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }

    // -----------------------------------------------------------------------
    // Schema-Helfer fuer typisierte Nachrichten
    // -----------------------------------------------------------------------

    /// Prueft, dass der Envelope den erwarteten Tag traegt
    pub fn expect_tag(&self, tag: &str) -> ProtocolResult<()> {
        if self.tag == tag {
            Ok(())
        } else {
            Err(ProtocolError::malformed(
                tag,
                format!("falscher Tag '{}'", self.tag),
            ))
        }
    }

    /// Liest ein Pflichtattribut
    pub fn require(&self, key: &str) -> ProtocolResult<&str> {
        self.attribute(key).ok_or_else(|| {
            ProtocolError::malformed(&self.tag, format!("Attribut '{}' fehlt", key))
        })
    }

    /// Liest ein Pflichtattribut und wandelt es per `FromStr`
    pub fn require_parsed<T>(&self, key: &str) -> ProtocolResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let roh = self.require(key)?;
        roh.parse().map_err(|e: T::Err| {
            ProtocolError::malformed(
                &self.tag,
                format!("Attribut '{}' ungueltig ('{}'): {}", key, roh, e),
            )
        })
    }

    /// Liest ein optionales Attribut und wandelt es per `FromStr`
    pub fn optional_parsed<T>(&self, key: &str) -> ProtocolResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if self.attributes.contains_key(key) {
            self.require_parsed(key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Liest ein boolesches Pflichtattribut ("true"/"false")
    pub fn require_bool(&self, key: &str) -> ProtocolResult<bool> {
        let roh = self.require(key)?;
        parse_bool(roh).ok_or_else(|| {
            ProtocolError::malformed(
                &self.tag,
                format!("Attribut '{}' ist kein Boolean: '{}'", key, roh),
            )
        })
    }

    /// Liest ein boolesches Attribut mit Standardwert falls es fehlt
    ///
    /// Ein vorhandener, aber nicht-boolescher Wert ist ein Fehler.
    pub fn bool_or(&self, key: &str, standard: bool) -> ProtocolResult<bool> {
        if self.attributes.contains_key(key) {
            self.require_bool(key)
        } else {
            Ok(standard)
        }
    }

    /// Alle verschachtelten Envelopes mit dem gegebenen Tag
    pub fn child_envelopes<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Envelope> + 'a {
        self.children.iter().filter_map(move |c| match c {
            Child::Envelope(e) if e.tag == tag => Some(e),
            _ => None,
        })
    }

    /// Das erste opake Unterobjekt (falls vorhanden)
    pub fn first_object(&self) -> Option<&serde_json::Value> {
        self.children.iter().find_map(|c| match c {
            Child::Object(o) => Some(o),
            Child::Envelope(_) => None,
        })
    }
}

fn parse_bool(roh: &str) -> Option<bool> {
    match roh {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn beispiel() -> Envelope {
        Envelope::new("login")
            .with_attribute("userName", "Alice")
            .with_attribute("startGame", true)
            .with_attribute("port", 3541)
    }

    #[test]
    fn attribut_ueberschreiben_statt_duplizieren() {
        let env = beispiel().with_attribute("userName", "Bob");
        assert_eq!(env.attributes().len(), 3);
        assert_eq!(env.attribute("userName"), Some("Bob"));
    }

    #[test]
    fn pflichtattribut_fehlt() {
        let env = beispiel();
        let err = env.require("version").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { ref tag, .. } if tag == "login"));
    }

    #[test]
    fn bool_attribut_typpruefung() {
        let env = beispiel().with_attribute("singlePlayer", "ja");
        assert!(env.require_bool("startGame").unwrap());
        assert!(env.bool_or("singlePlayer", true).is_err());
        assert!(!env.bool_or("fehlt", false).unwrap());
    }

    #[test]
    fn zahl_attribut_typpruefung() {
        let env = beispiel().with_attribute("slots", "viele");
        assert_eq!(env.require_parsed::<u16>("port").unwrap(), 3541);
        assert!(env.require_parsed::<u32>("slots").is_err());
        assert_eq!(env.optional_parsed::<u32>("fehlt").unwrap(), None);
    }

    #[test]
    fn falscher_tag_abgelehnt() {
        assert!(beispiel().expect_tag("logout").is_err());
        assert!(beispiel().expect_tag("login").is_ok());
    }

    #[test]
    fn attributreihenfolge_bleibt_erhalten() {
        let json = serde_json::to_string(&beispiel()).unwrap();
        let a = json.find("userName").unwrap();
        let b = json.find("startGame").unwrap();
        let c = json.find("port").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn doppelte_attribute_beim_dekodieren_abgelehnt() {
        let json = r#"{"tag":"x","attributes":{"a":"1","a":"2"}}"#;
        assert!(serde_json::from_str::<Envelope>(json).is_err());
    }

    #[test]
    fn kinder_filtern() {
        let env = Envelope::new("serverList")
            .with_child(Envelope::new("serverInfo").with_attribute("name", "a"))
            .with_object(serde_json::json!({ "karte": 1 }))
            .with_child(Envelope::new("anderes"))
            .with_child(Envelope::new("serverInfo").with_attribute("name", "b"));

        let namen: Vec<_> = env
            .child_envelopes("serverInfo")
            .filter_map(|e| e.attribute("name"))
            .collect();
        assert_eq!(namen, vec!["a", "b"]);
        assert_eq!(env.first_object(), Some(&serde_json::json!({ "karte": 1 })));
    }

    #[test]
    fn leere_listen_werden_weggelassen() {
        let json = serde_json::to_string(&Envelope::new("endTurn")).unwrap();
        assert_eq!(json, r#"{"tag":"endTurn"}"#);
        let zurueck: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, Envelope::new("endTurn"));
    }
}

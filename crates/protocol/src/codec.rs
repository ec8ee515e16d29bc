//! Envelope-Codec – Envelope <-> Bytes
//!
//! Die Payload eines Frames ist ein JSON-Dokument pro Envelope. Die
//! Rahmung (Laengenfeld) uebernimmt `wire::FrameCodec`.

use crate::envelope::Envelope;
use crate::error::ProtocolResult;
use crate::messages::Message;

/// Serialisiert einen Envelope in seine Wire-Payload
pub fn encode(envelope: &Envelope) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Dekodiert eine Wire-Payload in einen Envelope
///
/// Prueft nur die Envelope-Struktur; das Schema der konkreten Nachricht
/// prueft `Message::from_envelope`.
pub fn decode(bytes: &[u8]) -> ProtocolResult<Envelope> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Dekodiert eine Payload direkt in eine typisierte Nachricht
pub fn decode_message(bytes: &[u8]) -> ProtocolResult<Message> {
    Message::from_envelope(&decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    #[test]
    fn encode_decode_round_trip() {
        let env = Envelope::new("logout")
            .with_attribute("reason", "QUIT")
            .with_child(Envelope::new("player").with_attribute("ai", false))
            .with_object(serde_json::json!({ "turn": 12, "nations": ["dutch"] }));

        let bytes = encode(&env).unwrap();
        assert_eq!(decode(&bytes).unwrap(), env);
    }

    #[test]
    fn unbekannte_felder_werden_ignoriert() {
        let bytes = br#"{"tag":"endTurn","prioritaet":3,"attributes":{"neu":"x"}}"#;
        let env = decode(bytes).unwrap();
        assert_eq!(env.tag(), "endTurn");
        assert_eq!(env.attribute("neu"), Some("x"));
    }

    #[test]
    fn kaputtes_json_abgelehnt() {
        assert!(matches!(decode(b"{\"tag\":"), Err(ProtocolError::Json(_))));
        assert!(matches!(
            decode(br#"{"attributes":{}}"#),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn nicht_string_attribut_abgelehnt() {
        let bytes = br#"{"tag":"login","attributes":{"startGame":true}}"#;
        assert!(decode(bytes).is_err());
    }

    #[test]
    fn decode_message_unbekannter_tag() {
        let bytes = encode(&Envelope::new("ufo")).unwrap();
        assert!(matches!(
            decode_message(&bytes),
            Err(ProtocolError::UnbekannterTag(t)) if t == "ufo"
        ));
    }
}

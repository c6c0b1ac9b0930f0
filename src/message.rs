use serde::Serialize;
use serde_json::Value;

/// A data frame delivered to `on_message`.
///
/// Payloads that parse as a JSON document arrive as [`InboundMessage::Structured`];
/// anything else arrives unchanged as [`InboundMessage::Text`].
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Opaque text payload
    Text(String),
    /// Decoded JSON payload
    Structured(Value),
}

impl InboundMessage {
    /// Classify a raw payload. Parse failures fall back to text and are not reported.
    pub fn classify(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => InboundMessage::Structured(value),
            Err(_) => InboundMessage::Text(raw),
        }
    }

    /// Classify a binary payload after lossy UTF-8 decoding
    pub fn classify_bytes(raw: &[u8]) -> Self {
        Self::classify(String::from_utf8_lossy(raw).into_owned())
    }

    /// Text payload, if this message was not structured
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InboundMessage::Text(text) => Some(text),
            InboundMessage::Structured(_) => None,
        }
    }

    /// Decoded payload, if this message was structured
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            InboundMessage::Text(_) => None,
            InboundMessage::Structured(value) => Some(value),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, InboundMessage::Structured(_))
    }
}

/// A payload accepted by `send`
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Sent as-is in a text frame
    Text(String),
    /// Serialized to JSON (non-ASCII kept verbatim) and sent in a text frame
    Json(Value),
}

impl OutboundMessage {
    /// Build a JSON payload from any serializable value
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(OutboundMessage::Json)
    }

    /// Render the wire text for this payload
    pub fn into_text(self) -> Result<String, serde_json::Error> {
        match self {
            OutboundMessage::Text(text) => Ok(text),
            OutboundMessage::Json(value) => serde_json::to_string(&value),
        }
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        OutboundMessage::Text(text)
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        OutboundMessage::Text(text.to_string())
    }
}

impl From<Value> for OutboundMessage {
    fn from(value: Value) -> Self {
        OutboundMessage::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_stays_text() {
        assert_eq!(
            InboundMessage::classify("hello"),
            InboundMessage::Text("hello".to_string())
        );
    }

    #[test]
    fn test_json_object_is_structured() {
        let message = InboundMessage::classify(r#"{"a":1}"#);
        assert_eq!(message, InboundMessage::Structured(json!({"a": 1})));
        assert_eq!(message.as_structured(), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_any_json_document_is_structured() {
        assert_eq!(InboundMessage::classify("123"), InboundMessage::Structured(json!(123)));
        assert_eq!(InboundMessage::classify("[1,2]"), InboundMessage::Structured(json!([1, 2])));
        assert_eq!(
            InboundMessage::classify(r#""quoted""#),
            InboundMessage::Structured(json!("quoted"))
        );
    }

    #[test]
    fn test_malformed_json_falls_back_to_text() {
        let raw = r#"{"a":1"#;
        assert_eq!(InboundMessage::classify(raw).as_text(), Some(raw));
        assert_eq!(InboundMessage::classify("").as_text(), Some(""));
    }

    #[test]
    fn test_binary_payload_decoded() {
        let message = InboundMessage::classify_bytes(br#"{"ok":true}"#);
        assert!(message.is_structured());

        let message = InboundMessage::classify_bytes(&[0x68, 0x69, 0xff]);
        assert_eq!(message.as_text(), Some("hi\u{fffd}"));
    }

    #[test]
    fn test_outbound_json_keeps_unicode() {
        let text = OutboundMessage::from(json!({"message": "这是JSON消息"}))
            .into_text()
            .expect("serializable");
        assert_eq!(text, r#"{"message":"这是JSON消息"}"#);
    }

    #[test]
    fn test_outbound_from_serializable() {
        let message = OutboundMessage::json(&vec!["a", "b"]).expect("serializable");
        assert_eq!(message.into_text().unwrap(), r#"["a","b"]"#);
        assert_eq!(OutboundMessage::from("raw").into_text().unwrap(), "raw");
    }
}

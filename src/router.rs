use crate::handler::CloseInfo;
use crate::message::InboundMessage;
use tokio_tungstenite::tungstenite::Message;

/// Close code for an intentional, normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when the peer's close frame carried no status
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code for a connection lost without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code used when the keepalive gives up on the peer
pub const CLOSE_KEEPALIVE_TIMEOUT: u16 = 1011;

/// What the session loop should do with one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Hand the decoded payload to `on_message`
    Deliver(InboundMessage),
    /// Peer ping: answer with exactly one pong carrying the same payload
    ReplyPong(Vec<u8>),
    /// Pong for one of our pings
    Pong(Vec<u8>),
    /// Peer started the closing handshake
    Close(CloseInfo),
    /// Nothing to do (raw frames)
    Ignore,
}

/// Classify an inbound transport frame.
///
/// Control frames never reach `on_message`.
pub fn route(message: Message) -> Route {
    match message {
        Message::Text(text) => Route::Deliver(InboundMessage::classify(text)),
        Message::Binary(data) => Route::Deliver(InboundMessage::classify_bytes(&data)),
        Message::Ping(payload) => Route::ReplyPong(payload),
        Message::Pong(payload) => Route::Pong(payload),
        Message::Close(frame) => Route::Close(match frame {
            Some(frame) => CloseInfo {
                code: frame.code.into(),
                reason: frame.reason.into_owned(),
            },
            None => CloseInfo {
                code: CLOSE_NO_STATUS,
                reason: String::new(),
            },
        }),
        Message::Frame(_) => Route::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::borrow::Cow;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    #[test]
    fn test_text_frames_are_delivered() {
        assert_eq!(
            route(Message::Text("hello".to_string())),
            Route::Deliver(InboundMessage::Text("hello".to_string()))
        );
        assert_eq!(
            route(Message::Text(r#"{"a":1}"#.to_string())),
            Route::Deliver(InboundMessage::Structured(json!({"a": 1})))
        );
    }

    #[test]
    fn test_binary_frames_are_decoded() {
        assert_eq!(
            route(Message::Binary(b"plain".to_vec())),
            Route::Deliver(InboundMessage::Text("plain".to_string()))
        );
    }

    #[test]
    fn test_ping_replies_with_same_payload() {
        assert_eq!(route(Message::Ping(b"x".to_vec())), Route::ReplyPong(b"x".to_vec()));
        assert_eq!(route(Message::Pong(b"y".to_vec())), Route::Pong(b"y".to_vec()));
    }

    #[test]
    fn test_close_frame_carries_code_and_reason() {
        let frame = CloseFrame {
            code: CloseCode::from(4001),
            reason: Cow::Borrowed("going away"),
        };
        assert_eq!(
            route(Message::Close(Some(frame))),
            Route::Close(CloseInfo {
                code: 4001,
                reason: "going away".to_string()
            })
        );
    }

    #[test]
    fn test_close_without_status() {
        match route(Message::Close(None)) {
            Route::Close(info) => {
                assert_eq!(info.code, CLOSE_NO_STATUS);
                assert!(!info.is_normal());
            }
            other => panic!("unexpected route: {:?}", other),
        }
    }
}

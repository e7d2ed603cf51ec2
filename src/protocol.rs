//! Chat backend event protocol
//!
//! Event names and payload shapes exchanged with the chat backend. The
//! transport is responsible for framing; this module only maps between
//! `(name, payload)` pairs and typed events.

use crate::error::Result;
use crate::language::Language;
use crate::types::{ChatMessage, MessageId, Sender};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JOIN_CHATBOT: &str = "join_chatbot";
pub const USER_MESSAGE: &str = "user_message";
pub const LANGUAGE_CHANGED: &str = "language_changed";
pub const CATEGORY_SELECTED: &str = "category_selected";

pub const CHATBOT_CONNECTED: &str = "chatbot_connected";
pub const CHATBOT_MESSAGE: &str = "chatbot_message";
pub const MESSAGE_SENT: &str = "message_sent";
pub const BOT_TYPING: &str = "bot_typing";
pub const CHATBOT_ERROR: &str = "chatbot_error";

/// Join handshake request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub user_id: String,
    pub username: String,
    pub language: Language,
}

/// A message typed by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    pub message: String,
    pub user_id: String,
    pub language: Language,
    /// Client id of the optimistic log entry, echoed back in `message_sent`
    pub message_id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageChange {
    pub user_id: String,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySelection {
    pub category_id: String,
    pub category_title: String,
    pub user_id: String,
    pub username: String,
    pub language: Language,
}

/// Events the client sends to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    JoinChatbot(JoinRequest),
    UserMessage(UserMessage),
    LanguageChanged(LanguageChange),
    CategorySelected(CategorySelection),
}

impl OutboundEvent {
    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinChatbot(_) => JOIN_CHATBOT,
            OutboundEvent::UserMessage(_) => USER_MESSAGE,
            OutboundEvent::LanguageChanged(_) => LANGUAGE_CHANGED,
            OutboundEvent::CategorySelected(_) => CATEGORY_SELECTED,
        }
    }

    /// JSON payload on the wire
    pub fn payload(&self) -> Result<Value> {
        let value = match self {
            OutboundEvent::JoinChatbot(p) => serde_json::to_value(p)?,
            OutboundEvent::UserMessage(p) => serde_json::to_value(p)?,
            OutboundEvent::LanguageChanged(p) => serde_json::to_value(p)?,
            OutboundEvent::CategorySelected(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }
}

/// Message shape broadcast by the backend
///
/// Every field is optional; the backend is not strict about what it sends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMessage {
    pub message_id: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub text: String,
    /// Unix timestamp in milliseconds
    pub timestamp: Option<i64>,
    pub reply_to: Option<String>,
    /// `"user"` or `"bot"`
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl WireMessage {
    /// Convert into a log entry, using `default_sender` when `type` is absent
    ///
    /// The display timestamp is left at "now"; the log clamps it on append.
    pub fn into_chat_message(self, default_sender: Sender) -> ChatMessage {
        let sender = match self.kind.as_deref() {
            Some("user") => Sender::User,
            Some("bot") => Sender::Bot,
            Some("system") => Sender::System,
            _ => default_sender,
        };
        let server_timestamp = self.timestamp.and_then(millis_to_datetime);

        let mut message = ChatMessage::new(sender, self.text);
        if let Some(id) = self.message_id {
            message.id = id.into();
        }
        message.reply_to = self.reply_to;
        message.server_timestamp = server_timestamp;
        message
    }
}

/// Events the backend sends to the client
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Join acknowledgement
    ChatbotConnected(Value),
    ChatbotMessage(WireMessage),
    /// Broadcast of a user message back to its sender
    MessageSent(WireMessage),
    BotTyping { typing: bool },
    ChatbotError { message: String },
    /// Any event this client does not handle
    Other { name: String, payload: Value },
}

#[derive(Deserialize)]
struct TypingPayload {
    #[serde(default)]
    typing: bool,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: String,
}

impl InboundEvent {
    /// Decode an inbound `(name, payload)` pair
    pub fn decode(name: &str, payload: Value) -> Result<Self> {
        let event = match name {
            CHATBOT_CONNECTED => InboundEvent::ChatbotConnected(payload),
            CHATBOT_MESSAGE => InboundEvent::ChatbotMessage(serde_json::from_value(payload)?),
            MESSAGE_SENT => InboundEvent::MessageSent(serde_json::from_value(payload)?),
            BOT_TYPING => {
                let p: TypingPayload = serde_json::from_value(payload)?;
                InboundEvent::BotTyping { typing: p.typing }
            }
            CHATBOT_ERROR => {
                let message = match payload {
                    Value::String(s) => s,
                    other => serde_json::from_value::<ErrorPayload>(other)?.message,
                };
                InboundEvent::ChatbotError { message }
            }
            _ => InboundEvent::Other {
                name: name.to_string(),
                payload,
            },
        };
        Ok(event)
    }

    /// Event name on the wire
    pub fn name(&self) -> &str {
        match self {
            InboundEvent::ChatbotConnected(_) => CHATBOT_CONNECTED,
            InboundEvent::ChatbotMessage(_) => CHATBOT_MESSAGE,
            InboundEvent::MessageSent(_) => MESSAGE_SENT,
            InboundEvent::BotTyping { .. } => BOT_TYPING,
            InboundEvent::ChatbotError { .. } => CHATBOT_ERROR,
            InboundEvent::Other { name, .. } => name,
        }
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_payload_shape() {
        let event = OutboundEvent::JoinChatbot(JoinRequest {
            user_id: "user_1".to_string(),
            username: "Student".to_string(),
            language: Language::Pl,
        });
        assert_eq!(event.name(), "join_chatbot");
        assert_eq!(
            event.payload().unwrap(),
            json!({"userId": "user_1", "username": "Student", "language": "pl"})
        );
    }

    #[test]
    fn test_category_selected_payload_shape() {
        let event = OutboundEvent::CategorySelected(CategorySelection {
            category_id: "3".to_string(),
            category_title: "Admissions".to_string(),
            user_id: "user_1".to_string(),
            username: "Student".to_string(),
            language: Language::En,
        });
        let payload = event.payload().unwrap();
        assert_eq!(payload["categoryId"], "3");
        assert_eq!(payload["categoryTitle"], "Admissions");
        assert_eq!(payload["language"], "en");
    }

    #[test]
    fn test_decode_chatbot_message() {
        let event = InboundEvent::decode(
            "chatbot_message",
            json!({"messageId": "m1", "text": "Hi there", "userId": "bot", "timestamp": 1700000000000i64, "type": "bot"}),
        )
        .unwrap();

        let InboundEvent::ChatbotMessage(wire) = event else {
            panic!("expected chatbot message");
        };
        let msg = wire.into_chat_message(Sender::Bot);
        assert_eq!(msg.id.as_str(), "m1");
        assert_eq!(msg.text, "Hi there");
        assert_eq!(msg.sender, Sender::Bot);
        assert_eq!(msg.server_timestamp.unwrap().timestamp_millis(), 1700000000000);
    }

    #[test]
    fn test_decode_lenient_message() {
        let event = InboundEvent::decode("message_sent", json!({"text": "Hello"})).unwrap();
        let InboundEvent::MessageSent(wire) = event else {
            panic!("expected message_sent");
        };
        let msg = wire.into_chat_message(Sender::User);
        assert_eq!(msg.sender, Sender::User);
        assert!(msg.id.as_str().starts_with("msg_"));
    }

    #[test]
    fn test_decode_typing_and_error() {
        assert_eq!(
            InboundEvent::decode("bot_typing", json!({"typing": true})).unwrap(),
            InboundEvent::BotTyping { typing: true }
        );
        assert_eq!(
            InboundEvent::decode("chatbot_error", json!({"message": "Bot unavailable"})).unwrap(),
            InboundEvent::ChatbotError {
                message: "Bot unavailable".to_string()
            }
        );
        assert_eq!(
            InboundEvent::decode("chatbot_error", json!("plain")).unwrap(),
            InboundEvent::ChatbotError {
                message: "plain".to_string()
            }
        );
    }

    #[test]
    fn test_decode_unknown_event() {
        let event = InboundEvent::decode("room_users", json!([1, 2])).unwrap();
        assert_eq!(event.name(), "room_users");
        assert!(matches!(event, InboundEvent::Other { .. }));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(InboundEvent::decode("chatbot_message", json!("not an object")).is_err());
    }
}

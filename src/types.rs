//! Core session types for unibot-session
//!
//! Types that cross the wire use camelCase JSON serialization to match
//! the chat backend.

use crate::language::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque message identifier
///
/// Locally created messages use `msg_<uuid>`; messages arriving from the
/// backend keep whatever id the backend assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh client-side id
    pub fn generate() -> Self {
        Self(format!("msg_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
    System,
}

/// A follow-up choice attached to a bot message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// Delivery state of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Delivery {
    /// Appended optimistically, no server echo seen yet
    Pending,
    /// Authoritative (received from the backend, or echo matched)
    #[default]
    Confirmed,
}

/// A single entry in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique within the session
    pub id: MessageId,

    pub sender: Sender,

    /// Raw payload; may be a JSON envelope (see `envelope::parse`)
    pub text: String,

    /// Display timestamp, non-decreasing in log order
    pub timestamp: DateTime<Utc>,

    /// Suggestions extracted from the envelope (bot messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategorySuggestion>>,

    #[serde(default)]
    pub delivery: Delivery,

    /// Id of the message this one answers, when the backend provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    /// Timestamp the backend reported, kept for reference only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Create a message with a generated id and the current time
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            categories: None,
            delivery: Delivery::Confirmed,
            reply_to: None,
            server_timestamp: None,
        }
    }

    /// A locally typed message awaiting the server echo
    pub fn pending_user(text: impl Into<String>) -> Self {
        Self {
            delivery: Delivery::Pending,
            ..Self::new(Sender::User, text)
        }
    }

    /// A client-side notice (language change, etc.)
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text)
    }

    /// Override the id
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == Delivery::Pending
    }
}

/// Transport-level connection phase as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

/// UI-facing session flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub connection_phase: ConnectionPhase,
    pub language: Language,
    pub is_bot_typing: bool,
    /// Only ever true while `connection_phase == Connected`
    pub has_joined: bool,
}

/// Monotonic counter identifying one transport connection instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The generation that supersedes this one
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

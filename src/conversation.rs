//! Conversation log
//!
//! Append-only, ordered record of the messages in one session. Entries are
//! never mutated after append except to confirm a pending local message
//! once the backend echoes it back. Ids are unique within the log: a
//! message whose id is already present is a duplicate delivery and is
//! dropped.

use crate::envelope::{self, MessageContent};
use crate::types::{CategorySuggestion, ChatMessage, Delivery, MessageId, Sender};
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of feeding a server echo to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoOutcome {
    /// Matched a pending local entry, which is now confirmed
    Confirmed,
    /// No match; appended as a new entry
    Appended,
    /// Id already in the log and not pending; dropped
    Duplicate,
}

/// Read-only presentation of one log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub display_text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Suggestions that passed the display filter
    pub suggestions: Vec<CategorySuggestion>,
    pub pending: bool,
}

/// Ordered message log owned by a session
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<ChatMessage>,
    ids: HashSet<MessageId>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the end of the log. Returns false, leaving the
    /// log untouched, if an entry with the same id already exists.
    ///
    /// The entry's timestamp is clamped so it never precedes the previous
    /// entry. Bot messages get their envelope categories extracted.
    pub fn append(&mut self, mut message: ChatMessage) -> bool {
        if self.ids.contains(&message.id) {
            tracing::debug!(id = %message.id, "Dropping duplicate message");
            return false;
        }

        if let Some(last) = self.entries.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }

        if message.sender == Sender::Bot && message.categories.is_none() {
            let categories = envelope::parse(&message.text).categories().to_vec();
            if !categories.is_empty() {
                message.categories = Some(categories);
            }
        }

        tracing::trace!(
            id = %message.id,
            sender = ?message.sender,
            position = self.entries.len(),
            "Message appended"
        );

        self.ids.insert(message.id.clone());
        self.entries.push(message);
        true
    }

    /// Handle the backend's broadcast of a user message
    pub fn reconcile_echo(&mut self, message: ChatMessage) -> EchoOutcome {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|m| m.is_pending() && m.id == message.id)
        {
            existing.delivery = Delivery::Confirmed;
            if existing.reply_to.is_none() {
                existing.reply_to = message.reply_to;
            }
            existing.server_timestamp = message.server_timestamp;
            tracing::debug!(id = %existing.id, "Pending message confirmed by echo");
            return EchoOutcome::Confirmed;
        }

        if self.append(message) {
            EchoOutcome::Appended
        } else {
            EchoOutcome::Duplicate
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Raw entries in display order
    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.entries.iter().find(|m| &m.id == id)
    }

    /// Presentation view of the whole log
    pub fn render(&self) -> Vec<RenderedMessage> {
        self.entries.iter().map(render_message).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }
}

/// Resolve one entry for display
pub fn render_message(message: &ChatMessage) -> RenderedMessage {
    let content = match message.sender {
        // Only bot replies carry envelopes
        Sender::Bot => envelope::parse(&message.text),
        _ => MessageContent::Plain(message.text.clone()),
    };
    let suggestions = message
        .categories
        .as_deref()
        .map(envelope::visible_suggestions)
        .unwrap_or_default();

    RenderedMessage {
        id: message.id.clone(),
        sender: message.sender,
        display_text: content.display_text().to_string(),
        timestamp: message.timestamp,
        suggestions,
        pending: message.is_pending(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_append_preserves_order() {
        let mut log = ConversationLog::new();
        log.append(ChatMessage::new(Sender::User, "one"));
        log.append(ChatMessage::new(Sender::Bot, "two"));
        log.append(ChatMessage::system("three"));

        let texts: Vec<_> = log.render().into_iter().map(|m| m.display_text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let mut log = ConversationLog::new();
        let now = Utc::now();

        let mut late = ChatMessage::new(Sender::User, "late");
        late.timestamp = now + Duration::seconds(30);
        log.append(late);

        let mut early = ChatMessage::new(Sender::Bot, "early");
        early.timestamp = now - Duration::seconds(30);
        log.append(early);

        let mut same = ChatMessage::new(Sender::Bot, "same");
        same.timestamp = now + Duration::seconds(30);
        log.append(same);

        let rendered = log.render();
        assert!(rendered.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(rendered[1].display_text, "early");
        assert_eq!(rendered[2].display_text, "same");
    }

    #[test]
    fn test_echo_confirms_pending_entry() {
        let mut log = ConversationLog::new();
        let local = ChatMessage::pending_user("Hello").with_id("msg_local");
        log.append(local);

        let echo = ChatMessage::new(Sender::User, "Hello").with_id("msg_local");
        assert_eq!(log.reconcile_echo(echo), EchoOutcome::Confirmed);
        assert_eq!(log.len(), 1);
        assert!(!log.entries()[0].is_pending());
    }

    #[test]
    fn test_echo_without_match_appends() {
        let mut log = ConversationLog::new();
        log.append(ChatMessage::pending_user("Hello").with_id("msg_local"));

        let echo = ChatMessage::new(Sender::User, "Hello").with_id("server-42");
        assert_eq!(log.reconcile_echo(echo), EchoOutcome::Appended);
        assert_eq!(log.len(), 2);
        assert!(log.entries()[0].is_pending());
    }

    #[test]
    fn test_echo_does_not_reconfirm() {
        let mut log = ConversationLog::new();
        log.append(ChatMessage::pending_user("Hello").with_id("msg_local"));

        let echo = ChatMessage::new(Sender::User, "Hello").with_id("msg_local");
        assert_eq!(log.reconcile_echo(echo.clone()), EchoOutcome::Confirmed);
        assert_eq!(log.reconcile_echo(echo), EchoOutcome::Duplicate);
        assert_eq!(log.len(), 1);
        assert!(!log.entries()[0].is_pending());
    }

    #[test]
    fn test_duplicate_id_not_appended() {
        let mut log = ConversationLog::new();
        assert!(log.append(ChatMessage::new(Sender::Bot, "Hi there").with_id("b1")));
        assert!(!log.append(ChatMessage::new(Sender::Bot, "Hi again").with_id("b1")));

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].text, "Hi there");
        assert!(log.contains(&MessageId::from("b1")));
    }

    #[test]
    fn test_clear_forgets_ids() {
        let mut log = ConversationLog::new();
        log.append(ChatMessage::new(Sender::Bot, "one").with_id("b1"));
        log.clear();
        assert!(!log.contains(&MessageId::from("b1")));
        assert!(log.append(ChatMessage::new(Sender::Bot, "one").with_id("b1")));
    }

    #[test]
    fn test_bot_envelope_rendered() {
        let mut log = ConversationLog::new();
        let raw = r#"{"text":"Pick one","type":"category_suggestions","categories":[{"id":"1","title":"Admissions","description":"Help with admissions process"},{"id":"2","title":"HI HI","description":"Placeholder category"}]}"#;
        log.append(ChatMessage::new(Sender::Bot, raw));

        let stored = &log.entries()[0];
        assert_eq!(stored.categories.as_ref().map(Vec::len), Some(2));

        let rendered = log.render();
        assert_eq!(rendered[0].display_text, "Pick one");
        assert_eq!(rendered[0].suggestions.len(), 1);
        assert_eq!(rendered[0].suggestions[0].title, "Admissions");
    }

    #[test]
    fn test_user_text_is_never_parsed() {
        let mut log = ConversationLog::new();
        let raw = r#"{"text":"injected","type":"category_suggestions","categories":[{"id":"1","title":"Admissions","description":"Help with admissions process"}]}"#;
        log.append(ChatMessage::new(Sender::User, raw));

        let rendered = log.render();
        assert_eq!(rendered[0].display_text, raw);
        assert!(rendered[0].suggestions.is_empty());
        assert!(log.entries()[0].categories.is_none());
    }

    #[test]
    fn test_clear() {
        let mut log = ConversationLog::new();
        log.append(ChatMessage::new(Sender::User, "one"));
        log.clear();
        assert!(log.is_empty());
        assert!(log.render().is_empty());
    }
}

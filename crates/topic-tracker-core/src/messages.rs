//! Chat message list.
//!
//! The list owns its id counter, so ids are unique and ordered per list and
//! never leak between independent lists (or tests).

use std::fmt;

use chrono::{DateTime, Utc};

/// Identifier of a chat message, issued in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    /// Numeric value of the id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The local user.
    User,
    /// The backend assistant.
    Assistant,
}

impl Role {
    /// Human-readable label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Assistant",
        }
    }
}

/// A message shown in the chat panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Unique id, increasing in creation order.
    pub id: MessageId,
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Check if this is a user message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Ordered chat history with at most one open (still streaming) message.
#[derive(Debug, Default)]
pub struct MessageList {
    messages: Vec<ChatMessage>,
    next_id: u64,
    open: Option<MessageId>,
}

impl MessageList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, role: Role, content: String) -> MessageId {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.messages.push(ChatMessage {
            id,
            role,
            content,
            created_at: Utc::now(),
        });
        id
    }

    /// Append a finished user message.
    pub fn push_user(&mut self, content: impl Into<String>) -> MessageId {
        self.push(Role::User, content.into())
    }

    /// Append a finished assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) -> MessageId {
        self.push(Role::Assistant, content.into())
    }

    /// Append an empty assistant message that receives streaming updates.
    ///
    /// Any previously open message is closed first.
    pub fn open_assistant(&mut self) -> MessageId {
        self.close_open();
        let id = self.push(Role::Assistant, String::new());
        self.open = Some(id);
        id
    }

    /// Replace the content of the open message.
    ///
    /// Returns `false` when no message is open.
    pub fn update_open(&mut self, content: &str) -> bool {
        let Some(id) = self.open else {
            return false;
        };
        match self.messages.iter_mut().rev().find(|m| m.id == id) {
            Some(message) => {
                content.clone_into(&mut message.content);
                true
            }
            None => false,
        }
    }

    /// Freeze the open message. Returns its id if one was open.
    pub fn close_open(&mut self) -> Option<MessageId> {
        self.open.take()
    }

    /// Id of the open message.
    #[must_use]
    pub fn open_id(&self) -> Option<MessageId> {
        self.open
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Iterate in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Remove all messages. Ids keep increasing.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.open = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_in_creation_order() {
        let mut list = MessageList::new();
        let a = list.push_user("Track AI breakthroughs");
        let b = list.open_assistant();
        let c = list.push_assistant("done");
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), "msg-1");
    }

    #[test]
    fn lists_do_not_share_counters() {
        let mut first = MessageList::new();
        first.push_user("one");
        first.push_user("two");

        let mut second = MessageList::new();
        assert_eq!(second.push_user("fresh").get(), 1);
    }

    #[test]
    fn only_open_message_is_mutable() {
        let mut list = MessageList::new();
        assert!(!list.update_open("nothing open"));

        let id = list.open_assistant();
        assert!(list.update_open("Hel"));
        assert!(list.update_open("Hello"));
        assert_eq!(list.get(id).unwrap().content, "Hello");

        assert_eq!(list.close_open(), Some(id));
        assert!(!list.update_open("changed"));
        assert_eq!(list.get(id).unwrap().content, "Hello");
    }

    #[test]
    fn opening_closes_previous() {
        let mut list = MessageList::new();
        let first = list.open_assistant();
        list.update_open("first");
        let second = list.open_assistant();

        assert_eq!(list.open_id(), Some(second));
        list.update_open("second");
        assert_eq!(list.get(first).unwrap().content, "first");
        assert_eq!(list.get(second).unwrap().content, "second");
    }

    #[test]
    fn clear_keeps_counter() {
        let mut list = MessageList::new();
        list.push_user("a");
        list.open_assistant();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.open_id(), None);
        assert_eq!(list.push_user("b").get(), 3);
    }

    #[test]
    fn roles() {
        let mut list = MessageList::new();
        list.push_user("hi");
        list.push_assistant("hello");
        let roles: Vec<bool> = list.iter().map(ChatMessage::is_user).collect();
        assert_eq!(roles, vec![true, false]);
        assert_eq!(Role::Assistant.as_str(), "Assistant");
    }
}

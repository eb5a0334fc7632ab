//! Conversation log shown by the chat panel.
//!
//! Insertion order is the only order. The log holds at most one typing
//! placeholder, and swapping it for the bot reply is a single mutation.

use crate::error::{KioskError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a log entry, unique within one log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who a log entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Bot,
    /// Transient "reply is being computed" marker.
    TypingPlaceholder,
}

/// A single chat entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub kind: MessageKind,
    pub text: String,
}

impl Message {
    /// Whether this entry can be read aloud on demand.
    pub fn is_replayable(&self) -> bool {
        self.kind == MessageKind::Bot
    }
}

/// Ordered message log owned by the session controller.
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
    next_id: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the end.
    ///
    /// # Errors
    ///
    /// Returns [`KioskError::Log`] when appending a second typing placeholder.
    pub fn append(&mut self, kind: MessageKind, text: impl Into<String>) -> Result<MessageId> {
        if kind == MessageKind::TypingPlaceholder && self.has_typing_placeholder() {
            return Err(KioskError::Log("typing placeholder already present".into()));
        }
        let id = self.allocate_id();
        self.messages.push(Message {
            id,
            kind,
            text: text.into(),
        });
        Ok(id)
    }

    /// Swap the typing placeholder for `text` as a bot message, in place.
    ///
    /// Without a placeholder the bot message is appended at the end.
    pub fn replace_typing_placeholder(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        let message = Message {
            id,
            kind: MessageKind::Bot,
            text: text.into(),
        };
        match self.placeholder_index() {
            Some(index) => self.messages[index] = message,
            None => self.messages.push(message),
        }
        id
    }

    /// Drop the typing placeholder. Returns whether one was present.
    pub fn remove_typing_placeholder(&mut self) -> bool {
        match self.placeholder_index() {
            Some(index) => {
                self.messages.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn has_typing_placeholder(&self) -> bool {
        self.placeholder_index().is_some()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Ordered copy of the log for rendering.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn placeholder_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.kind == MessageKind::TypingPlaceholder)
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }
}

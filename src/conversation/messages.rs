//! Conversation message log
//!
//! Assistant replies are staged in a pending slot while they are being spoken
//! and only enter the log once playback completes. Cancelling a turn clears
//! the slot, so the log never shows text the user has not heard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<ConversationMessage>,
    pending_reply: Option<String>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ConversationMessage::user(content));
    }

    /// Hold a reply until it has been spoken. Replaces any earlier pending reply.
    pub fn stage_reply(&mut self, content: impl Into<String>) {
        self.pending_reply = Some(content.into());
    }

    /// Move the pending reply into the log, timestamped now
    pub fn commit_pending(&mut self) -> bool {
        match self.pending_reply.take() {
            Some(content) => {
                self.messages.push(ConversationMessage::assistant(content));
                true
            }
            None => false,
        }
    }

    pub fn discard_pending(&mut self) -> bool {
        self.pending_reply.take().is_some()
    }

    pub fn pending_reply(&self) -> Option<&str> {
        self.pending_reply.as_deref()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.pending_reply = None;
    }

    /// User turns joined by newlines, the input to transcript analysis
    pub fn user_transcript(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

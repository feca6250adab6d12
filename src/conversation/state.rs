//! Conversation state and its shared cell

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AiSpeaking,
    UserSpeaking,
    Processing,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::AiSpeaking => "ai_speaking",
            ConversationState::UserSpeaking => "user_speaking",
            ConversationState::Processing => "processing",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single authoritative conversation state.
///
/// Clones share the same value. `current()` always reads the latest value, so
/// timer callbacks holding a clone observe the state at the moment they run.
/// Observers that want change notifications call `subscribe()`.
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: Arc<watch::Sender<ConversationState>>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConversationState::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> ConversationState {
        *self.tx.borrow()
    }

    /// Unconditionally set the state, returning the previous value
    pub fn set(&self, next: ConversationState) -> ConversationState {
        let previous = self.tx.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "conversation state changed");
        }
        previous
    }

    /// Move from `from` to `to` only if the state is currently `from`.
    ///
    /// The check and the write happen under the channel's lock, so two racing
    /// callers can never both win the same transition.
    pub fn transition(&self, from: ConversationState, to: ConversationState) -> bool {
        let moved = self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(from = %from, to = %to, "conversation state changed");
        }
        moved
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.tx.subscribe()
    }
}

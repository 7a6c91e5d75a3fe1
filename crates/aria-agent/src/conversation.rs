//! Per-session conversation state.
//!
//! A [`ConversationState`] owns the ordered message history of one chat
//! session. It starts with exactly one system message. Only the agent loop
//! appends to it, and only once a turn has completed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aria_llm::{Message, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Create a new random conversation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a turn within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    /// Create a new random turn ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation State
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered message history for one chat session.
#[derive(Debug, Clone)]
pub struct ConversationState {
    id: ConversationId,
    messages: Vec<Message>,
    turn_count: usize,
}

impl ConversationState {
    /// Create a conversation holding a single system message.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            id: ConversationId::new(),
            messages: vec![Message::system(system_prompt)],
            turn_count: 0,
        }
    }

    /// Get the conversation ID.
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The system prompt this conversation was created with.
    pub fn system_prompt(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// Number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether only the system message is present.
    pub fn is_empty(&self) -> bool {
        self.messages.len() <= 1
    }

    /// Number of completed turns.
    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    /// The most recent final assistant answer, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.has_tool_calls())
    }

    /// Start over with the same system prompt under a fresh ID.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
        self.turn_count = 0;
        self.id = ConversationId::new();
    }

    /// Append the messages of a completed turn.
    pub(crate) fn commit_turn(&mut self, staged: Vec<Message>) {
        self.messages.extend(staged);
        self.turn_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_has_system_message() {
        let state = ConversationState::new("You are Aria.");
        assert_eq!(state.len(), 1);
        assert!(state.is_empty());
        assert_eq!(state.messages()[0].role, Role::System);
        assert_eq!(state.system_prompt(), "You are Aria.");
        assert_eq!(state.turn_count(), 0);
        assert!(state.last_assistant().is_none());
    }

    #[test]
    fn test_commit_and_reset() {
        let mut state = ConversationState::new("sys");
        let original_id = state.id();

        state.commit_turn(vec![Message::user("Hi"), Message::assistant("Hello!")]);
        assert_eq!(state.len(), 3);
        assert_eq!(state.turn_count(), 1);
        assert_eq!(state.last_assistant().unwrap().content, "Hello!");

        state.reset();
        assert_eq!(state.len(), 1);
        assert_eq!(state.turn_count(), 0);
        assert_ne!(state.id(), original_id);
        assert_eq!(state.system_prompt(), "sys");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ConversationId::new(), ConversationId::new());
        assert_ne!(TurnId::new(), TurnId::new());
    }
}

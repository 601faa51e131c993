//! Conversation history.
//!
//! An append-only, ordered log of requester and system turns. Nothing here
//! compacts or truncates; retention is up to whoever owns the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Requester,
    System,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub sender: Sender,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn requester(message: impl Into<String>) -> Self {
        Self::new(Sender::Requester, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(Sender::System, message)
    }

    fn new(sender: Sender, message: impl Into<String>) -> Self {
        Self {
            sender,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// All turns in the order they were appended.
    pub fn all(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut history = ConversationHistory::new();
        history.append(ConversationTurn::requester("show AAPL"));
        history.append(ConversationTurn::system("Here is AAPL"));

        let turns = history.all();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].sender, Sender::Requester);
        assert_eq!(turns[0].message, "show AAPL");
        assert_eq!(turns[1].sender, Sender::System);
        assert_eq!(history.last().unwrap().message, "Here is AAPL");
    }

    #[test]
    fn test_serializes_as_turn_list() {
        let mut history = ConversationHistory::new();
        history.append(ConversationTurn::requester("hi"));

        let json = serde_json::to_value(&history).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["sender"], "requester");
        assert_eq!(json[0]["message"], "hi");
    }
}

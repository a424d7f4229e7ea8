use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GREETING: &str =
    "👋 Hi there! I'm your PostgreSQL Query Assistant. Connect to your database and ask me anything!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Chat history of one session, oldest first.
///
/// Always opens with the assistant greeting and only grows through
/// `record_exchange`, so entries after the greeting alternate Human, Assistant.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of completed question/answer cycles.
    pub fn exchanges(&self) -> usize {
        (self.messages.len() - 1) / 2
    }

    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.messages.push(Message::human(question));
        self.messages.push(Message::assistant(answer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_alternates(transcript: &Transcript) {
        let messages = transcript.messages();
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, GREETING);
        for (i, pair) in messages[1..].chunks(2).enumerate() {
            assert_eq!(pair.len(), 2, "exchange {} is incomplete", i);
            assert_eq!(pair[0].role, Role::Human);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    #[test]
    fn test_new_transcript_has_only_greeting() {
        let t = Transcript::new();
        assert_eq!(t.len(), 1);
        assert_eq!(t.exchanges(), 0);
        assert_alternates(&t);
    }

    #[test]
    fn test_exchanges_alternate() {
        let mut t = Transcript::new();
        t.record_exchange("How many rows are in the orders table?", "There are 42 rows.");
        t.record_exchange("And customers?", "Sorry, I couldn't process your request.");

        assert_eq!(t.len(), 5);
        assert_eq!(t.exchanges(), 2);
        assert_alternates(&t);
        assert_eq!(t.messages()[1].content, "How many rows are in the orders table?");
    }

    #[test]
    fn test_serializes_as_message_array() {
        let t = Transcript::new();
        let json = serde_json::to_value(&t).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["role"], "assistant");
        assert_eq!(json[0]["content"], GREETING);
    }
}

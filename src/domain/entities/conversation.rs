use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only log of question/answer turns owned by one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMemory {
    pub id: Uuid,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub at: DateTime<Utc>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        let now = Utc::now();
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
            at: now,
        });
        self.updated_at = now;
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .flat_map(|turn| {
                [
                    Message::new(MessageRole::User, turn.question.as_str()),
                    Message::new(MessageRole::Assistant, turn.answer.as_str()),
                ]
            })
            .collect()
    }

    /// Renders every turn verbatim as `Role: content` lines.
    pub fn transcript(&self) -> String {
        self.messages()
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn last_question(&self) -> Option<&str> {
        self.turns.last().map(|t| t.question.as_str())
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

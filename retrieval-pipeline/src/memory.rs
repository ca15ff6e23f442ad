#![allow(clippy::module_name_repetitions)]
use std::fmt;

use serde::{Deserialize, Serialize};

pub const CHAT_HISTORY_KEY: &str = "chat_history";

#[derive(Deserialize, Debug, Clone, Serialize, PartialEq, Eq)]
pub enum MessageRole {
    User,
    AI,
    System,
}

#[derive(Deserialize, Debug, Clone, Serialize, PartialEq, Eq)]
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

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageRole::AI, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "User"),
            MessageRole::AI => write!(f, "AI"),
            MessageRole::System => write!(f, "System"),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

// helper function to format a vector of messages
pub fn format_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|msg| format!("{msg}"))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Unbounded buffer of the turns exchanged in one session.
///
/// Each saved turn appends the user question followed by the AI answer. Nothing
/// is persisted; the buffer lives and dies with its owner.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    memory_key: &'static str,
    messages: Vec<Message>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self {
            memory_key: CHAT_HISTORY_KEY,
            messages: Vec::new(),
        }
    }

    pub fn memory_key(&self) -> &'static str {
        self.memory_key
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn save_context(&mut self, question: &str, answer: &str) {
        self.messages.push(Message::user(question));
        self.messages.push(Message::ai(answer));
    }

    pub fn buffer_as_str(&self) -> String {
        format_history(&self.messages)
    }

    /// Number of stored messages (two per turn).
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

//! UI-agnostic conversation state types
//!
//! These are shared by every front end and don't depend on any specific UI
//! framework. A [`Transcript`] only ever grows: callers get shared references
//! to its messages and can append, never edit or remove.

use serde::{Deserialize, Serialize};

/// A chat message in the interview conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only history of one conversation.
///
/// Always starts with an assistant greeting.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(greeting)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true in practice, the greeting is always present.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }
}

/// Build the opening assistant message, personalised when a name is known.
pub fn greeting_for(candidate_name: Option<&str>) -> String {
    let salutation = match candidate_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hi {}, I'm your AI Interview Assistant!", name),
        None => "Hi, I'm your AI Interview Assistant!".to_string(),
    };
    format!(
        "{} I can discuss your skills, projects, and career goals. What would you like to talk about?",
        salutation
    )
}

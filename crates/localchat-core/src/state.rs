//! UI-agnostic conversation types
//!
//! These are shared between the controller, the engine backends (which
//! serialize them straight into request bodies), and the terminal UI.

use serde::{Deserialize, Serialize};

/// Seed message placed at the head of every conversation.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that helps people find information.";

/// A chat message in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Whether the message belongs in the rendered chat list.
    pub fn is_visible(&self) -> bool {
        self.role != Role::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);

        let parsed: Message = serde_json::from_str(r#"{"role":"system","content":"x"}"#).unwrap();
        assert_eq!(parsed, Message::system("x"));
    }

    #[test]
    fn system_messages_are_hidden() {
        assert!(!Message::system(SYSTEM_PROMPT).is_visible());
        assert!(Message::user("a").is_visible());
        assert!(Message::assistant("b").is_visible());
    }
}

// Conversation types shared by the planner, adapters and the manager
//
// Conversations are owned by the caller's session store; the engine only ever
// reads them.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,

    /// Model that produced this message (assistant turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Error text recorded against a failed assistant turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            id: None,
            token_count: None,
            word_count: None,
            model: None,
            error: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Split off the leading system message, if any.
///
/// Only the first message can act as the system prompt; a system message
/// anywhere else is treated as ordinary history.
pub fn split_system(conversation: &[Message]) -> (Option<&Message>, &[Message]) {
    match conversation.split_first() {
        Some((first, rest)) if first.is_system() => (Some(first), rest),
        _ => (None, conversation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_split_system_leading() {
        let convo = vec![Message::system("be brief"), Message::user("hello")];
        let (system, rest) = split_system(&convo);
        assert_eq!(system.map(|m| m.content.as_str()), Some("be brief"));
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn test_split_system_only_first_position_counts() {
        let convo = vec![Message::user("hello"), Message::system("late system")];
        let (system, rest) = split_system(&convo);
        assert!(system.is_none());
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_split_system_empty() {
        let (system, rest) = split_system(&[]);
        assert!(system.is_none());
        assert!(rest.is_empty());
    }
}

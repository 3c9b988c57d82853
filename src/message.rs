//! Chat message data model
//!
//! [`Message`] is the persisted entity; [`ChatMessage`] is the lighter
//! `{role, content}` shape exchanged over the wire with clients and the
//! completion service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParleyError;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human input
    User,
    /// Model output
    Assistant,
    /// System prompt
    System,
    /// Tool result
    Tool,
}

impl Role {
    /// All roles accepted by the store schema
    pub const ALL: [Role; 4] = [Role::User, Role::Assistant, Role::System, Role::Tool];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }

    /// Parse a role as read back from storage
    ///
    /// Older rows may carry `ai` for model output; it is folded into
    /// [`Role::Assistant`] here so nothing downstream sees two vocabularies.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::message::Role;
    ///
    /// assert_eq!(Role::from_stored("ai"), Some(Role::Assistant));
    /// assert_eq!(Role::from_stored("user"), Some(Role::User));
    /// assert_eq!(Role::from_stored("function"), None);
    /// ```
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "ai" => Some(Self::Assistant),
            other => other.parse().ok(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParleyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "tool" => Ok(Self::Tool),
            other => Err(ParleyError::Validation(format!("unknown role: {}", other))),
        }
    }
}

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned unique identifier
    pub id: String,
    /// Author role
    pub role: Role,
    /// Message text, possibly empty
    pub content: String,
    /// Creation time; the sort key for history
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh UUID and the current timestamp
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Strip the message down to its wire form
    pub fn to_chat(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A `{role, content}` pair as sent by clients and to the completion API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role
    pub role: Role,
    /// Message text; `null` on the wire reads as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

impl ChatMessage {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::message::{ChatMessage, Role};
    ///
    /// let msg = ChatMessage::user("hello");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Full conversation so far, oldest first
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Wrap a conversation
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

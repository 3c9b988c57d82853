//! In-process message store
//!
//! Stands in for a real database in development and tests. Contents are lost
//! when the process exits.

use super::MessageStore;
use crate::error::{ParleyError, Result};
use crate::message::{Message, Role};
use async_trait::async_trait;
use std::sync::Mutex;

/// Message store backed by a `Vec` behind a mutex
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing messages
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::message::{Message, Role};
    /// use parley::storage::MemoryStore;
    ///
    /// let store = MemoryStore::with_messages(vec![Message::new(Role::User, "hi")]);
    /// assert_eq!(store.len(), 1);
    /// ```
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
        }
    }

    /// Number of stored messages
    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, role: Role, content: &str) -> Result<Message> {
        let message = Message::new(role, content);
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| ParleyError::Storage("memory store lock poisoned".to_string()))?;
        messages.push(message.clone());
        Ok(message)
    }

    async fn list(&self) -> Result<Vec<Message>> {
        let messages = self
            .messages
            .lock()
            .map_err(|_| ParleyError::Storage("memory store lock poisoned".to_string()))?;
        let mut ordered = messages.clone();
        // Stable sort keeps insertion order for equal timestamps
        ordered.sort_by_key(|m| m.created_at);
        Ok(ordered)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

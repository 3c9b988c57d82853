//! Message storage for Parley
//!
//! The store is the only owner of persisted messages. Rows are append-only:
//! nothing here updates or deletes a message once written.
//!
//! Three backends implement [`MessageStore`]:
//!
//! - [`SqliteStore`]: embedded SQLite via `rusqlite`
//! - [`RestStore`]: a PostgREST-compatible HTTP API (Supabase and friends)
//! - [`MemoryStore`]: a process-local list for development and tests

use crate::config::{Profile, StoreBackend, StoreConfig};
use crate::error::{ParleyError, Result};
use crate::message::{Message, Role};
use async_trait::async_trait;
use std::sync::Arc;

pub mod memory;
pub mod rest;
pub mod sqlite;

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// Optional scoping applied to appends and reads
///
/// When a field is set, appended rows record it and history only returns
/// rows that match it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreScope {
    /// Conversation grouping key
    pub session_id: Option<String>,
    /// Owning user, for stores that enforce row-level access
    pub user_id: Option<String>,
}

impl From<&StoreConfig> for StoreScope {
    fn from(config: &StoreConfig) -> Self {
        Self {
            session_id: config.session_id.clone(),
            user_id: config.user_id.clone(),
        }
    }
}

/// Append-only message store
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message and return the stored row
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Storage`] on connectivity or validation failure
    async fn append(&self, role: Role, content: &str) -> Result<Message>;

    /// All messages in creation order, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Storage`] if the store cannot be read
    async fn list(&self) -> Result<Vec<Message>>;

    /// Short human-readable location, used in logs
    fn describe(&self) -> String;

    /// All messages in creation order, or empty if the store is unreachable
    ///
    /// Failures are logged and swallowed so callers that only render history
    /// never fail because of the store.
    async fn fetch_ordered(&self) -> Vec<Message> {
        match self.list().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(
                    store = %self.describe(),
                    "Failed to fetch message history: {:#}",
                    e
                );
                Vec::new()
            }
        }
    }
}

/// Build the store described by the configuration
///
/// In the development profile a missing or unusable store configuration
/// falls back to [`MemoryStore`] with a warning. In production the same
/// situations are errors.
///
/// # Errors
///
/// Returns error if the store URL is invalid, the database cannot be opened,
/// or required settings are missing in production
pub fn connect(config: &StoreConfig, profile: Profile) -> Result<Arc<dyn MessageStore>> {
    let scope = StoreScope::from(config);

    let store: Arc<dyn MessageStore> = match config.backend()? {
        Some(StoreBackend::Rest {
            url,
            access_key: Some(key),
        }) => Arc::new(RestStore::new(url, key, scope)?),
        Some(StoreBackend::Rest {
            access_key: None, ..
        }) => match profile {
            Profile::Production => {
                return Err(ParleyError::Config(
                    "PARLEY_STORE_KEY must be set for a REST store".to_string(),
                )
                .into())
            }
            Profile::Development => {
                tracing::warn!(
                    "Store access key is not set. Falling back to the in-memory store; \
                     set PARLEY_STORE_KEY to persist messages"
                );
                Arc::new(MemoryStore::new())
            }
        },
        Some(StoreBackend::Sqlite(path)) => Arc::new(SqliteStore::open(path)?.with_scope(scope)),
        Some(StoreBackend::SqliteInMemory) => {
            Arc::new(SqliteStore::open_in_memory()?.with_scope(scope))
        }
        Some(StoreBackend::Memory) => Arc::new(MemoryStore::new()),
        None => match profile {
            Profile::Production => {
                return Err(ParleyError::Config(
                    "PARLEY_STORE_URL must be set in production".to_string(),
                )
                .into())
            }
            Profile::Development => {
                tracing::warn!(
                    "Store URL is not set. Using the in-memory store; \
                     history will not survive a restart"
                );
                Arc::new(MemoryStore::new())
            }
        },
    };

    tracing::info!("Using message store: {}", store.describe());
    Ok(store)
}

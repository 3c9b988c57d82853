use super::{MessageStore, StoreScope};
use crate::error::{ParleyError, Result};
use crate::message::{Message, Role};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Raw row as read from the `messages` table: (id, role, content, created_at)
type RawRow = (String, String, Option<String>, String);

/// SQLite-backed message store
///
/// Holds one connection for the life of the store. Queries run on the
/// blocking thread pool so they never stall the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    location: String,
    scope: StoreScope,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::storage::SqliteStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SqliteStore::open(dir.path().join("history.db")).unwrap();
    /// ```
    pub fn open<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;
        }

        let conn = Connection::open(&db_path)
            .context("Failed to open database")
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        Self::init(conn, format!("sqlite:{}", db_path.display()))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .context("Failed to open in-memory database")
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        Self::init(conn, "sqlite::memory:".to_string())
    }

    /// Restrict appends and reads to a session and/or user
    pub fn with_scope(mut self, scope: StoreScope) -> Self {
        self.scope = scope;
        self
    }

    fn init(conn: Connection, location: String) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                session_id TEXT,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system', 'tool')),
                content TEXT NOT NULL DEFAULT '',
                user_id TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages (created_at);",
        )
        .context("Failed to create tables")
        .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
            scope: StoreScope::default(),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ParleyError::Storage("database lock poisoned".to_string()))?;
            f(&guard).map_err(|e| ParleyError::Storage(format!("{}: {}", op, e)))
        })
        .await
        .map_err(|e| ParleyError::Storage(format!("{}: worker failed: {}", op, e)))?;

        Ok(result?)
    }
}

fn decode_row((id, role, content, created_at): RawRow) -> Option<Message> {
    let Some(role) = Role::from_stored(&role) else {
        tracing::warn!(id = %id, role = %role, "Skipping stored message with unknown role");
        return None;
    };

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!(id = %id, "Unparseable created_at {:?}: {}", created_at, e);
            Utc::now()
        });

    Some(Message {
        id,
        role,
        content: content.unwrap_or_default(),
        created_at,
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, role: Role, content: &str) -> Result<Message> {
        let message = Message::new(role, content);
        let row = message.clone();
        let scope = self.scope.clone();

        self.run("Failed to insert message", move |conn| {
            conn.execute(
                "INSERT INTO messages (id, created_at, session_id, role, content, user_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.id,
                    row.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                    scope.session_id,
                    row.role.as_str(),
                    row.content,
                    scope.user_id,
                ],
            )
        })
        .await?;

        tracing::debug!(id = %message.id, role = %message.role, "Stored message");
        Ok(message)
    }

    async fn list(&self) -> Result<Vec<Message>> {
        let scope = self.scope.clone();

        let rows = self
            .run("Failed to query messages", move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, role, content, created_at
                    FROM messages
                    WHERE (?1 IS NULL OR session_id = ?1)
                      AND (?2 IS NULL OR user_id = ?2)
                    ORDER BY created_at ASC, rowid ASC",
                )?;
                let rows = stmt.query_map(params![scope.session_id, scope.user_id], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?;
                rows.collect::<rusqlite::Result<Vec<RawRow>>>()
            })
            .await?;

        Ok(rows.into_iter().filter_map(decode_row).collect())
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

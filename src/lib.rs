//! Parley - streaming LLM chat with persistent history
//!
//! Parley serves a chat endpoint that forwards a conversation to an
//! OpenAI-compatible completion API, streams the reply back token by token,
//! and records both sides of the exchange in a message store.
//!
//! # Architecture
//!
//! - `storage`: append-only message store (SQLite, PostgREST, in-memory)
//! - `completion`: completion gateway and the SSE stream decoder
//! - `server`: axum router and request handlers
//! - `view`: client-side chat state machine and terminal rendering
//! - `client`: HTTP client for a running server
//! - `commands`: CLI command handlers
//! - `config`: configuration loading and validation
//! - `error`: error types and result alias
//!
//! # Example
//!
//! ```no_run
//! use parley::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/parley.yaml", &Default::default())?;
//!     config.validate()?;
//!     parley::server::serve(config).await
//! }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod message;
pub mod server;
pub mod storage;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use error::{ParleyError, Result};
pub use message::{ChatMessage, ChatRequest, Message, Role};

//! Error types for Parley
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Parley operations
///
/// The HTTP layer downcasts to this type to decide which status code a
/// failure maps to, so every failure that should not surface as a generic
/// 500 must be raised as one of these variants.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request body failed validation (maps to 400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Completion service rejected the request before streaming began
    #[error("Upstream error (status {status}): {body}")]
    Upstream {
        /// HTTP status returned by the upstream service
        status: u16,
        /// Upstream response payload, JSON when the upstream sent JSON
        body: serde_json::Value,
    },

    /// Completion stream failed after it had started
    #[error("Stream error: {0}")]
    Stream(String),

    /// Message storage errors (connectivity, validation, decoding)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ParleyError {
    /// Build an upstream error from a status code and raw body text
    ///
    /// The body is kept as structured JSON when it parses, otherwise it is
    /// wrapped as a JSON string so callers always receive a JSON payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::error::ParleyError;
    ///
    /// let err = ParleyError::upstream(401, r#"{"error":{"code":"invalid_api_key"}}"#);
    /// match err {
    ///     ParleyError::Upstream { status, body } => {
    ///         assert_eq!(status, 401);
    ///         assert_eq!(body["error"]["code"], "invalid_api_key");
    ///     }
    ///     _ => unreachable!(),
    /// }
    /// ```
    pub fn upstream(status: u16, body_text: &str) -> Self {
        let body = serde_json::from_str(body_text)
            .unwrap_or_else(|_| serde_json::Value::String(body_text.to_string()));
        Self::Upstream { status, body }
    }

    /// Returns true if this error means storage is unavailable or failed
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for Parley operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

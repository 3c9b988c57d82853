//! HTTP client for a running Parley server
//!
//! Used by the terminal chat command to load history and stream replies.

use crate::error::{ParleyError, Result};
use crate::message::{ChatRequest, Message};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// Reply text as it arrives
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Client for the Parley HTTP API
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    base: Url,
}

/// Error payload returned by the server
#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: serde_json::Value,
    #[serde(default)]
    details: Option<String>,
}

impl ChatClient {
    /// Create a client for the server at `base`
    ///
    /// # Errors
    ///
    /// Returns error if `base` is not a valid URL or the HTTP client cannot
    /// be built
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| ParleyError::Config(format!("Invalid server URL {}: {}", base, e)))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ParleyError::Config(format!("Invalid endpoint {}: {}", path, e)).into())
    }

    /// Fetch stored history, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the server cannot be reached or answers with a
    /// non-success status
    pub async fn fetch_history(&self) -> Result<Vec<Message>> {
        let response = self.client.get(self.endpoint("/api/messages")?).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Submit a conversation and stream the reply
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Upstream`] carrying the server's status and
    /// error payload if the request is rejected
    pub async fn send(&self, request: &ChatRequest) -> Result<TextStream> {
        let response = self
            .client
            .post(self.endpoint("/api/chat")?)
            .json(request)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(utf8_chunks(response.bytes_stream()))
    }
}

/// Decode a byte stream into non-empty text chunks
///
/// A transport error ends the stream after yielding a [`ParleyError::Stream`].
/// Bytes of an unfinished character left when the body ends are decoded
/// lossily instead of being dropped.
fn utf8_chunks<S>(bytes: S) -> TextStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let state = Some((Box::pin(bytes), Vec::<u8>::new()));
    let text = futures::stream::unfold(state, |state| async move {
        let (mut bytes, mut pending) = state?;
        loop {
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    pending.extend_from_slice(&chunk);
                    let text = take_utf8_prefix(&mut pending);
                    if !text.is_empty() {
                        return Some((Ok(text), Some((bytes, pending))));
                    }
                }
                Some(Err(e)) => {
                    let err: anyhow::Error =
                        ParleyError::Stream(format!("reply interrupted: {}", e)).into();
                    return Some((Err(err), None));
                }
                None if pending.is_empty() => return None,
                None => {
                    tracing::warn!(
                        bytes = pending.len(),
                        "Reply ended inside a UTF-8 character"
                    );
                    let text = String::from_utf8_lossy(&pending).into_owned();
                    return Some((Ok(text), None));
                }
            }
        }
    });
    Box::pin(text)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<ErrorReply>(&text) {
        Ok(reply) => match reply.details {
            Some(details) => serde_json::json!({ "error": reply.error, "details": details }),
            None => reply.error,
        },
        Err(_) => serde_json::Value::String(text),
    };
    Err(ParleyError::Upstream {
        status: status.as_u16(),
        body,
    }
    .into())
}

/// Drain the longest valid UTF-8 prefix from `buf`
///
/// Bytes of a character split across network chunks stay in `buf` until
/// the rest arrives. Invalid sequences are replaced rather than held.
pub fn take_utf8_prefix(buf: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(buf) {
        Ok(_) => buf.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => {
            let text = String::from_utf8_lossy(buf).into_owned();
            buf.clear();
            return text;
        }
    };
    let rest = buf.split_off(valid);
    let head = std::mem::replace(buf, rest);
    String::from_utf8(head).unwrap_or_default()
}

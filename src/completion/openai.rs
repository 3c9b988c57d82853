//! OpenAI-compatible chat completion gateway
//!
//! Posts the conversation to `{api_base}/chat/completions` with
//! `stream: true` and relays `choices[0].delta.content` from each SSE chunk.
//! Any server that speaks the same wire format (OpenAI, Azure-style proxies,
//! local inference servers) works by pointing `api_base` at it.

use super::sse::{SseDecoder, SseEvent};
use super::{CompletionGateway, CompletionStream};
use crate::config::CompletionConfig;
use crate::error::{ParleyError, Result};
use crate::message::ChatMessage;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Buffered chunks between the SSE reader task and the consumer
const CHANNEL_CAPACITY: usize = 64;

/// Terminal data payload sent by OpenAI-style streams
const DONE_SENTINEL: &str = "[DONE]";

/// OpenAI chat completion gateway
///
/// # Examples
///
/// ```no_run
/// use parley::completion::{CompletionGateway, OpenAiGateway};
/// use parley::config::CompletionConfig;
/// use parley::message::ChatMessage;
///
/// # async fn example() -> parley::error::Result<()> {
/// let gateway = OpenAiGateway::new(CompletionConfig::default(), "sk-...")?;
/// let stream = gateway.stream(&[ChatMessage::user("Hello!")]).await?;
/// # Ok(())
/// # }
/// ```
pub struct OpenAiGateway {
    client: Client,
    config: CompletionConfig,
    api_key: String,
}

/// Request body for `/chat/completions`
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// One streamed chunk
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// What a single SSE event means for the relay
#[derive(Debug, PartialEq, Eq)]
enum Decoded {
    Text(String),
    Done,
    Skip,
}

/// Whether the relay should keep reading
enum Flow {
    Continue,
    Stop,
}

impl OpenAiGateway {
    /// Create a new gateway
    ///
    /// No request is sent until [`CompletionGateway::stream`] is called.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        // No overall timeout: a healthy stream may run for minutes.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized OpenAI gateway: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionGateway for OpenAiGateway {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            stream: true,
        };

        let url = self.completions_url();
        tracing::debug!(
            "Requesting completion: url={}, messages={}",
            url,
            messages.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach completion service: {}", e);
                ParleyError::Upstream {
                    status: 500,
                    body: serde_json::Value::String(format!(
                        "Failed to reach completion service: {}",
                        e
                    )),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Completion service returned {}: {}", status, error_text);
            return Err(ParleyError::upstream(status.as_u16(), &error_text).into());
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(relay_sse(response.bytes_stream(), tx));

        Ok(CompletionStream::from_receiver(rx))
    }

    fn describe(&self) -> String {
        format!("openai:{} ({})", self.config.api_base, self.config.model)
    }
}

/// Read SSE chunks from the upstream body and forward text to `tx`
///
/// Stops when the upstream sends `[DONE]`, the body ends, an error occurs,
/// or the receiver is dropped because the downstream caller went away.
async fn relay_sse(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    tx: mpsc::Sender<Result<String>>,
) {
    let mut decoder = SseDecoder::new();
    tokio::pin!(byte_stream);

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Completion stream interrupted: {}", e);
                let _ = tx
                    .send(Err(ParleyError::Stream(format!(
                        "completion stream interrupted: {}",
                        e
                    ))
                    .into()))
                    .await;
                return;
            }
        };

        for event in decoder.push(&chunk) {
            if let Flow::Stop = forward(&event, &tx).await {
                return;
            }
        }
    }

    if let Some(event) = decoder.finish() {
        forward(&event, &tx).await;
    }
}

async fn forward(event: &SseEvent, tx: &mpsc::Sender<Result<String>>) -> Flow {
    match decode_event(event) {
        Ok(Decoded::Text(text)) => {
            tracing::trace!(len = text.len(), "Completion delta");
            if tx.send(Ok(text)).await.is_err() {
                tracing::debug!("Completion consumer went away; stopping relay");
                return Flow::Stop;
            }
            Flow::Continue
        }
        Ok(Decoded::Skip) => Flow::Continue,
        Ok(Decoded::Done) => Flow::Stop,
        Err(e) => {
            tracing::warn!("Completion stream failed: {:#}", e);
            let _ = tx.send(Err(e)).await;
            Flow::Stop
        }
    }
}

fn decode_event(event: &SseEvent) -> Result<Decoded> {
    if event.data.trim() == DONE_SENTINEL {
        return Ok(Decoded::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(&event.data).map_err(|e| {
        ParleyError::Stream(format!("malformed completion chunk: {}", e))
    })?;

    if let Some(error) = chunk.error {
        return Err(ParleyError::Stream(format!("completion service error: {}", error)).into());
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    if text.is_empty() {
        Ok(Decoded::Skip)
    } else {
        Ok(Decoded::Text(text))
    }
}

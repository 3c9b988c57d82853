//! Completion gateway for Parley
//!
//! A [`CompletionGateway`] submits a conversation to an LLM service and hands
//! back a [`CompletionStream`] of text increments. Rejections by the service
//! (bad key, quota, malformed input) are returned from
//! [`CompletionGateway::stream`] before any increment exists; failures after
//! that point surface as a single `Err` item that ends the stream.

use crate::config::{CompletionConfig, Profile};
use crate::error::{ParleyError, Result};
use crate::message::ChatMessage;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub mod openai;
pub mod sse;

pub use openai::OpenAiGateway;

/// One item of a completion stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next piece of generated text
    Delta(String),
    /// The stream finished; carries every delta concatenated
    Done {
        /// Full completion text
        text: String,
    },
}

/// Lazy, single-use stream of completion text
///
/// Wraps a producer of raw text increments, drops empty increments,
/// accumulates the rest, and emits exactly one [`StreamEvent::Done`] when
/// the producer finishes cleanly. An error from the producer is passed
/// through once and the stream ends without `Done`.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use parley::completion::{CompletionStream, StreamEvent};
///
/// # futures::executor::block_on(async {
/// let deltas = futures::stream::iter(vec![Ok("Hel".to_string()), Ok("lo".to_string())]);
/// let events: Vec<_> = CompletionStream::new(deltas)
///     .map(|e| e.unwrap())
///     .collect()
///     .await;
/// assert_eq!(events.last(), Some(&StreamEvent::Done { text: "Hello".to_string() }));
/// # });
/// ```
pub struct CompletionStream {
    deltas: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
    text: String,
    finished: bool,
}

impl CompletionStream {
    /// Wrap a stream of raw text increments
    pub fn new<S>(deltas: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self {
            deltas: Box::pin(deltas),
            text: String::new(),
            finished: false,
        }
    }

    /// Wrap the receiving half of a producer channel
    pub fn from_receiver(rx: mpsc::Receiver<Result<String>>) -> Self {
        Self::new(ReceiverStream::new(rx))
    }
}

impl Stream for CompletionStream {
    type Item = Result<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match this.deltas.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(delta))) if delta.is_empty() => continue,
                Poll::Ready(Some(Ok(delta))) => {
                    this.text.push_str(&delta);
                    return Poll::Ready(Some(Ok(StreamEvent::Delta(delta))));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    let text = std::mem::take(&mut this.text);
                    return Poll::Ready(Some(Ok(StreamEvent::Done { text })));
                }
            }
        }
    }
}

/// A service that turns a conversation into a stream of generated text
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Submit the conversation and start streaming the reply
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::Upstream`] when the service rejects the request
    /// or cannot be reached, and [`ParleyError::Config`] when the gateway has
    /// no credentials
    async fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream>;

    /// Short human-readable description, used in logs
    fn describe(&self) -> String;
}

/// Gateway used in development when no API key is configured
///
/// Every request fails with a configuration error, so the server still
/// starts and the store and UI can be exercised without credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredGateway;

#[async_trait]
impl CompletionGateway for UnconfiguredGateway {
    async fn stream(&self, _messages: &[ChatMessage]) -> Result<CompletionStream> {
        Err(ParleyError::Config(
            "Completion API key is not configured. Set OPENAI_API_KEY and restart".to_string(),
        )
        .into())
    }

    fn describe(&self) -> String {
        "unconfigured".to_string()
    }
}

/// Build the gateway described by the configuration
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built, or if no API key is set
/// in the production profile
pub fn connect(config: &CompletionConfig, profile: Profile) -> Result<Arc<dyn CompletionGateway>> {
    let gateway: Arc<dyn CompletionGateway> = match (config.api_key(), profile) {
        (Some(key), _) => Arc::new(OpenAiGateway::new(config.clone(), key)?),
        (None, Profile::Production) => {
            return Err(
                ParleyError::Config("OPENAI_API_KEY must be set in production".to_string()).into(),
            )
        }
        (None, Profile::Development) => {
            tracing::warn!("OPENAI_API_KEY is not set. Chat requests will fail until it is");
            Arc::new(UnconfiguredGateway)
        }
    };

    tracing::info!("Using completion gateway: {}", gateway.describe());
    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(stream: CompletionStream) -> Vec<std::result::Result<StreamEvent, String>> {
        stream.map(|e| e.map_err(|err| err.to_string())).collect().await
    }

    #[tokio::test]
    async fn test_stream_emits_deltas_then_done() {
        let deltas = futures::stream::iter(vec![
            Ok("Hello".to_string()),
            Ok(", ".to_string()),
            Ok("world".to_string()),
        ]);
        let events = collect(CompletionStream::new(deltas)).await;
        assert_eq!(
            events,
            vec![
                Ok(StreamEvent::Delta("Hello".to_string())),
                Ok(StreamEvent::Delta(", ".to_string())),
                Ok(StreamEvent::Delta("world".to_string())),
                Ok(StreamEvent::Done {
                    text: "Hello, world".to_string()
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_skips_empty_deltas() {
        let deltas = futures::stream::iter(vec![Ok(String::new()), Ok("x".to_string())]);
        let events = collect(CompletionStream::new(deltas)).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Ok(StreamEvent::Delta("x".to_string())));
    }

    #[tokio::test]
    async fn test_empty_stream_still_completes() {
        let deltas = futures::stream::iter(Vec::<Result<String>>::new());
        let events = collect(CompletionStream::new(deltas)).await;
        assert_eq!(
            events,
            vec![Ok(StreamEvent::Done {
                text: String::new()
            })]
        );
    }

    #[tokio::test]
    async fn test_error_ends_stream_without_done() {
        let deltas = futures::stream::iter(vec![
            Ok("partial".to_string()),
            Err(ParleyError::Stream("connection reset".to_string()).into()),
            Ok("never".to_string()),
        ]);
        let events = collect(CompletionStream::new(deltas)).await;
        assert_eq!(events.len(), 2);
        assert!(events[1].as_ref().unwrap_err().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_from_receiver_preserves_order() {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for piece in ["a", "b", "c"] {
                tx.send(Ok(piece.to_string())).await.unwrap();
            }
        });
        let events = collect(CompletionStream::from_receiver(rx)).await;
        assert_eq!(
            events.last(),
            Some(&Ok(StreamEvent::Done {
                text: "abc".to_string()
            }))
        );
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_rejects() {
        let err = UnconfiguredGateway
            .stream(&[ChatMessage::user("hi")])
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<ParleyError>(),
            Some(ParleyError::Config(_))
        ));
    }

    #[test]
    fn test_connect_without_key() {
        let config = CompletionConfig::default();
        assert!(connect(&config, Profile::Production).is_err());
        let gateway = connect(&config, Profile::Development).unwrap();
        assert_eq!(gateway.describe(), "unconfigured");
    }
}

//! `POST /api/chat`
//!
//! Persists the trailing user message, opens a completion stream, relays
//! each delta to the caller as a plain-text chunk, and persists the full
//! reply once the stream completes.

use super::{ApiError, AppState};
use crate::completion::StreamEvent;
use crate::message::{ChatRequest, Role};
use crate::storage::MessageStore;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use std::sync::Arc;

/// Returned when the body has no messages
pub const MESSAGES_REQUIRED: &str = "Messages are required in the request body";

/// Returned when the body is not a valid chat request
pub const INVALID_BODY: &str = "Invalid request body";

/// Stream a completion for the posted conversation
///
/// # Errors
///
/// Returns 400 for a malformed or empty body, and the upstream status (or
/// 500) when the completion service rejects the request
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request_with_details(INVALID_BODY, e.to_string()))?;

    let Some(last) = request.messages.last() else {
        return Err(ApiError::bad_request(MESSAGES_REQUIRED));
    };

    tracing::debug!(messages = request.messages.len(), "Chat request received");

    if last.role == Role::User {
        if let Err(e) = state.store.append(Role::User, &last.content).await {
            tracing::error!("Failed to persist user message: {:#}", e);
        }
    }

    let completion = state.gateway.stream(&request.messages).await?;

    let store = Arc::clone(&state.store);
    let replies = state.replies.clone();
    let chunks = completion.filter_map(move |event| {
        let store = Arc::clone(&store);
        let replies = replies.clone();
        async move {
            match event {
                Ok(StreamEvent::Delta(text)) => Some(Ok(Bytes::from(text))),
                Ok(StreamEvent::Done { text }) => {
                    replies.spawn(persist_reply(store, text));
                    None
                }
                Err(e) => {
                    tracing::error!("Completion stream failed mid-response: {:#}", e);
                    Some(Err(e))
                }
            }
        }
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}

async fn persist_reply(store: Arc<dyn MessageStore>, text: String) {
    match store.append(Role::Assistant, &text).await {
        Ok(message) => tracing::debug!(id = %message.id, "Persisted assistant reply"),
        Err(e) => tracing::error!("Failed to persist assistant reply: {:#}", e),
    }
}

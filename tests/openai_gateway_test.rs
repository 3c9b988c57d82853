//! OpenAI gateway integration tests
//!
//! Runs `OpenAiGateway` against a `wiremock` server. SSE bodies use
//! `set_body_raw(bytes, "text/event-stream")` so the content type matches
//! what the real service sends.

use futures::StreamExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::completion::{CompletionGateway, OpenAiGateway, StreamEvent};
use parley::config::CompletionConfig;
use parley::error::ParleyError;
use parley::message::ChatMessage;

fn gateway(server: &MockServer) -> OpenAiGateway {
    let config = CompletionConfig {
        api_base: format!("{}/v1", server.uri()),
        model: "gpt-test".to_string(),
        ..Default::default()
    };
    OpenAiGateway::new(config, "sk-test").expect("gateway")
}

fn sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(chunk).unwrap()
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn test_streams_deltas_then_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-test",
            "stream": true,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Hel", "lo", " \u{1f44b}"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stream = gateway(&server)
        .stream(&[ChatMessage::user("hello")])
        .await
        .unwrap();
    let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("Hel".to_string()),
            StreamEvent::Delta("lo".to_string()),
            StreamEvent::Delta(" \u{1f44b}".to_string()),
            StreamEvent::Done {
                text: "Hello \u{1f44b}".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_role_and_finish_chunks_are_ignored() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let stream = gateway(&server)
        .stream(&[ChatMessage::user("hi")])
        .await
        .unwrap();
    let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("ok".to_string()),
            StreamEvent::Done {
                text: "ok".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_invalid_key_is_rejected_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error",
                "code": "invalid_api_key"
            }
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .stream(&[ChatMessage::user("hi")])
        .await
        .err()
        .expect("request should be rejected");

    match err.downcast_ref::<ParleyError>() {
        Some(ParleyError::Upstream { status, body }) => {
            assert_eq!(*status, 401);
            assert_eq!(body["error"]["code"], "invalid_api_key");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_plain_text_rejection_is_kept_as_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .stream(&[ChatMessage::user("hi")])
        .await
        .err()
        .unwrap();

    match err.downcast_ref::<ParleyError>() {
        Some(ParleyError::Upstream { status, body }) => {
            assert_eq!(*status, 429);
            assert_eq!(body, &serde_json::Value::String("slow down".to_string()));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_upstream_500() {
    let config = CompletionConfig {
        // Reserved port on localhost with nothing listening
        api_base: "http://127.0.0.1:9/v1".to_string(),
        connect_timeout_seconds: 1,
        ..Default::default()
    };
    let err = OpenAiGateway::new(config, "sk-test")
        .unwrap()
        .stream(&[ChatMessage::user("hi")])
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err.downcast_ref::<ParleyError>(),
        Some(ParleyError::Upstream { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_inline_error_event_ends_stream_without_done() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"The server had an error\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let stream = gateway(&server)
        .stream(&[ChatMessage::user("hi")])
        .await
        .unwrap();
    let events: Vec<_> = stream.collect().await;

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0].as_ref().unwrap(),
        &StreamEvent::Delta("par".to_string())
    );
    assert!(events[1]
        .as_ref()
        .unwrap_err()
        .to_string()
        .contains("The server had an error"));
}

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use parley::completion::{CompletionGateway, CompletionStream};
use parley::error::{ParleyError, Result};
use parley::message::{ChatMessage, Message, Role};
use parley::storage::{MemoryStore, MessageStore};

/// Gateway that replies with a fixed list of deltas
///
/// Records each conversation it receives and how many rows the watched
/// store held at the moment the call arrived.
#[allow(dead_code)]
pub struct ScriptedGateway {
    deltas: Vec<String>,
    watched: Option<Arc<MemoryStore>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
    pub store_len_at_call: Mutex<Vec<usize>>,
}

#[allow(dead_code)]
impl ScriptedGateway {
    pub fn new(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            watched: None,
            calls: Mutex::new(Vec::new()),
            store_len_at_call: Mutex::new(Vec::new()),
        }
    }

    pub fn watching(mut self, store: Arc<MemoryStore>) -> Self {
        self.watched = Some(store);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if let Some(store) = &self.watched {
            self.store_len_at_call.lock().unwrap().push(store.len());
        }
        let deltas: Vec<Result<String>> = self.deltas.iter().cloned().map(Ok).collect();
        Ok(CompletionStream::new(futures::stream::iter(deltas)))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Gateway that rejects every request the way an upstream 401 would
#[allow(dead_code)]
pub struct RejectingGateway {
    pub status: u16,
    pub body: String,
}

#[allow(dead_code)]
impl RejectingGateway {
    pub fn invalid_key() -> Self {
        Self {
            status: 401,
            body: r#"{"error":{"message":"Incorrect API key provided","code":"invalid_api_key"}}"#
                .to_string(),
        }
    }
}

#[async_trait]
impl CompletionGateway for RejectingGateway {
    async fn stream(&self, _messages: &[ChatMessage]) -> Result<CompletionStream> {
        Err(ParleyError::upstream(self.status, &self.body).into())
    }

    fn describe(&self) -> String {
        "rejecting".to_string()
    }
}

/// Gateway whose stream fails after the first delta
#[allow(dead_code)]
pub struct MidStreamFailGateway;

#[async_trait]
impl CompletionGateway for MidStreamFailGateway {
    async fn stream(&self, _messages: &[ChatMessage]) -> Result<CompletionStream> {
        let items: Vec<Result<String>> = vec![
            Ok("partial".to_string()),
            Err(ParleyError::Stream("connection reset".to_string()).into()),
        ];
        Ok(CompletionStream::new(futures::stream::iter(items)))
    }

    fn describe(&self) -> String {
        "mid-stream-fail".to_string()
    }
}

/// Gateway fed by the test through a channel
///
/// Deltas reach the endpoint only when the test sends them; dropping the
/// sender completes the reply.
#[allow(dead_code)]
pub struct ChannelGateway {
    rx: Mutex<Option<mpsc::Receiver<Result<String>>>>,
}

#[allow(dead_code)]
impl ChannelGateway {
    pub fn new() -> (Self, mpsc::Sender<Result<String>>) {
        let (tx, rx) = mpsc::channel(8);
        let gateway = Self {
            rx: Mutex::new(Some(rx)),
        };
        (gateway, tx)
    }
}

#[async_trait]
impl CompletionGateway for ChannelGateway {
    async fn stream(&self, _messages: &[ChatMessage]) -> Result<CompletionStream> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ParleyError::Stream("channel already taken".to_string()))?;
        Ok(CompletionStream::from_receiver(rx))
    }

    fn describe(&self) -> String {
        "channel".to_string()
    }
}

/// Store that is always unreachable
#[allow(dead_code)]
pub struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn append(&self, _role: Role, _content: &str) -> Result<Message> {
        Err(ParleyError::Storage("connection refused".to_string()).into())
    }

    async fn list(&self) -> Result<Vec<Message>> {
        Err(ParleyError::Storage("connection refused".to_string()).into())
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

/// Poll until the store holds `len` rows or the deadline passes
///
/// The assistant reply is written on a spawned task, so it may land shortly
/// after the response body ends.
#[allow(dead_code)]
pub async fn wait_for_len(store: &MemoryStore, len: usize) -> bool {
    for _ in 0..100 {
        if store.len() >= len {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    store.len() >= len
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("parley.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

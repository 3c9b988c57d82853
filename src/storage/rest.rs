//! PostgREST-compatible message store
//!
//! Talks to a hosted Postgres through its REST gateway, the way Supabase
//! exposes tables at `{project}/rest/v1/{table}`. The access key is sent both
//! as the `apikey` header and as a bearer token. Row-level security, if
//! enabled on the table, applies to whichever key is used.

use super::{MessageStore, StoreScope};
use crate::error::{ParleyError, Result};
use crate::message::{Message, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TABLE_PATH: &str = "rest/v1/messages";
const SELECT_COLUMNS: &str = "id,role,content,created_at";

/// Message store backed by a PostgREST endpoint
pub struct RestStore {
    client: Client,
    endpoint: String,
    access_key: String,
    scope: StoreScope,
}

/// Row body for inserts
#[derive(Debug, Serialize)]
struct NewRow<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

/// Row as returned by the REST API
#[derive(Debug, Deserialize)]
struct RestRow {
    /// UUID or integer depending on how the table was provisioned
    id: serde_json::Value,
    role: String,
    #[serde(default)]
    content: Option<String>,
    created_at: DateTime<Utc>,
}

impl RestRow {
    fn into_message(self) -> Option<Message> {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        let Some(role) = Role::from_stored(&self.role) else {
            tracing::warn!(
                id = %id,
                role = %self.role,
                "Skipping stored message with unknown role"
            );
            return None;
        };
        Some(Message {
            id,
            role,
            content: self.content.unwrap_or_default(),
            created_at: self.created_at,
        })
    }
}

impl RestStore {
    /// Create a store for the project at `base_url`
    ///
    /// No network I/O happens until the first append or read.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        base_url: url::Url,
        access_key: impl Into<String>,
        scope: StoreScope,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ParleyError::Storage(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = format!("{}/{}", base_url.as_str().trim_end_matches('/'), TABLE_PATH);

        Ok(Self {
            client,
            endpoint,
            access_key: access_key.into(),
            scope,
        })
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.access_key)
            .bearer_auth(&self.access_key)
    }

    async fn error_for_status(response: reqwest::Response, action: &str) -> ParleyError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ParleyError::Storage(format!("{} failed with {}: {}", action, status, body))
    }
}

#[async_trait]
impl MessageStore for RestStore {
    async fn append(&self, role: Role, content: &str) -> Result<Message> {
        let row = NewRow {
            role: role.as_str(),
            content,
            session_id: self.scope.session_id.as_deref(),
            user_id: self.scope.user_id.as_deref(),
        };

        let response = self
            .authorized(self.client.post(&self.endpoint))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(|e| ParleyError::Storage(format!("Failed to reach store: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "Insert").await.into());
        }

        let rows: Vec<RestRow> = response
            .json()
            .await
            .map_err(|e| ParleyError::Storage(format!("Failed to decode inserted row: {}", e)))?;

        // Row-level security can hide the inserted row from the returning
        // select; the insert itself still succeeded.
        let message = rows
            .into_iter()
            .next()
            .and_then(RestRow::into_message)
            .unwrap_or_else(|| {
                tracing::debug!("Store returned no representation for inserted row");
                Message::new(role, content)
            });

        tracing::debug!(id = %message.id, role = %message.role, "Stored message");
        Ok(message)
    }

    async fn list(&self) -> Result<Vec<Message>> {
        let mut query: Vec<(&str, String)> = vec![
            ("select", SELECT_COLUMNS.to_string()),
            ("order", "created_at.asc".to_string()),
        ];
        if let Some(session_id) = &self.scope.session_id {
            query.push(("session_id", format!("eq.{}", session_id)));
        }
        if let Some(user_id) = &self.scope.user_id {
            query.push(("user_id", format!("eq.{}", user_id)));
        }

        let response = self
            .authorized(self.client.get(&self.endpoint))
            .query(&query)
            .send()
            .await
            .map_err(|e| ParleyError::Storage(format!("Failed to reach store: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "Select").await.into());
        }

        let rows: Vec<RestRow> = response
            .json()
            .await
            .map_err(|e| ParleyError::Storage(format!("Failed to decode messages: {}", e)))?;

        Ok(rows.into_iter().filter_map(RestRow::into_message).collect())
    }

    fn describe(&self) -> String {
        format!("rest:{}", self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_table_path() {
        let store = RestStore::new(
            url::Url::parse("https://abc.supabase.co/").unwrap(),
            "key",
            StoreScope::default(),
        )
        .unwrap();
        assert_eq!(store.endpoint, "https://abc.supabase.co/rest/v1/messages");
        assert_eq!(store.describe(), "rest:https://abc.supabase.co/rest/v1/messages");
    }

    #[test]
    fn test_rest_row_numeric_id_and_null_content() {
        let row: RestRow = serde_json::from_str(
            r#"{"id": 42, "role": "ai", "content": null, "created_at": "2024-05-01T10:00:00.123456+00:00"}"#,
        )
        .unwrap();
        let msg = row.into_message().unwrap();
        assert_eq!(msg.id, "42");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_rest_row_unknown_role_is_skipped() {
        let row: RestRow = serde_json::from_str(
            r#"{"id": "x", "role": "function", "content": "hi", "created_at": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(row.into_message().is_none());
    }

    #[test]
    fn test_new_row_omits_absent_scope() {
        let row = NewRow {
            role: "user",
            content: "hello",
            session_id: None,
            user_id: Some("u1"),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("session_id").is_none());
        assert_eq!(json["user_id"], "u1");
    }
}

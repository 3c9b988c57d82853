use crate::error::ParleyError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON error payload returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error summary, or the upstream service's payload
    pub error: serde_json::Value,
    /// Extra detail for unexpected failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// An error response: status plus [`ErrorBody`]
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// 400 with a plain message
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: serde_json::Value::String(message.into()),
                details: None,
            },
        }
    }

    /// 400 with a message and detail
    pub fn bad_request_with_details(
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        let mut err = Self::bad_request(message);
        err.body.details = Some(details.into());
        err
    }

    /// Status code this error responds with
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Payload this error responds with
    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("[api] request failed: {:#}", err);

        match err.downcast_ref::<ParleyError>() {
            Some(ParleyError::Validation(message)) => Self::bad_request(message.clone()),
            Some(ParleyError::Upstream { status, body }) => {
                let status = StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                Self {
                    status,
                    body: ErrorBody {
                        error: body.clone(),
                        details: None,
                    },
                }
            }
            Some(ParleyError::Config(message)) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: ErrorBody {
                    error: "Completion API key not configured correctly.".into(),
                    details: Some(message.clone()),
                },
            },
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: ErrorBody {
                    error: "An unexpected error occurred.".into(),
                    details: Some(format!("{:#}", err)),
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::{ErrorKind, OrchestrationError};
use crate::tool::ToolError;

/// Error response of the HTTP layer.
///
/// Serialises as `{ "error": <summary>, "kind": <kind>, "details": <message> }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, details: impl Into<String>) -> Self {
        let (status, summary) = match kind {
            ErrorKind::ToolNotFound => (StatusCode::NOT_FOUND, "Function not found"),
            ErrorKind::ArgumentMismatch => (StatusCode::BAD_REQUEST, "Invalid function arguments"),
            ErrorKind::ToolExecution => (StatusCode::INTERNAL_SERVER_ERROR, "Function execution failed"),
            ErrorKind::ModuleLoad | ErrorKind::SchemaValidation => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Tool loading failed")
            }
            ErrorKind::Upstream => (StatusCode::INTERNAL_SERVER_ERROR, "OpenAI API failed"),
            ErrorKind::UpstreamTimeout => (StatusCode::GATEWAY_TIMEOUT, "OpenAI API timed out"),
        };
        Self {
            status,
            body: ApiErrorBody {
                error: summary.to_string(),
                kind,
                details: Some(details.into()),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(err: OrchestrationError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

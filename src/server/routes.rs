use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use super::ServerState;
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAICallRequest {
    user_message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExecuteFunctionRequest {
    function_name: String,
    #[serde(default)]
    parameters: Value,
}

/// POST /api/openai-call
///
/// Runs one orchestration cycle and returns the model's final answer.
pub(crate) async fn openai_call(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OpenAICallRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!(chars = request.user_message.len(), "Received /api/openai-call");
    let outcome = state.orchestrator.run(&request.user_message).await?;
    Ok(Json(MessageResponse {
        message: outcome.message,
    }))
}

/// POST /api/execute-function
///
/// Runs a tool directly and returns its raw result.
pub(crate) async fn execute_function(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ExecuteFunctionRequest>,
) -> Result<Json<Value>, ApiError> {
    info!(tool = %request.function_name, "Received /api/execute-function");
    let result = state
        .orchestrator
        .execute_tool(&request.function_name, request.parameters)
        .await?;
    Ok(Json(result))
}

/// POST /api/prompt
///
/// Echoes the submitted state snapshot. Nothing is stored.
pub(crate) async fn prompt(Json(snapshot): Json<Value>) -> Json<Value> {
    let user_message = snapshot
        .get("user_message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Json(json!({
        "message": format!("got prompt {}", user_message),
        "state": snapshot,
    }))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

//! HTTP front end for the orchestrator.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::Orchestrator;

pub mod error;
mod routes;

pub use error::{ApiError, ApiErrorBody};

pub(crate) struct ServerState {
    pub(crate) orchestrator: Orchestrator,
}

/// Builds the application router.
pub fn router(orchestrator: Orchestrator) -> Router {
    let state = Arc::new(ServerState { orchestrator });
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/openai-call", post(routes::openai_call))
        .route("/api/execute-function", post(routes::execute_function))
        .route("/api/prompt", post(routes::prompt))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the router until the process is stopped.
pub async fn serve(addr: SocketAddr, orchestrator: Orchestrator) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Server listening");
    axum::serve(listener, router(orchestrator)).await
}

/// A server running in the background, stopped when dropped.
pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Server {
    /// Binds `addr` and serves in a background task.
    pub async fn start(addr: SocketAddr, orchestrator: Orchestrator) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let app = router(orchestrator);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMOutput, MockLLMClient};
    use crate::tool::{StubSynthesizer, ToolExecutor, ToolLoader};
    use mockall::Sequence;
    use reqwest::StatusCode;
    use serde_json::{Value, json};
    use std::path::Path;
    use tempfile::tempdir;

    const MULTIPLY: &str = r#"{
        "name": "multiplyNumbers",
        "description": "Multiplies two numbers.",
        "parameters": {
            "type": "object",
            "properties": {
                "num1": { "type": "number", "description": "First number" },
                "num2": { "type": "number", "description": "Second number" }
            },
            "required": ["num1", "num2"]
        },
        "execute": { "kind": "expression", "expression": "num1 * num2" }
    }"#;

    async fn start(dir: &Path, client: MockLLMClient) -> Server {
        std::fs::write(dir.join("multiplyNumbers.json"), MULTIPLY).unwrap();
        let executor = ToolExecutor::new(ToolLoader::new(dir), Arc::new(StubSynthesizer::new(dir)));
        let orchestrator = Orchestrator::with_defaults(Arc::new(client), executor);
        Server::start("127.0.0.1:0".parse().unwrap(), orchestrator)
            .await
            .unwrap()
    }

    fn url(server: &Server, path: &str) -> String {
        format!("http://{}{}", server.addr(), path)
    }

    #[tokio::test]
    async fn openai_call_end_to_end() {
        let dir = tempdir().unwrap();
        let mut client = MockLLMClient::new();
        let mut seq = Sequence::new();
        client
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(LLMOutput::tool_call("call_1", "multiplyNumbers", json!({ "num1": 5, "num2": 3 }))));
        client
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(LLMOutput::text("5 times 3 is 15.")));
        let server = start(dir.path(), client).await;

        let response = reqwest::Client::new()
            .post(url(&server, "/api/openai-call"))
            .json(&json!({ "user_message": "What is 5 times 3?" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert!(body["message"].as_str().unwrap().contains("15"));
    }

    #[tokio::test]
    async fn execute_function_returns_raw_result() {
        let dir = tempdir().unwrap();
        let server = start(dir.path(), MockLLMClient::new()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(url(&server, "/api/execute-function"))
            .json(&json!({ "functionName": "multiplyNumbers", "parameters": { "num1": 5, "num2": 3 } }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.json::<Value>().await.unwrap(), json!({ "result": 15 }));

        let response = client
            .post(url(&server, "/api/execute-function"))
            .json(&json!({ "functionName": "divideNumbers", "parameters": {} }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Function not found");
        assert_eq!(body["kind"], "tool_not_found");

        let response = client
            .post(url(&server, "/api/execute-function"))
            .json(&json!({ "functionName": "multiplyNumbers", "parameters": { "num1": 5 } }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_500() {
        let dir = tempdir().unwrap();
        let mut client = MockLLMClient::new();
        client
            .expect_complete()
            .returning(|_| Err(crate::llm::LLMError::ApiError("boom".to_string())));
        let server = start(dir.path(), client).await;

        let response = reqwest::Client::new()
            .post(url(&server, "/api/openai-call"))
            .json(&json!({ "user_message": "Hi" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "OpenAI API failed");
        assert!(body["details"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn prompt_echoes_state() {
        let dir = tempdir().unwrap();
        let server = start(dir.path(), MockLLMClient::new()).await;
        let snapshot = json!({ "user_message": "hello", "thread_id": "t1" });

        let response = reqwest::Client::new()
            .post(url(&server, "/api/prompt"))
            .json(&snapshot)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "got prompt hello");
        assert_eq!(body["state"], snapshot);
    }
}

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::session::{MessageContent, PendingToolCall};
use crate::tool::{ToolError, ToolLoader, ToolRegistry, ToolSynthesizer};

/// The result of running one model-requested tool call.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// The call identifier the result answers
    pub tool_call_id: String,
    /// The tool that ran
    pub name: String,
    /// The value the tool returned
    pub result: Value,
    /// Whether the tool had to be synthesized first
    pub synthesized: bool,
}

impl ToolOutcome {
    /// The tool-role content sent back to the model.
    pub fn to_message_content(&self) -> MessageContent {
        MessageContent::ToolResult {
            tool_call_id: self.tool_call_id.clone(),
            result: serde_json::json!({ "result": self.result }).to_string(),
            is_error: None,
        }
    }
}

/// Resolves and runs tool calls, synthesizing missing tools once.
#[derive(Clone)]
pub struct ToolExecutor {
    loader: ToolLoader,
    synthesizer: Arc<dyn ToolSynthesizer>,
}

impl ToolExecutor {
    /// Creates a new tool executor.
    pub fn new(loader: ToolLoader, synthesizer: Arc<dyn ToolSynthesizer>) -> Self {
        Self {
            loader,
            synthesizer,
        }
    }

    /// Loads a fresh registry reflecting the tool directory.
    pub async fn load(&self) -> ToolRegistry {
        self.loader.load().await
    }

    /// Makes sure `name` is registered, synthesizing it and reloading once if not.
    ///
    /// Returns whether synthesis was needed. On success `registry` holds the
    /// reloaded tool set.
    pub async fn resolve(&self, registry: &mut ToolRegistry, name: &str) -> Result<bool, ToolError> {
        if registry.contains(name) {
            return Ok(false);
        }

        info!(tool = %name, "Tool not found, generating it");
        if let Err(e) = self.synthesizer.synthesize(name).await {
            warn!(tool = %name, error = %e, "Tool synthesis failed");
        }

        *registry = self.loader.load().await;
        if registry.contains(name) {
            Ok(true)
        } else {
            Err(ToolError::NotFound(name.to_string()))
        }
    }

    /// Resolves and executes a pending call against `registry`.
    pub async fn execute(
        &self,
        registry: &mut ToolRegistry,
        call: &PendingToolCall,
    ) -> Result<ToolOutcome, ToolError> {
        let synthesized = self.resolve(registry, &call.name).await?;
        debug!(tool = %call.name, arguments = %call.arguments, "Running tool call");
        let result = registry.execute(&call.name, call.arguments.clone()).await?;

        Ok(ToolOutcome {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            result,
            synthesized,
        })
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::StubSynthesizer;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn executor(dir: &std::path::Path) -> ToolExecutor {
        ToolExecutor::new(ToolLoader::new(dir), Arc::new(StubSynthesizer::new(dir)))
    }

    fn call(name: &str, arguments: Value) -> PendingToolCall {
        PendingToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn missing_tool_is_synthesized_then_run() {
        let dir = tempdir().unwrap();
        let executor = executor(dir.path());
        let mut registry = executor.load().await;

        let outcome = executor
            .execute(&mut registry, &call("translateText", json!({ "input": "hola" })))
            .await
            .unwrap();

        assert!(outcome.synthesized);
        assert!(registry.contains("translateText"));
        assert!(outcome.result.to_string().contains("hola"));

        let MessageContent::ToolResult { tool_call_id, result, .. } = outcome.to_message_content() else {
            panic!("expected a tool result");
        };
        assert_eq!(tool_call_id, "call_1");
        let payload: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(payload["result"], outcome.result);
    }

    struct NeverWrites;

    #[async_trait]
    impl ToolSynthesizer for NeverWrites {
        async fn synthesize(&self, name: &str) -> Result<PathBuf, ToolError> {
            Err(ToolError::SynthesisFailed {
                tool: name.to_string(),
                reason: "disabled".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn still_missing_after_synthesis_is_not_found() {
        let dir = tempdir().unwrap();
        let executor = ToolExecutor::new(ToolLoader::new(dir.path()), Arc::new(NeverWrites));
        let mut registry = executor.load().await;

        let err = executor
            .execute(&mut registry, &call("ghost", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn invalid_names_are_not_found() {
        let dir = tempdir().unwrap();
        let executor = executor(dir.path());
        let mut registry = executor.load().await;

        let err = executor
            .execute(&mut registry, &call("no such tool", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}

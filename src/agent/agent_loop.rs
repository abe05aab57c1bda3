use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::OrchestrationError;
use crate::llm::{LLMClient, LLMError, LLMInput, LLMOutput};
use crate::session::{ConversationContext, Message, MessageContent, PendingToolCall, content_text};
use crate::tool::{ToolDescriptor, ToolError, ToolExecutor, ToolOutcome};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// The model to use
    pub model: String,
    /// The system prompt
    pub system_prompt: String,
    /// Maximum tokens to generate per response
    pub max_tokens: Option<u32>,
    /// Optional temperature
    pub temperature: Option<f32>,
    /// Upper bound on each chat-completion call
    pub upstream_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            max_tokens: None,
            temperature: None,
            upstream_timeout: Duration::from_secs(60),
        }
    }
}

/// Stages of one orchestration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Start,
    AwaitingFirstResponse,
    AwaitingToolResult,
    AwaitingSecondResponse,
    Done,
}

/// The result of a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// The model's final answer
    pub message: String,
    /// The tool call that was run, if the model asked for one
    pub tool: Option<ToolOutcome>,
    /// The full transcript of the cycle
    pub context: ConversationContext,
}

/// Runs the two-phase exchange: offer tools, run the requested call, ask again.
#[derive(Clone)]
pub struct Orchestrator {
    llm_client: Arc<dyn LLMClient>,
    tool_executor: ToolExecutor,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates a new orchestrator.
    pub fn new(
        llm_client: Arc<dyn LLMClient>,
        tool_executor: ToolExecutor,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            llm_client,
            tool_executor,
            config,
        }
    }

    /// Creates a new orchestrator with default configuration.
    pub fn with_defaults(llm_client: Arc<dyn LLMClient>, tool_executor: ToolExecutor) -> Self {
        Self::new(llm_client, tool_executor, OrchestratorConfig::default())
    }

    /// Runs one orchestration cycle for `user_message`.
    pub async fn run(&self, user_message: &str) -> Result<CycleOutcome, OrchestrationError> {
        let mut ctx = ConversationContext::new(&self.config.system_prompt, user_message);
        let result = self.run_cycle(&mut ctx).await;
        match result {
            Ok((message, tool)) => {
                transition(&ctx, CycleState::Done);
                Ok(CycleOutcome {
                    message,
                    tool,
                    context: ctx,
                })
            }
            Err(e) => {
                error!(cycle = %ctx.id, kind = %e.kind(), error = %e, "Orchestration cycle failed");
                Err(e)
            }
        }
    }

    async fn run_cycle(
        &self,
        ctx: &mut ConversationContext,
    ) -> Result<(String, Option<ToolOutcome>), OrchestrationError> {
        transition(ctx, CycleState::Start);
        let mut registry = self.tool_executor.load().await;
        let catalog = registry.catalog();
        debug!(cycle = %ctx.id, tools = ?registry.names(), "Tool catalog built");

        transition(ctx, CycleState::AwaitingFirstResponse);
        let first = self.complete(ctx, catalog).await?;

        let Some(call) = PendingToolCall::first_in(&first.content) else {
            let text = content_text(&first.content);
            ctx.push(Message::new_assistant(first.content));
            return Ok((text, None));
        };

        let requested = first
            .content
            .iter()
            .filter(|c| matches!(c, MessageContent::ToolCall { .. }))
            .count();
        if requested > 1 {
            debug!(cycle = %ctx.id, ignored = requested - 1, "Only the first tool call is honored");
        }
        info!(cycle = %ctx.id, tool = %call.name, "Model requested a tool call");

        // The assistant entry carries only the honored call so every call in
        // the resubmitted transcript has a matching tool result.
        let mut content: Vec<MessageContent> = first
            .content
            .into_iter()
            .filter(|c| matches!(c, MessageContent::Text { .. }))
            .collect();
        content.push(call.to_content());
        ctx.push(Message::new_assistant(content));
        ctx.pending_tool_call = Some(call.clone());

        transition(ctx, CycleState::AwaitingToolResult);
        let outcome = self.tool_executor.execute(&mut registry, &call).await?;
        ctx.pending_tool_call = None;
        ctx.push(Message::new_tool_result(vec![outcome.to_message_content()]));

        transition(ctx, CycleState::AwaitingSecondResponse);
        let second = self.complete(ctx, Vec::new()).await?;
        let text = content_text(&second.content);
        ctx.push(Message::new_assistant(second.content));

        Ok((text, Some(outcome)))
    }

    /// Sends the transcript to the model, bounded by the upstream timeout.
    async fn complete(
        &self,
        ctx: &ConversationContext,
        tools: Vec<ToolDescriptor>,
    ) -> Result<LLMOutput, OrchestrationError> {
        let input = LLMInput {
            model: self.config.model.clone(),
            messages: ctx.messages().to_vec(),
            tools,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let limit = self.config.upstream_timeout;
        match tokio::time::timeout(limit, self.llm_client.complete(input)).await {
            Ok(Ok(output)) => Ok(output),
            // A client with its own HTTP deadline can expire first.
            Ok(Err(LLMError::NetworkError(e))) if e.is_timeout() => {
                Err(OrchestrationError::UpstreamTimeout(limit))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(OrchestrationError::UpstreamTimeout(limit)),
        }
    }

    /// Runs a tool directly, without involving the model.
    ///
    /// Unknown tools are reported as not found; nothing is synthesized.
    pub async fn execute_tool(&self, name: &str, parameters: Value) -> Result<Value, ToolError> {
        let registry = self.tool_executor.load().await;
        registry.execute(name, parameters).await
    }
}

fn transition(ctx: &ConversationContext, state: CycleState) {
    debug!(cycle = %ctx.id, ?state, messages = ctx.message_count(), "Cycle state");
}

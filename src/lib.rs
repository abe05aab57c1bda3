//! # Toolcall Relay
//!
//! Mediates between a chat-completion model and a directory of locally
//! defined tools.
//!
//! ## Features
//!
//! - **Tool Registry**: Tools are loaded from JSON manifests on every cycle, so
//!   new files are picked up without a restart
//! - **Two-Phase Orchestration**: Offer the catalog, run the requested call,
//!   send the result back and return the final answer
//! - **Tool Synthesis**: A tool the model asks for but that does not exist is
//!   written as a placeholder stub and loaded on the spot
//! - **HTTP Front End**: `axum` routes for orchestration and direct tool calls
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolcall_relay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let llm_client = LLMClientBuilder::new()
//!         .with_api_key(std::env::var("OPENAI_API_KEY")?)
//!         .build_openai()?;
//!
//!     let executor = ToolExecutor::new(
//!         ToolLoader::new("functions"),
//!         Arc::new(StubSynthesizer::new("functions")),
//!     );
//!
//!     let orchestrator = Orchestrator::with_defaults(llm_client, executor);
//!     let outcome = orchestrator.run("What is 5 times 3?").await?;
//!     println!("{}", outcome.message);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod server;
pub mod session;
pub mod tool;

// Re-exports for convenient usage
pub use agent::{CycleOutcome, CycleState, Orchestrator, OrchestratorConfig};
pub use config::AppConfig;
pub use error::{ErrorKind, OrchestrationError};
pub use llm::{LLMClient, LLMClientBuilder, LLMError, LLMInput, LLMOutput, OpenAIClient};
pub use session::{ConversationContext, Message, MessageContent, MessageRole, PendingToolCall};
pub use tool::{
    DynTool, StubSynthesizer, Tool, ToolDescriptor, ToolError, ToolExecutor, ToolLoader, ToolRegistry,
    ToolSynthesizer,
};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::agent::{Orchestrator, OrchestratorConfig};
    pub use crate::llm::{LLMClient, LLMClientBuilder, OpenAIClient};
    pub use crate::tool::{
        DynTool, StubSynthesizer, Tool, ToolDescriptor, ToolError, ToolExecutor, ToolLoader, ToolRegistry,
    };
    pub use std::sync::Arc;
}

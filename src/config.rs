//! Runtime configuration, read from command-line flags and the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::agent::{Orchestrator, OrchestratorConfig};
use crate::llm::{LLMClient, LLMClientBuilder, LLMError};
use crate::tool::{StubSynthesizer, ToolExecutor, ToolLoader};

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the chat-completions API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Model to request completions from
    #[arg(long, env = "RELAY_MODEL", default_value = "gpt-4o")]
    pub model: String,

    /// System prompt that opens every conversation
    #[arg(long, env = "RELAY_SYSTEM_PROMPT", default_value = "You are a helpful assistant.")]
    pub system_prompt: String,

    /// Directory holding tool manifests
    #[arg(long, env = "RELAY_TOOLS_DIR", default_value = "functions")]
    pub tools_dir: PathBuf,

    /// Address the HTTP server listens on
    #[arg(long, env = "RELAY_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Seconds to wait for each chat-completion call
    #[arg(long, env = "RELAY_UPSTREAM_TIMEOUT_SECS", default_value_t = 60)]
    pub upstream_timeout_secs: u64,
}

impl AppConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            upstream_timeout: self.upstream_timeout(),
            ..OrchestratorConfig::default()
        }
    }

    pub fn tool_loader(&self) -> ToolLoader {
        ToolLoader::new(&self.tools_dir)
    }

    pub fn tool_executor(&self) -> ToolExecutor {
        ToolExecutor::new(
            self.tool_loader(),
            Arc::new(StubSynthesizer::new(&self.tools_dir)),
        )
    }

    /// Builds the OpenAI client.
    ///
    /// No HTTP timeout is set here; the orchestrator bounds each call.
    pub fn llm_client(&self) -> Result<Arc<dyn LLMClient>, LLMError> {
        let mut builder = LLMClientBuilder::new();
        if let Some(key) = &self.api_key {
            builder = builder.with_api_key(key);
        }
        if let Some(url) = &self.base_url {
            builder = builder.with_base_url(url);
        }
        builder.build_openai()
    }

    /// Builds an orchestrator wired to OpenAI and the configured tool directory.
    pub fn orchestrator(&self) -> Result<Orchestrator, LLMError> {
        Ok(Orchestrator::new(
            self.llm_client()?,
            self.tool_executor(),
            self.orchestrator_config(),
        ))
    }
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolcall_relay::tool::ToolSynthesizer;
use toolcall_relay::{AppConfig, StubSynthesizer, server};

#[derive(Debug, Parser)]
#[command(name = "toolcall-relay", version, about = "Relay chat-completion tool calls to local tools")]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Run one orchestration cycle and print the answer
    Ask {
        /// The user message
        message: String,
    },
    /// Execute a tool directly
    Call {
        /// Tool name
        name: String,
        /// Arguments as a JSON object or array
        #[arg(default_value = "{}")]
        params: String,
    },
    /// Print the tool catalog
    List,
    /// Write a placeholder tool
    Synthesize {
        /// Tool name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("toolcall_relay=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Command::Serve => {
            let orchestrator = config.orchestrator().context("failed to build LLM client")?;
            server::serve(config.bind, orchestrator)
                .await
                .with_context(|| format!("server on {} failed", config.bind))?;
        }
        Command::Ask { message } => {
            let orchestrator = config.orchestrator().context("failed to build LLM client")?;
            let outcome = orchestrator.run(&message).await?;
            println!("{}", outcome.message);
        }
        Command::Call { name, params } => {
            let params: serde_json::Value =
                serde_json::from_str(&params).context("arguments must be valid JSON")?;
            let registry = config.tool_loader().load().await;
            let result = registry.execute(&name, params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::List => {
            let registry = config.tool_loader().load().await;
            for descriptor in registry.catalog() {
                println!("{}\t{}", descriptor.name, descriptor.description);
            }
        }
        Command::Synthesize { name } => {
            let path = StubSynthesizer::new(&config.tools_dir).synthesize(&name).await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

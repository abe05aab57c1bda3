pub mod descriptor;
pub mod executor;
pub mod expression;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod synthesizer;

pub use descriptor::{ParamType, ParameterSchema, ParameterSpec, ToolDescriptor, is_valid_tool_name};
pub use executor::{ToolExecutor, ToolOutcome};
pub use loader::{LoadReport, ToolLoader};
pub use manifest::{Executable, ManifestTool, ToolManifest};
pub use registry::ToolRegistry;
pub use synthesizer::{StubSynthesizer, ToolSynthesizer};
pub use tool_types::ToolError;
pub use tool_trait::{DynTool, Tool};

mod tool_types {
    use std::path::PathBuf;

    /// Errors that can occur when loading, resolving or executing a tool.
    #[derive(Debug, thiserror::Error)]
    pub enum ToolError {
        /// A tool file could not be read or parsed
        #[error("Failed to load tool module {}: {reason}", .path.display())]
        ModuleLoad { path: PathBuf, reason: String },
        /// A tool's descriptor or executable failed validation
        #[error("Invalid tool schema for '{tool}': {reason}")]
        SchemaValidation { tool: String, reason: String },
        /// No tool with the requested name is registered
        #[error("Tool not found: {0}")]
        NotFound(String),
        /// The call arguments do not fit the declared parameters
        #[error("Invalid arguments for '{tool}': {reason}")]
        ArgumentMismatch { tool: String, reason: String },
        /// The tool body itself failed
        #[error("Execution of '{tool}' failed: {reason}")]
        ExecutionFailed { tool: String, reason: String },
        /// A stub tool could not be written
        #[error("Failed to synthesize tool '{tool}': {reason}")]
        SynthesisFailed { tool: String, reason: String },
    }

    impl ToolError {
        pub(crate) fn schema(tool: &str, reason: impl Into<String>) -> Self {
            Self::SchemaValidation {
                tool: tool.to_string(),
                reason: reason.into(),
            }
        }

        pub(crate) fn execution(tool: &str, reason: impl Into<String>) -> Self {
            Self::ExecutionFailed {
                tool: tool.to_string(),
                reason: reason.into(),
            }
        }
    }
}

mod tool_trait {
    use super::descriptor::ToolDescriptor;
    use super::tool_types::ToolError;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::Arc;

    /// A tool the orchestration loop can advertise to the model and invoke.
    #[async_trait]
    pub trait Tool: Send + Sync {
        /// Returns the schema contract of the tool.
        fn descriptor(&self) -> &ToolDescriptor;

        /// Returns the name of the tool.
        fn name(&self) -> &str {
            &self.descriptor().name
        }

        /// Executes the tool with arguments already bound to its parameters.
        async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError>;
    }

    /// A type alias for a dynamic tool reference.
    pub type DynTool = Arc<dyn Tool>;
}

//! Error types for the relay.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::llm::LLMError;
use crate::tool::ToolError;

/// Failure kinds callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModuleLoad,
    SchemaValidation,
    ToolNotFound,
    ArgumentMismatch,
    ToolExecution,
    Upstream,
    UpstreamTimeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleLoad => "module_load",
            Self::SchemaValidation => "schema_validation",
            Self::ToolNotFound => "tool_not_found",
            Self::ArgumentMismatch => "argument_mismatch",
            Self::ToolExecution => "tool_execution",
            Self::Upstream => "upstream",
            Self::UpstreamTimeout => "upstream_timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToolError {
    /// The failure kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModuleLoad { .. } => ErrorKind::ModuleLoad,
            Self::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            Self::NotFound(_) => ErrorKind::ToolNotFound,
            Self::ArgumentMismatch { .. } => ErrorKind::ArgumentMismatch,
            Self::ExecutionFailed { .. } | Self::SynthesisFailed { .. } => ErrorKind::ToolExecution,
        }
    }
}

/// Errors that abort an orchestration cycle.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Resolving or running the requested tool failed
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The chat-completion service returned an error
    #[error("LLM error: {0}")]
    Upstream(#[from] LLMError),

    /// The chat-completion service did not answer in time
    #[error("LLM request timed out after {0:?}")]
    UpstreamTimeout(Duration),
}

impl OrchestrationError {
    /// The failure kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Tool(e) => e.kind(),
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::UpstreamTimeout(_) => ErrorKind::UpstreamTimeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_source_error() {
        let err = OrchestrationError::from(ToolError::NotFound("x".to_string()));
        assert_eq!(err.kind(), ErrorKind::ToolNotFound);
        assert_eq!(err.to_string(), "Tool not found: x");

        let err = OrchestrationError::from(LLMError::ApiError("500".to_string()));
        assert_eq!(err.kind(), ErrorKind::Upstream);

        let err = OrchestrationError::UpstreamTimeout(Duration::from_secs(3));
        assert_eq!(err.kind().as_str(), "upstream_timeout");
    }
}

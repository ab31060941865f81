//! Error types for Convoy.

use thiserror::Error;

/// Primary error type for all Convoy operations.
#[derive(Error, Debug)]
pub enum ConvoyError {
    /// The model gateway could not produce a response (transport, auth,
    /// rate limit). Retry policy is the gateway's responsibility; the loop
    /// surfaces this as-is.
    #[error("model gateway unavailable: {message}")]
    ModelUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments failed schema validation. Every violation is listed, not
    /// just the first, so the model gets the maximal correction signal.
    #[error("invalid arguments for tool '{tool}': {}", violations.join("; "))]
    InvalidArguments { tool: String, violations: Vec<String> },

    #[error("tool '{tool}' timed out after {timeout_ms}ms")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// A tool marked fatal failed; the run aborts with the partial transcript.
    #[error("fatal tool '{tool}' failed: {message}")]
    ToolFatal { tool: String, message: String },

    #[error("turn limit of {limit} reached without a direct answer")]
    TurnLimitExceeded { limit: usize },

    /// A `tool` message does not reference a prior assistant tool call.
    #[error("tool message references unknown tool_call_id '{tool_call_id}'")]
    DanglingToolReference { tool_call_id: String },

    #[error("no agent matched the message{}", best.as_deref().map(|b| format!(" (best candidate: {b})")).unwrap_or_default())]
    NoAgentMatched { best: Option<String> },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl ConvoyError {
    /// Create a gateway failure without an underlying source.
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a tool execution failure.
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether the loop recovers from this error by synthesizing a `tool`
    /// error message instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_)
                | Self::InvalidArguments { .. }
                | Self::ToolTimeout { .. }
                | Self::ToolExecution { .. }
        )
    }

    /// Whether a gateway adapter may reasonably retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. } | Self::Timeout(_))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ConvoyError>;

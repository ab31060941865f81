//! Events emitted while a run is in flight.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolCall, Transcript};

use super::types::{RunId, RunStatus};

/// Incremental view of a run, surfaced both through the [`RunHandle`]'s
/// event stream and through an optional sink callback.
///
/// [`RunHandle`]: super::runner::RunHandle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    RunStarted {
        run_id: RunId,
        agent: String,
    },
    /// Retrieved context was injected before the first model query.
    ContextInjected {
        snippets: usize,
    },
    TurnStarted {
        turn: usize,
    },
    /// Incremental assistant text from the model stream.
    AssistantDelta {
        text: String,
    },
    /// The assistant turn was fully parsed and appended.
    AssistantMessage {
        message: Message,
    },
    ToolCallStarted {
        call: ToolCall,
    },
    ToolResult {
        tool_call_id: String,
        result: serde_json::Value,
        is_error: bool,
    },
    /// Transcript snapshot after a turn's tool results were appended.
    TurnCompleted {
        turn: usize,
        transcript: Transcript,
    },
    RunCompleted {
        run_id: RunId,
        status: RunStatus,
        error: Option<String>,
    },
}

/// Callback sink for streaming run events.
pub type AgentEventSink = Arc<dyn Fn(AgentEvent) + Send + Sync>;

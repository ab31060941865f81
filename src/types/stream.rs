//! Streaming delta types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::ToolCall;

/// A delta emitted while the model streams a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamDelta {
    pub event_type: StreamEventType,
    /// Incremental text (for `TextDelta` events).
    #[serde(default)]
    pub text: String,
    /// Accumulated tool call state (for `ToolCallDelta` events). Adapters
    /// emit the call keyed by id; later deltas for the same id replace the
    /// earlier state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// Only present on the final delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::TextDelta,
            text: text.into(),
            tool_call: None,
            finish_reason: None,
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            event_type: StreamEventType::ToolCallDelta,
            text: String::new(),
            tool_call: Some(call),
            finish_reason: None,
        }
    }

    pub fn done(finish_reason: FinishReason) -> Self {
        Self {
            event_type: StreamEventType::Done,
            text: String::new(),
            tool_call: None,
            finish_reason: Some(finish_reason),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::Error,
            text: message.into(),
            tool_call: None,
            finish_reason: Some(FinishReason::Error),
        }
    }
}

/// Type of stream event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    /// Incremental text content.
    TextDelta,
    /// Tool call being built.
    ToolCallDelta,
    /// Stream finished.
    Done,
    /// Error during the stream.
    Error,
}

/// Why the model's turn finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    Error,
}

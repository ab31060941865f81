//! Message types forming the conversation transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique within the turn.
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a tool call with a fresh id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool call with a caller-supplied id (as received from a model).
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single turn record in a conversation.
///
/// Immutable once appended to a [`Transcript`](super::Transcript). A `Tool`
/// message always carries a `tool_call_id` referencing a prior assistant
/// message's tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Attribution for multi-agent conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create an assistant message with plain text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create an assistant message carrying tool calls.
    ///
    /// Any accompanying text is kept on the message but the tool calls take
    /// precedence for loop termination.
    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            name: None,
            tool_calls,
            tool_call_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a tool result message answering `tool_call_id`.
    ///
    /// The structured result is serialized into the message content.
    pub fn tool_result(tool_call_id: impl Into<String>, result: &serde_json::Value) -> Self {
        let content = match result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            role: Role::Tool,
            content,
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a tool error message so the model can self-correct.
    pub fn tool_error(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::tool_result(
            tool_call_id,
            &serde_json::json!({ "error": error.into() }),
        )
    }

    /// Set the attribution name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether the message carries tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

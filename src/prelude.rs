//! Convenience re-exports for the common path.

pub use crate::agent::{Agent, AgentConfig, TerminationPolicy};
pub use crate::agent_loop::{
    AgentEvent, AgentEventSink, LoopRunner, RunHandle, RunOutcome, RunRequest, RunStatus, Runner,
};
pub use crate::coordinator::{
    GroupChat, GroupChatConfig, GroupOutcome, KeywordRoutingStrategy, KeywordRule,
    ModelRoutingStrategy, RouteOutcome, Router, RouterConfig, RoutingDecision, RoutingStrategy,
};
pub use crate::error::{ConvoyError, Result};
pub use crate::gateway::{
    DeltaStream, GatewayRequest, GenerationSettings, ModelGateway, RetryPolicy, ToolDefinition,
};
pub use crate::retrieval::{RetrievalPolicy, Retriever, Snippet};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolContext, ToolParameters, ToolRegistry};
pub use crate::types::{FinishReason, Message, Role, StreamDelta, StreamEventType, ToolCall, Transcript};

//! Multi-agent coordination: round-robin group chats and routed dispatch.

pub mod group;
pub mod router;

pub use group::{GroupChat, GroupChatConfig, GroupOutcome};
pub use router::{
    AgentProfile, KeywordRoutingStrategy, KeywordRule, ModelRoutingStrategy, RouteOutcome, Router,
    RouterConfig, RoutingDecision, RoutingStrategy,
};

//! Convoy: an agent orchestration framework for tool-using language models.
//!
//! Convoy turns a chat-completion backend into agents: each [`Agent`] runs a
//! loop that queries a [`ModelGateway`], dispatches the tool calls the model
//! requests through a validated [`ToolRegistry`], feeds the results back, and
//! repeats until the model answers directly or a limit trips. Multi-agent
//! topologies build on the same loop: [`GroupChat`] rotates a roster over a
//! shared transcript, [`Router`] hands each conversation to the single
//! best-suited agent.
//!
//! [`Agent`]: agent::Agent
//! [`ModelGateway`]: gateway::ModelGateway
//! [`ToolRegistry`]: tools::ToolRegistry
//! [`GroupChat`]: coordinator::GroupChat
//! [`Router`]: coordinator::Router
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use convoy::prelude::*;
//!
//! struct MyGateway;
//!
//! #[async_trait]
//! impl ModelGateway for MyGateway {
//!     fn name(&self) -> &str {
//!         "my-backend"
//!     }
//!
//!     async fn complete(&self, _request: &GatewayRequest) -> Result<Message> {
//!         // Call your model API here.
//!         Ok(Message::assistant("42"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut registry = ToolRegistry::new();
//!     registry.register(Arc::new(FnTool::new(
//!         "add",
//!         "Add two numbers",
//!         ToolParameters::object()
//!             .number("a", "First addend", true)
//!             .number("b", "Second addend", true)
//!             .build(),
//!         |args, _ctx| async move {
//!             Ok(serde_json::json!(args.get_f64("a")? + args.get_f64("b")?))
//!         },
//!     )))?;
//!
//!     let agent = Agent::new(
//!         AgentConfig::new("calculator").with_system_prompt("You do arithmetic."),
//!         Arc::new(MyGateway),
//!         Arc::new(registry),
//!     )?;
//!
//!     let outcome = agent.prompt("What is 19 + 23?").await?;
//!     println!("{}", outcome.final_text().unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod prelude;
pub mod retrieval;
pub mod tools;
pub mod types;
pub mod util;

pub use error::{ConvoyError, Result};

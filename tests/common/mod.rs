//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use convoy::gateway::{DeltaStream, GatewayRequest, ModelGateway};
use convoy::retrieval::{Retriever, Snippet};
use convoy::tools::{FnTool, Tool, ToolParameters, ToolRegistry};
use convoy::types::Message;
use convoy::{ConvoyError, Result};

/// Gateway that replays a fixed script of assistant messages, one per query.
///
/// Once the script runs dry it fails, so a looping bug shows up as a gateway
/// error instead of a hang.
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Message>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(script: Vec<Message>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completed model queries so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: &GatewayRequest) -> Result<Message> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or_else(|| ConvoyError::model_unavailable("script exhausted"))
    }
}

/// Gateway that always replies with the same assistant message.
pub struct RepeatingGateway {
    reply: Message,
    calls: AtomicUsize,
}

impl RepeatingGateway {
    pub fn new(reply: Message) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for RepeatingGateway {
    fn name(&self) -> &str {
        "repeating"
    }

    async fn complete(&self, _request: &GatewayRequest) -> Result<Message> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Gateway that hangs inside `complete` and relies on the default stream
/// adapter, like a whole-response backend whose request never returns.
pub struct StallingGateway;

#[async_trait]
impl ModelGateway for StallingGateway {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn complete(&self, _request: &GatewayRequest) -> Result<Message> {
        futures::future::pending().await
    }
}

/// Gateway whose stream stays open and never yields a delta.
pub struct PendingGateway;

#[async_trait]
impl ModelGateway for PendingGateway {
    fn name(&self) -> &str {
        "pending"
    }

    async fn complete(&self, _request: &GatewayRequest) -> Result<Message> {
        futures::future::pending().await
    }

    async fn stream(&self, _request: &GatewayRequest) -> Result<DeltaStream> {
        Ok(futures::stream::pending().boxed())
    }
}

/// Retriever returning a fixed snippet list.
pub struct StaticRetriever {
    snippets: Vec<Snippet>,
    queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    pub fn new(snippets: Vec<Snippet>) -> Self {
        Self {
            snippets,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Snippet>> {
        self.queries
            .lock()
            .expect("queries lock")
            .push(query.to_string());
        Ok(self.snippets.iter().take(top_k).cloned().collect())
    }
}

/// Retriever that always fails, for non-fatal-retrieval tests.
pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Snippet>> {
        Err(ConvoyError::model_unavailable("index offline"))
    }
}

/// `add` tool summing two numbers.
pub fn add_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "add",
        "Add two numbers",
        ToolParameters::object()
            .number("a", "First addend", true)
            .number("b", "Second addend", true)
            .build(),
        |args, _ctx| async move {
            Ok(serde_json::json!({ "sum": args.get_f64("a")? + args.get_f64("b")? }))
        },
    ))
}

/// `wait_then_echo` tool that sleeps before echoing, to exercise completion
/// order versus request order.
pub fn wait_then_echo_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "wait_then_echo",
        "Sleep for delay_ms, then echo text",
        ToolParameters::object()
            .integer("delay_ms", "Sleep before echoing", true)
            .string("text", "Text to echo", true)
            .build(),
        |args, _ctx| async move {
            let delay = args.get_i64("delay_ms")? as u64;
            let text = args.get_str("text")?.to_string();
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(serde_json::json!({ "echo": text }))
        },
    ))
}

/// `fail` tool that always errors; fatal when asked.
pub fn fail_tool(fatal: bool) -> Arc<dyn Tool> {
    Arc::new(
        FnTool::new(
            "fail",
            "Always fails",
            ToolParameters::empty(),
            |_args, _ctx| async move {
                Err(ConvoyError::tool_execution("fail", "deliberate failure"))
            },
        )
        .with_fatal(fatal),
    )
}

/// `stall` tool that sleeps far longer than any test timeout.
pub fn stall_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "stall",
        "Sleeps for an hour",
        ToolParameters::empty(),
        |_args, _ctx| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(serde_json::Value::Null)
        },
    ))
}

/// Registry preloaded with the standard test tools.
pub fn standard_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(add_tool()).expect("register add");
    registry
        .register(wait_then_echo_tool())
        .expect("register wait_then_echo");
    registry.register(fail_tool(false)).expect("register fail");
    registry.register(stall_tool()).expect("register stall");
    registry
}

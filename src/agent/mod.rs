//! The agent facade: configuration plus a ready-to-run loop.

pub mod config;

pub use config::{AgentConfig, TerminationPolicy};

use std::sync::Arc;

use crate::agent_loop::{LoopRunner, RunHandle, RunOutcome, RunRequest, Runner};
use crate::error::Result;
use crate::gateway::ModelGateway;
use crate::retrieval::Retriever;
use crate::tools::ToolRegistry;
use crate::types::{Message, Transcript};

/// A configured agent bound to a gateway and a tool registry.
///
/// Construction is where configuration errors surface: an allowlist naming an
/// unregistered tool fails here, not mid-run.
pub struct Agent {
    config: AgentConfig,
    runner: LoopRunner,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        gateway: Arc<dyn ModelGateway>,
        registry: Arc<ToolRegistry>,
    ) -> Result<Self> {
        // Resolving the allowlist validates every entry.
        registry.definitions(config.function_list.as_deref())?;
        Ok(Self {
            config,
            runner: LoopRunner::new(gateway, registry),
        })
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.runner = self.runner.with_retriever(retriever);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> Option<&str> {
        self.config.description.as_deref()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Start a run and return its handle without waiting.
    pub fn start(&self, transcript: Transcript) -> Result<RunHandle> {
        self.runner
            .start(RunRequest::new(transcript, self.config.clone()))
    }

    /// Run a transcript to completion.
    ///
    /// The outcome is returned for every terminal status; callers inspect
    /// `status` and `error` rather than matching on `Err` for run failures.
    pub async fn run(&self, transcript: Transcript) -> Result<RunOutcome> {
        self.start(transcript)?.wait().await
    }

    /// Run a single user prompt.
    pub async fn prompt(&self, text: impl Into<String>) -> Result<RunOutcome> {
        let mut transcript = Transcript::new();
        transcript.push(Message::user(text));
        self.run(transcript).await
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .finish()
    }
}

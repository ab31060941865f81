//! Agent configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::GenerationSettings;
use crate::retrieval::RetrievalPolicy;

/// When the loop considers an agent's participation finished.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// Stop as soon as the model answers without tool calls.
    #[default]
    DirectAnswer,
    /// Additionally stop once the assistant text contains this phrase,
    /// even if the turn carried tool calls (their results are still
    /// recorded before the run ends).
    Phrase(String),
}

/// Immutable configuration for one agent.
///
/// Behavior is composed from orthogonal policies (tool allowlist, retrieval,
/// termination) rather than subtyping; every agent runs the same loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    /// Tools this agent may call. `None` exposes every registered tool.
    pub function_list: Option<Vec<String>>,
    /// Upper bound on model queries per run.
    pub max_turns: usize,
    pub termination: TerminationPolicy,
    pub retrieval: RetrievalPolicy,
    pub retrieval_top_k: usize,
    /// Timeout applied to each tool invocation.
    pub tool_timeout: Duration,
    pub settings: GenerationSettings,
}

impl AgentConfig {
    pub const DEFAULT_MAX_TURNS: usize = 10;
    pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_RETRIEVAL_TOP_K: usize = 5;

    /// Create a configuration with defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            system_prompt: None,
            function_list: None,
            max_turns: Self::DEFAULT_MAX_TURNS,
            termination: TerminationPolicy::default(),
            retrieval: RetrievalPolicy::default(),
            retrieval_top_k: Self::DEFAULT_RETRIEVAL_TOP_K,
            tool_timeout: Self::DEFAULT_TOOL_TIMEOUT,
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Restrict the agent to the named tools.
    pub fn with_function_list(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.function_list = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_retrieval(mut self, policy: RetrievalPolicy, top_k: usize) -> Self {
        self.retrieval = policy;
        self.retrieval_top_k = top_k;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }
}

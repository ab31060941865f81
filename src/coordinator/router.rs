//! Routing: pick the best-suited agent for a message and hand it off.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::agent_loop::RunOutcome;
use crate::error::{ConvoyError, Result};
use crate::gateway::{GatewayRequest, GenerationSettings, ModelGateway};
use crate::types::{Message, Role, Transcript};

/// Routing view of an agent: just enough for a strategy to choose.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
}

/// A strategy's verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingDecision {
    /// May name an agent outside the roster; the router validates it.
    pub selected_agent: String,
    pub rationale: String,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
}

/// Pluggable agent selection.
#[async_trait]
pub trait RoutingStrategy: Send + Sync {
    async fn decide(
        &self,
        roster: &[AgentProfile],
        transcript: &Transcript,
    ) -> Result<RoutingDecision>;
}

/// Router settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Decisions below this confidence fall through to the default agent.
    pub confidence_threshold: f64,
    /// Catch-all agent when no confident match exists.
    pub default_agent: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            default_agent: None,
        }
    }
}

/// A routing decision together with the dispatched run's outcome.
#[derive(Debug)]
pub struct RouteOutcome {
    pub decision: RoutingDecision,
    pub outcome: RunOutcome,
}

/// Dispatches each conversation to exactly one agent from a roster.
pub struct Router {
    agents: Vec<Arc<Agent>>,
    strategy: Box<dyn RoutingStrategy>,
    config: RouterConfig,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field(
                "agents",
                &self.agents.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(
        agents: Vec<Arc<Agent>>,
        strategy: Box<dyn RoutingStrategy>,
        config: RouterConfig,
    ) -> Result<Self> {
        if agents.is_empty() {
            return Err(ConvoyError::InvalidArgument(
                "router needs at least one agent".into(),
            ));
        }
        for (i, agent) in agents.iter().enumerate() {
            if agents[..i].iter().any(|a| a.name() == agent.name()) {
                return Err(ConvoyError::InvalidArgument(format!(
                    "duplicate agent name: {}",
                    agent.name()
                )));
            }
        }
        if let Some(default) = &config.default_agent {
            if !agents.iter().any(|a| a.name() == default) {
                return Err(ConvoyError::InvalidArgument(format!(
                    "default agent '{default}' is not in the roster"
                )));
            }
        }
        Ok(Self {
            agents,
            strategy,
            config,
        })
    }

    fn roster(&self) -> Vec<AgentProfile> {
        self.agents
            .iter()
            .map(|a| AgentProfile {
                name: a.name().to_string(),
                description: a.description().unwrap_or_default().to_string(),
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<&Arc<Agent>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    /// Decide which agent should handle the transcript.
    ///
    /// A decision naming an unknown agent or falling below the confidence
    /// threshold falls through to the default agent; with no default
    /// configured, routing fails with [`ConvoyError::NoAgentMatched`]
    /// carrying the best (rejected) candidate.
    pub async fn route(&self, transcript: &Transcript) -> Result<RoutingDecision> {
        let decision = self.strategy.decide(&self.roster(), transcript).await?;
        tracing::debug!(
            selected = %decision.selected_agent,
            confidence = decision.confidence,
            "routing decision"
        );

        let known = self.find(&decision.selected_agent).is_some();
        if known && decision.confidence >= self.config.confidence_threshold {
            return Ok(decision);
        }

        if let Some(default) = &self.config.default_agent {
            tracing::debug!(default = %default, "falling back to default agent");
            return Ok(RoutingDecision {
                selected_agent: default.clone(),
                rationale: format!(
                    "no confident match (best: '{}' at {:.2}); fell back to default",
                    decision.selected_agent, decision.confidence
                ),
                confidence: decision.confidence,
            });
        }

        Err(ConvoyError::NoAgentMatched {
            best: (!decision.selected_agent.is_empty()).then(|| decision.selected_agent),
        })
    }

    /// Route and run: only the selected agent sees the transcript.
    pub async fn dispatch(&self, transcript: Transcript) -> Result<RouteOutcome> {
        let decision = self.route(&transcript).await?;
        let agent = self.find(&decision.selected_agent).ok_or_else(|| {
            ConvoyError::InvalidState(format!(
                "routed to unknown agent '{}'",
                decision.selected_agent
            ))
        })?;
        let outcome = agent.run(transcript).await?;
        Ok(RouteOutcome { decision, outcome })
    }
}

/// Asks a model which agent fits, using a `Call: <name>` reply protocol.
///
/// The generation stops at `Reply:` so the router model never writes the
/// answer itself, only the hand-off line.
pub struct ModelRoutingStrategy {
    gateway: Arc<dyn ModelGateway>,
    settings: GenerationSettings,
}

const ROUTER_PROMPT: &str = "You are a dispatcher. Read the conversation and pick the one \
assistant best suited to answer the latest user message.

Available assistants:
{roster}

Answer with exactly one line in this form and nothing else:
Call: <assistant name>";

impl ModelRoutingStrategy {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        let settings = GenerationSettings::builder()
            .temperature(0.0)
            .stop_sequences(vec!["Reply:".to_string()])
            .build();
        Self { gateway, settings }
    }

    fn prompt(roster: &[AgentProfile]) -> String {
        let listing = roster
            .iter()
            .map(|p| {
                if p.description.is_empty() {
                    format!("- {}", p.name)
                } else {
                    format!("- {}: {}", p.name, p.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        ROUTER_PROMPT.replace("{roster}", &listing)
    }

    /// Extract the name after `Call:`, if present.
    fn parse_call(text: &str) -> Option<String> {
        text.lines().find_map(|line| {
            line.trim()
                .strip_prefix("Call:")
                .map(|rest| rest.trim().to_string())
                .filter(|name| !name.is_empty())
        })
    }
}

#[async_trait]
impl RoutingStrategy for ModelRoutingStrategy {
    async fn decide(
        &self,
        roster: &[AgentProfile],
        transcript: &Transcript,
    ) -> Result<RoutingDecision> {
        let mut messages = vec![Message::system(Self::prompt(roster))];
        messages.extend(
            transcript
                .messages()
                .iter()
                .filter(|m| matches!(m.role, Role::User | Role::Assistant))
                .cloned(),
        );

        let request = GatewayRequest {
            messages,
            tools: Vec::new(),
            settings: self.settings.clone(),
        };
        let reply = self.gateway.complete(&request).await?;

        match Self::parse_call(&reply.content) {
            Some(name) => {
                let confidence = if roster.iter().any(|p| p.name == name) {
                    1.0
                } else {
                    0.0
                };
                Ok(RoutingDecision {
                    selected_agent: name,
                    rationale: reply.content.trim().to_string(),
                    confidence,
                })
            }
            None => Ok(RoutingDecision {
                selected_agent: String::new(),
                rationale: format!("router model gave no hand-off line: {}", reply.content.trim()),
                confidence: 0.0,
            }),
        }
    }
}

/// One keyword rule: a set of trigger words for one agent.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub agent: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(agent: impl Into<String>, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            agent: agent.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Deterministic, model-free routing on keyword hits in the latest user
/// message. Confidence is the matched fraction of the winning rule's words.
pub struct KeywordRoutingStrategy {
    rules: Vec<KeywordRule>,
}

impl KeywordRoutingStrategy {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl RoutingStrategy for KeywordRoutingStrategy {
    async fn decide(
        &self,
        _roster: &[AgentProfile],
        transcript: &Transcript,
    ) -> Result<RoutingDecision> {
        let query = transcript.last_user_text().unwrap_or_default().to_lowercase();

        let mut best: Option<(&KeywordRule, Vec<&str>)> = None;
        for rule in &self.rules {
            let matched: Vec<&str> = rule
                .keywords
                .iter()
                .filter(|kw| query.contains(&kw.to_lowercase()))
                .map(String::as_str)
                .collect();
            let better = match &best {
                Some((_, prev)) => matched.len() > prev.len(),
                None => !matched.is_empty(),
            };
            if better {
                best = Some((rule, matched));
            }
        }

        match best {
            Some((rule, matched)) => Ok(RoutingDecision {
                selected_agent: rule.agent.clone(),
                rationale: format!("matched keywords: {}", matched.join(", ")),
                confidence: matched.len() as f64 / rule.keywords.len().max(1) as f64,
            }),
            None => Ok(RoutingDecision {
                selected_agent: String::new(),
                rationale: "no keyword matches".into(),
                confidence: 0.0,
            }),
        }
    }
}

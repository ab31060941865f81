//! Round-robin group chat over a roster of agents.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::agent::Agent;
use crate::agent_loop::RunStatus;
use crate::error::{ConvoyError, Result};
use crate::types::{Role, Transcript};

/// Group chat settings.
#[derive(Debug, Clone)]
pub struct GroupChatConfig {
    /// Number of speaking turns before the chat ends on its own.
    pub max_rounds: usize,
    /// Ends the chat early when an agent's reply contains this phrase.
    pub termination_phrase: Option<String>,
}

impl Default for GroupChatConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            termination_phrase: None,
        }
    }
}

/// Result of one group chat session.
#[derive(Debug)]
pub struct GroupOutcome {
    pub transcript: Transcript,
    /// Speaking turns taken.
    pub rounds: usize,
    /// Agent names in speaking order.
    pub speakers: Vec<String>,
    pub status: RunStatus,
    pub error: Option<ConvoyError>,
}

impl GroupOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Agents speaking in fixed rotation over a shared transcript.
///
/// The cursor survives across sessions, so a follow-up `run` resumes the
/// rotation where the previous one stopped. Each agent sees the shared
/// transcript; only its assistant replies (attributed by name) flow back in,
/// tool traffic stays private to the speaking agent's run.
pub struct GroupChat {
    agents: Vec<Arc<Agent>>,
    config: GroupChatConfig,
    cursor: Mutex<usize>,
}

impl std::fmt::Debug for GroupChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupChat")
            .field(
                "agents",
                &self.agents.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GroupChat {
    /// Build a group chat. Agent names must be unique.
    pub fn new(agents: Vec<Arc<Agent>>, config: GroupChatConfig) -> Result<Self> {
        if agents.is_empty() {
            return Err(ConvoyError::InvalidArgument(
                "group chat needs at least one agent".into(),
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
        Ok(Self {
            agents,
            config,
            cursor: Mutex::new(0),
        })
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// Run one session: up to `max_rounds` speaking turns.
    ///
    /// A failed or canceled agent run ends the session with that status; the
    /// shared transcript keeps everything said up to that point.
    pub async fn run(&self, mut transcript: Transcript) -> Result<GroupOutcome> {
        transcript.validate()?;

        // Held for the whole session: concurrent sessions would interleave
        // the rotation.
        let mut cursor = self.cursor.lock().await;

        let mut rounds = 0usize;
        let mut speakers = Vec::new();

        while rounds < self.config.max_rounds {
            let agent = &self.agents[*cursor % self.agents.len()];
            *cursor = (*cursor + 1) % self.agents.len();
            rounds += 1;
            speakers.push(agent.name().to_string());
            tracing::debug!(round = rounds, speaker = %agent.name(), "group chat turn");

            let outcome = agent.run(transcript.clone()).await?;

            let mut last_reply = None;
            for message in &outcome.response {
                if message.role == Role::Assistant {
                    transcript.push(message.clone());
                    last_reply = Some(message.content.clone());
                }
            }

            if outcome.status != RunStatus::Completed {
                return Ok(GroupOutcome {
                    transcript,
                    rounds,
                    speakers,
                    status: outcome.status,
                    error: outcome.error,
                });
            }

            if let (Some(phrase), Some(reply)) = (&self.config.termination_phrase, &last_reply) {
                if reply.contains(phrase.as_str()) {
                    tracing::debug!(round = rounds, "termination phrase reached");
                    break;
                }
            }
        }

        Ok(GroupOutcome {
            transcript,
            rounds,
            speakers,
            status: RunStatus::Completed,
            error: None,
        })
    }
}

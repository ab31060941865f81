//! Core run types for the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::error::ConvoyError;
use crate::types::{Message, Transcript};

/// Unique run identifier.
pub type RunId = Uuid;

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Canceled,
}

/// Result of one loop execution.
///
/// Partial progress is never discarded: the transcript carries every turn
/// taken and every tool result obtained before a terminal error, so callers
/// can inspect what happened before the failure.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    /// The full working transcript, including injected context.
    pub transcript: Transcript,
    /// Messages appended by this run (assistant turns and tool results).
    pub response: Vec<Message>,
    /// Model queries issued.
    pub turns: usize,
    pub error: Option<ConvoyError>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn completed(
        run_id: RunId,
        transcript: Transcript,
        response: Vec<Message>,
        turns: usize,
    ) -> Self {
        Self {
            run_id,
            status: RunStatus::Completed,
            transcript,
            response,
            turns,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(
        run_id: RunId,
        transcript: Transcript,
        response: Vec<Message>,
        turns: usize,
        error: ConvoyError,
    ) -> Self {
        Self {
            run_id,
            status: RunStatus::Failed,
            transcript,
            response,
            turns,
            error: Some(error),
            finished_at: Utc::now(),
        }
    }

    pub fn canceled(
        run_id: RunId,
        transcript: Transcript,
        response: Vec<Message>,
        turns: usize,
    ) -> Self {
        Self {
            run_id,
            status: RunStatus::Canceled,
            transcript,
            response,
            turns,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Text of the final assistant message, if any.
    pub fn final_text(&self) -> Option<&str> {
        self.transcript.final_text()
    }
}

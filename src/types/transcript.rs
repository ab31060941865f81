//! Append-only conversation transcript.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ConvoyError, Result};

use super::message::{Message, Role};

/// Ordered conversation history exchanged with the model.
///
/// Owned exclusively by one loop execution; each run works on its own copy,
/// and messages are only ever appended during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transcript from existing messages, validating tool references.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self> {
        let transcript = Self { messages };
        transcript.validate()?;
        Ok(transcript)
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append several messages in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Insert a message before `index`. Only used while seeding a run
    /// (system prompt, retrieved context); transcripts stay append-only
    /// once the loop is querying the model.
    pub(crate) fn insert(&mut self, index: usize, message: Message) {
        self.messages.insert(index, message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the most recent user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Index of the most recent user message, if any.
    pub(crate) fn last_user_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == Role::User)
    }

    /// Text of the most recent assistant message, if any.
    pub fn final_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Check transcript invariants.
    ///
    /// Every `tool` message must carry a `tool_call_id` referencing a tool
    /// call on an earlier assistant message; violations fail with
    /// [`ConvoyError::DanglingToolReference`].
    pub fn validate(&self) -> Result<()> {
        let mut known_ids: HashSet<&str> = HashSet::new();
        for message in &self.messages {
            match message.role {
                Role::Assistant => {
                    for call in &message.tool_calls {
                        known_ids.insert(call.id.as_str());
                    }
                }
                Role::Tool => {
                    let id = message.tool_call_id.as_deref().ok_or_else(|| {
                        ConvoyError::DanglingToolReference {
                            tool_call_id: "<missing>".into(),
                        }
                    })?;
                    if !known_ids.contains(id) {
                        return Err(ConvoyError::DanglingToolReference {
                            tool_call_id: id.to_string(),
                        });
                    }
                }
                Role::System | Role::User => {}
            }
        }
        Ok(())
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl IntoIterator for Transcript {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

//! Memory/retrieval adapter contract and context injection.
//!
//! The loop treats retrieval as an external collaborator: anything that can
//! turn a query into scored text snippets can back an agent. The snippets are
//! injected into the working transcript as a knowledge block before the first
//! model query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Message, Transcript};

/// A scored text snippet returned by a retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snippet {
    pub text: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Snippet {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// External retrieval contract.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return at most `top_k` snippets relevant to `query`, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Snippet>>;
}

/// When the loop consults the retriever.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPolicy {
    /// Never search.
    #[default]
    Off,
    /// Search, and inject only when at least one snippet came back.
    WhenAvailable,
    /// Search and inject whatever came back, even an empty block.
    Forced,
}

/// Format snippets into a knowledge-block system message.
pub fn knowledge_message(snippets: &[Snippet]) -> Message {
    let mut block = String::from("# Knowledge Base\n");
    if snippets.is_empty() {
        block.push_str("\n(no relevant content retrieved)\n");
    }
    for snippet in snippets {
        block.push('\n');
        match &snippet.source {
            Some(source) => {
                block.push_str(&format!("## Source: {} (score {:.3})\n", source, snippet.score));
            }
            None => {
                block.push_str(&format!("## Retrieved (score {:.3})\n", snippet.score));
            }
        }
        block.push_str(snippet.text.trim());
        block.push('\n');
    }
    Message::system(block)
}

/// Insert the knowledge block immediately before the latest user message, or
/// at the end if the transcript has none.
pub(crate) fn inject(transcript: &mut Transcript, snippets: &[Snippet]) {
    let message = knowledge_message(snippets);
    match transcript.last_user_index() {
        Some(index) => transcript.insert(index, message),
        None => transcript.push(message),
    }
}

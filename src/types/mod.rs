//! Core data types: messages, transcripts, streaming deltas.

pub mod message;
pub mod stream;
pub mod transcript;

pub use message::{Message, Role, ToolCall};
pub use stream::{FinishReason, StreamDelta, StreamEventType};
pub use transcript::Transcript;

//! Run lifecycle: the loop itself, its events, and its outcome types.

pub mod events;
pub mod runner;
pub mod types;

pub use events::{AgentEvent, AgentEventSink};
pub use runner::{LoopRunner, RunHandle, RunRequest, Runner, DEFAULT_STREAM_IDLE_TIMEOUT_MS};
pub use types::{RunId, RunOutcome, RunStatus};

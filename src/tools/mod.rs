//! Tool system for function calling.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use registry::{CallOutcome, ToolRegistry};
pub use tool::{FnTool, Tool, ToolContext};
pub use types::ToolParameters;

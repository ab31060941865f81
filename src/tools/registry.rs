//! Tool registry: owns the set of callable tools and mediates safe invocation.
//!
//! Centralizing validation here gives every backend one failure vocabulary
//! the model can parse and react to, instead of leaking tool-specific
//! failures into the transcript.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConvoyError, Result};
use crate::gateway::ToolDefinition;
use crate::types::ToolCall;
use crate::util::with_timeout;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolContext};
use super::validation::validate_arguments;

/// Outcome of dispatching one tool call, in the loop's failure vocabulary.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub call: ToolCall,
    pub result: serde_json::Value,
    pub is_error: bool,
    /// Set when the failed tool was marked fatal; the loop aborts.
    pub fatal: bool,
}

/// Registry mapping tool names to implementations.
///
/// Populated at agent construction, then read-only for the agent's lifetime.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, for stable definition listings.
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails with [`ConvoyError::DuplicateToolName`] if a
    /// tool with the same name is already present.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ConvoyError::DuplicateToolName(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Resolve a tool by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ConvoyError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Tool definitions to advertise to the model.
    ///
    /// With an allowlist, only the named tools are included; an unknown name
    /// fails with [`ConvoyError::UnknownTool`]. Without one, every registered
    /// tool is included in registration order.
    pub fn definitions(&self, allowlist: Option<&[String]>) -> Result<Vec<ToolDefinition>> {
        let names: Vec<&String> = match allowlist {
            Some(names) => names.iter().collect(),
            None => self.order.iter().collect(),
        };
        names
            .into_iter()
            .map(|name| {
                let tool = self.resolve(name)?;
                Ok(ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters().schema.clone(),
                })
            })
            .collect()
    }

    /// Validate raw arguments against a tool's schema, returning the
    /// normalized arguments.
    ///
    /// Normalization unwraps the double-encoded JSON string form some models
    /// emit. Validation failures carry every offending field.
    pub fn validate(&self, tool: &dyn Tool, arguments: &serde_json::Value) -> Result<serde_json::Value> {
        let normalized = match arguments {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(trimmed).map_err(|e| ConvoyError::InvalidArguments {
                        tool: tool.name().to_string(),
                        violations: vec![format!("arguments are not valid JSON: {e}")],
                    })?
                }
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        };

        validate_arguments(&normalized, &tool.parameters().schema).map_err(|violations| {
            ConvoyError::InvalidArguments {
                tool: tool.name().to_string(),
                violations,
            }
        })?;
        Ok(normalized)
    }

    /// Invoke a tool with already-validated arguments and a timeout.
    pub async fn invoke(
        &self,
        tool: &dyn Tool,
        arguments: serde_json::Value,
        ctx: ToolContext,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let args = ToolArguments::new(arguments);
        match with_timeout(timeout, tool.execute(&args, &ctx)).await {
            Ok(value) => Ok(value),
            Err(ConvoyError::Timeout(ms)) => Err(ConvoyError::ToolTimeout {
                tool: tool.name().to_string(),
                timeout_ms: ms,
            }),
            Err(err @ ConvoyError::ToolExecution { .. }) => Err(err),
            Err(err) => Err(ConvoyError::tool_execution(tool.name(), err.to_string())),
        }
    }

    /// Dispatch one model-requested tool call end to end: resolve, validate,
    /// invoke. Recoverable failures become error payloads the loop records as
    /// `tool` messages; only a failing fatal tool sets `fatal`.
    pub async fn execute_call(&self, call: &ToolCall, timeout: Duration) -> CallOutcome {
        let tool = match self.resolve(&call.name) {
            Ok(tool) => tool,
            Err(err) => {
                tracing::debug!(tool = %call.name, "model requested unregistered tool");
                return CallOutcome {
                    call: call.clone(),
                    result: serde_json::json!({ "error": err.to_string() }),
                    is_error: true,
                    fatal: false,
                };
            }
        };

        let normalized = match self.validate(tool.as_ref(), &call.arguments) {
            Ok(normalized) => normalized,
            Err(err) => {
                return CallOutcome {
                    call: call.clone(),
                    result: serde_json::json!({ "error": err.to_string() }),
                    is_error: true,
                    fatal: false,
                };
            }
        };

        let ctx = ToolContext {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
            metadata: serde_json::Value::Null,
        };

        match self.invoke(tool.as_ref(), normalized, ctx, timeout).await {
            Ok(result) => CallOutcome {
                call: call.clone(),
                result,
                is_error: false,
                fatal: false,
            },
            Err(err) => {
                tracing::debug!(tool = %call.name, error = %err, "tool call failed");
                CallOutcome {
                    call: call.clone(),
                    result: serde_json::json!({ "error": err.to_string() }),
                    is_error: true,
                    fatal: tool.fatal(),
                }
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::FnTool;
    use crate::tools::types::ToolParameters;

    fn echo_tool() -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            "echo",
            "Echo the input back",
            ToolParameters::object().string("text", "Text to echo", true).build(),
            |args, _ctx| async move {
                Ok(serde_json::json!({ "echo": args.get_str("text")? }))
            },
        ))
    }

    fn registry_with_echo() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();
        registry
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = registry_with_echo();
        let err = registry.register(echo_tool()).unwrap_err();
        assert!(matches!(err, ConvoyError::DuplicateToolName(name) if name == "echo"));
    }

    #[test]
    fn resolve_unknown_tool_fails() {
        let registry = registry_with_echo();
        let err = registry.resolve("nope").unwrap_err();
        assert!(matches!(err, ConvoyError::UnknownTool(name) if name == "nope"));
    }

    #[test]
    fn definitions_follow_registration_order() {
        let mut registry = registry_with_echo();
        registry
            .register(Arc::new(FnTool::new(
                "add",
                "Add numbers",
                ToolParameters::empty(),
                |_args, _ctx| async move { Ok(serde_json::json!(0)) },
            )))
            .unwrap();

        let defs = registry.definitions(None).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[1].name, "add");

        let defs = registry.definitions(Some(&["add".to_string()])).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "add");
    }

    #[test]
    fn definitions_reject_unknown_allowlist_entry() {
        let registry = registry_with_echo();
        let err = registry
            .definitions(Some(&["missing".to_string()]))
            .unwrap_err();
        assert!(matches!(err, ConvoyError::UnknownTool(_)));
    }

    #[test]
    fn validate_normalizes_string_encoded_arguments() {
        let registry = registry_with_echo();
        let tool = registry.resolve("echo").unwrap();
        let normalized = registry
            .validate(tool.as_ref(), &serde_json::json!("{\"text\": \"hi\"}"))
            .unwrap();
        assert_eq!(normalized["text"], "hi");
    }

    #[test]
    fn validate_reports_all_violations() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FnTool::new(
                "copy",
                "Copy a file",
                ToolParameters::object()
                    .string("from", "Source", true)
                    .string("to", "Destination", true)
                    .build(),
                |_args, _ctx| async move { Ok(serde_json::Value::Null) },
            )))
            .unwrap();

        let tool = registry.resolve("copy").unwrap();
        let err = registry
            .validate(tool.as_ref(), &serde_json::json!({}))
            .unwrap_err();
        match err {
            ConvoyError::InvalidArguments { tool, violations } => {
                assert_eq!(tool, "copy");
                assert_eq!(violations.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn execute_call_happy_path() {
        let registry = registry_with_echo();
        let call = ToolCall::with_id("call_1", "echo", serde_json::json!({ "text": "hi" }));
        let outcome = registry.execute_call(&call, Duration::from_secs(1)).await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.result["echo"], "hi");
    }

    #[tokio::test]
    async fn execute_call_unknown_tool_is_recoverable() {
        let registry = registry_with_echo();
        let call = ToolCall::with_id("call_1", "nope", serde_json::json!({}));
        let outcome = registry.execute_call(&call, Duration::from_secs(1)).await;
        assert!(outcome.is_error);
        assert!(!outcome.fatal);
        assert!(outcome.result["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test(start_paused = true)]
    async fn execute_call_times_out() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FnTool::new(
                "slow",
                "Sleeps forever",
                ToolParameters::empty(),
                |_args, _ctx| async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(serde_json::Value::Null)
                },
            )))
            .unwrap();

        let call = ToolCall::with_id("call_1", "slow", serde_json::json!({}));
        let outcome = registry.execute_call(&call, Duration::from_millis(100)).await;
        assert!(outcome.is_error);
        assert!(!outcome.fatal);
        assert!(outcome.result["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn execute_call_fatal_tool_failure_sets_fatal() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(
                FnTool::new("launch", "Dangerous", ToolParameters::empty(), |_args, _ctx| {
                    async move { Err(ConvoyError::tool_execution("launch", "no fuel")) }
                })
                .with_fatal(true),
            ))
            .unwrap();

        let call = ToolCall::with_id("call_1", "launch", serde_json::json!({}));
        let outcome = registry.execute_call(&call, Duration::from_secs(1)).await;
        assert!(outcome.is_error);
        assert!(outcome.fatal);
    }

    #[tokio::test]
    async fn execute_call_fatal_tool_success_is_not_fatal() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(
                FnTool::new("launch", "Dangerous", ToolParameters::empty(), |_args, _ctx| {
                    async move { Ok(serde_json::json!("ok")) }
                })
                .with_fatal(true),
            ))
            .unwrap();

        let call = ToolCall::with_id("call_1", "launch", serde_json::json!({}));
        let outcome = registry.execute_call(&call, Duration::from_secs(1)).await;
        assert!(!outcome.is_error);
        assert!(!outcome.fatal);
    }
}

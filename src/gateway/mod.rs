//! Model gateway contract.
//!
//! The agent loop talks to a chat-completion backend through [`ModelGateway`].
//! Concrete adapters (HTTP clients for specific providers) live outside this
//! crate; they only need to map their wire formats onto [`Message`] and
//! [`StreamDelta`] and surface transport or auth failures as
//! [`ConvoyError::ModelUnavailable`] rather than as assistant content.

pub mod retry;

pub use retry::RetryPolicy;

use async_trait::async_trait;
use bon::Builder;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{FinishReason, Message, StreamDelta};

/// Tool schema advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the parameters.
    pub parameters: serde_json::Value,
}

/// Settings controlling a model query.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    pub seed: Option<u64>,
    /// Fail the query if the stream produces no delta for this long.
    pub stream_idle_timeout_ms: Option<u64>,
}

/// One request to the model: the working transcript plus the enabled tools.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
}

/// Stream of incremental deltas terminating in a `Done` delta.
pub type DeltaStream = BoxStream<'static, Result<StreamDelta>>;

/// Uniform chat-completion contract consumed by the agent loop.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Query the model and wait for the complete assistant message.
    async fn complete(&self, request: &GatewayRequest) -> Result<Message>;

    /// Query the model and stream incremental deltas.
    ///
    /// The default implementation adapts [`complete`](Self::complete) into a
    /// one-shot stream, so whole-response backends get streaming for free.
    async fn stream(&self, request: &GatewayRequest) -> Result<DeltaStream> {
        let message = self.complete(request).await?;
        Ok(Box::pin(async_stream::stream! {
            if !message.content.is_empty() {
                yield Ok(StreamDelta::text(message.content.clone()));
            }
            let finish = if message.has_tool_calls() {
                FinishReason::ToolCalls
            } else {
                FinishReason::Stop
            };
            for call in message.tool_calls {
                yield Ok(StreamDelta::tool_call(call));
            }
            yield Ok(StreamDelta::done(finish));
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StreamEventType, ToolCall};
    use futures::StreamExt;

    struct CannedGateway {
        reply: Message,
    }

    #[async_trait]
    impl ModelGateway for CannedGateway {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: &GatewayRequest) -> Result<Message> {
            Ok(self.reply.clone())
        }
    }

    fn request() -> GatewayRequest {
        GatewayRequest {
            messages: vec![Message::user("hi")],
            tools: Vec::new(),
            settings: GenerationSettings::default(),
        }
    }

    #[tokio::test]
    async fn default_stream_emits_text_then_done() {
        let gateway = CannedGateway {
            reply: Message::assistant("hello"),
        };
        let deltas: Vec<_> = gateway
            .stream(&request())
            .await
            .unwrap()
            .map(|d| d.unwrap())
            .collect()
            .await;

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].text, "hello");
        assert_eq!(deltas[1].event_type, StreamEventType::Done);
        assert_eq!(deltas[1].finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn default_stream_emits_tool_calls_in_order() {
        let gateway = CannedGateway {
            reply: Message::assistant_with_tool_calls(
                "",
                vec![
                    ToolCall::with_id("call_1", "a", serde_json::json!({})),
                    ToolCall::with_id("call_2", "b", serde_json::json!({})),
                ],
            ),
        };
        let deltas: Vec<_> = gateway
            .stream(&request())
            .await
            .unwrap()
            .map(|d| d.unwrap())
            .collect()
            .await;

        assert_eq!(deltas[0].tool_call.as_ref().unwrap().id, "call_1");
        assert_eq!(deltas[1].tool_call.as_ref().unwrap().id, "call_2");
        assert_eq!(deltas[2].finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn settings_builder() {
        let settings = GenerationSettings::builder()
            .temperature(0.2)
            .max_tokens(512)
            .build();
        assert_eq!(settings.temperature, Some(0.2));
        assert_eq!(settings.max_tokens, Some(512));
        assert_eq!(settings.seed, None);
    }
}

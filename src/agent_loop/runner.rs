//! The agent execution loop.
//!
//! [`LoopRunner`] drives one run on a spawned task: query the model, dispatch
//! any requested tool calls, append the results, repeat until the model
//! answers directly or a limit trips. The caller observes the run through a
//! [`RunHandle`], which exposes cancellation, the live event stream, and the
//! final [`RunOutcome`].

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::agent::config::{AgentConfig, TerminationPolicy};
use crate::error::{ConvoyError, Result};
use crate::gateway::{GatewayRequest, ModelGateway, ToolDefinition};
use crate::retrieval::{self, RetrievalPolicy, Retriever};
use crate::tools::ToolRegistry;
use crate::types::{Message, Role, StreamEventType, ToolCall, Transcript};

use super::events::{AgentEvent, AgentEventSink};
use super::types::{RunId, RunOutcome};

/// Idle-stream timeout applied when the settings leave it unset.
pub const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 120_000;

/// Everything needed to start one run.
pub struct RunRequest {
    pub run_id: RunId,
    pub transcript: Transcript,
    pub config: AgentConfig,
    /// Optional callback sink; events also flow through the handle's stream.
    pub event_sink: Option<AgentEventSink>,
}

impl RunRequest {
    pub fn new(transcript: Transcript, config: AgentConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            transcript,
            config,
            event_sink: None,
        }
    }

    pub fn with_event_sink(mut self, sink: AgentEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }
}

/// Handle to an in-flight run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    abort_tx: Option<oneshot::Sender<()>>,
    result_rx: oneshot::Receiver<RunOutcome>,
    events_rx: Option<mpsc::UnboundedReceiver<AgentEvent>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Request cancellation. The loop observes the request at its next
    /// suspension point; a tool batch already dispatched runs to completion
    /// (bounded by the per-tool timeout) before the run reports `Canceled`.
    pub fn abort(&mut self) {
        if let Some(tx) = self.abort_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Take the live event stream. Yields `None` after the run finishes.
    pub fn take_events(&mut self) -> Option<UnboundedReceiverStream<AgentEvent>> {
        self.events_rx.take().map(UnboundedReceiverStream::new)
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> Result<RunOutcome> {
        // Destructured so abort_tx stays alive while we wait; dropping it
        // early would read as an abort request on the loop task.
        let RunHandle {
            abort_tx,
            result_rx,
            ..
        } = self;
        let outcome = result_rx.await.map_err(|_| {
            ConvoyError::InvalidState("run task exited without reporting an outcome".into())
        })?;
        drop(abort_tx);
        Ok(outcome)
    }
}

/// Anything that can start runs. The loop is behind a trait so coordinators
/// and tests can substitute scripted runners.
pub trait Runner: Send + Sync {
    fn start(&self, request: RunRequest) -> Result<RunHandle>;
}

/// The standard model-and-tools loop.
pub struct LoopRunner {
    gateway: Arc<dyn ModelGateway>,
    registry: Arc<ToolRegistry>,
    retriever: Option<Arc<dyn Retriever>>,
}

impl LoopRunner {
    pub fn new(gateway: Arc<dyn ModelGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            gateway,
            registry,
            retriever: None,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }
}

impl Runner for LoopRunner {
    /// Validate the transcript and tool allowlist, then spawn the loop task.
    ///
    /// Configuration problems surface here, before any model traffic.
    fn start(&self, request: RunRequest) -> Result<RunHandle> {
        request.transcript.validate()?;
        let tools = self
            .registry
            .definitions(request.config.function_list.as_deref())?;

        let (abort_tx, abort_rx) = oneshot::channel();
        let (result_tx, result_rx) = oneshot::channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let run_id = request.run_id;
        let emitter = EventEmitter {
            sink: request.event_sink.clone(),
            tx: events_tx,
        };
        let task = RunTask {
            gateway: Arc::clone(&self.gateway),
            registry: Arc::clone(&self.registry),
            retriever: self.retriever.clone(),
            tools,
            config: request.config,
            emitter,
        };

        tokio::spawn(async move {
            let outcome = task.run(run_id, request.transcript, abort_rx).await;
            task.emitter.emit(AgentEvent::RunCompleted {
                run_id,
                status: outcome.status,
                error: outcome.error.as_ref().map(|e| e.to_string()),
            });
            let _ = result_tx.send(outcome);
        });

        Ok(RunHandle {
            run_id,
            abort_tx: Some(abort_tx),
            result_rx,
            events_rx: Some(events_rx),
        })
    }
}

/// Fan-out for run events: optional caller sink plus the handle's stream.
struct EventEmitter {
    sink: Option<AgentEventSink>,
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl EventEmitter {
    fn emit(&self, event: AgentEvent) {
        if let Some(sink) = &self.sink {
            sink(event.clone());
        }
        let _ = self.tx.send(event);
    }
}

/// State owned by the spawned loop task.
struct RunTask {
    gateway: Arc<dyn ModelGateway>,
    registry: Arc<ToolRegistry>,
    retriever: Option<Arc<dyn Retriever>>,
    tools: Vec<ToolDefinition>,
    config: AgentConfig,
    emitter: EventEmitter,
}

/// What one consumed model stream produced.
enum TurnOutput {
    Message { text: String, calls: Vec<ToolCall> },
    Aborted,
    Failed(ConvoyError),
}

impl RunTask {
    async fn run(
        &self,
        run_id: RunId,
        mut transcript: Transcript,
        mut abort_rx: oneshot::Receiver<()>,
    ) -> RunOutcome {
        self.emitter.emit(AgentEvent::RunStarted {
            run_id,
            agent: self.config.name.clone(),
        });
        tracing::info!(
            %run_id,
            agent = %self.config.name,
            gateway = %self.gateway.name(),
            "run started"
        );

        self.seed_system_prompt(&mut transcript);
        self.inject_context(&mut transcript).await;

        let mut response: Vec<Message> = Vec::new();
        let mut turns = 0usize;
        let mut aborted = false;

        loop {
            if abort_rx.try_recv().is_ok() || aborted {
                tracing::info!(%run_id, turns, "run canceled");
                return RunOutcome::canceled(run_id, transcript, response, turns);
            }

            if turns >= self.config.max_turns {
                return RunOutcome::failed(
                    run_id,
                    transcript,
                    response,
                    turns,
                    ConvoyError::TurnLimitExceeded {
                        limit: self.config.max_turns,
                    },
                );
            }

            let turn = turns + 1;
            turns = turn;
            self.emitter.emit(AgentEvent::TurnStarted { turn });

            let (text, calls) = match self.query_model(&transcript, &mut abort_rx).await {
                TurnOutput::Message { text, calls } => (text, calls),
                TurnOutput::Aborted => {
                    tracing::info!(%run_id, turn, "run canceled mid-stream");
                    return RunOutcome::canceled(run_id, transcript, response, turns);
                }
                TurnOutput::Failed(err) => {
                    tracing::warn!(%run_id, turn, error = %err, "model query failed");
                    return RunOutcome::failed(run_id, transcript, response, turns, err);
                }
            };

            let assistant = if calls.is_empty() {
                Message::assistant(&text)
            } else {
                Message::assistant_with_tool_calls(&text, calls.clone())
            }
            .with_name(&self.config.name);
            self.emitter.emit(AgentEvent::AssistantMessage {
                message: assistant.clone(),
            });
            transcript.push(assistant.clone());
            response.push(assistant);

            let phrase_hit = match &self.config.termination {
                TerminationPolicy::Phrase(phrase) => text.contains(phrase.as_str()),
                TerminationPolicy::DirectAnswer => false,
            };

            if calls.is_empty() {
                self.emitter.emit(AgentEvent::TurnCompleted {
                    turn,
                    transcript: transcript.clone(),
                });
                tracing::info!(%run_id, turns, "run completed");
                return RunOutcome::completed(run_id, transcript, response, turns);
            }

            // A batch already dispatched runs to completion even if an abort
            // arrives meanwhile; the per-tool timeout bounds the wait.
            aborted = abort_rx.try_recv().is_ok();
            let fatal = self
                .execute_tool_batch(&calls, &mut transcript, &mut response)
                .await;

            self.emitter.emit(AgentEvent::TurnCompleted {
                turn,
                transcript: transcript.clone(),
            });

            if let Some(err) = fatal {
                tracing::warn!(%run_id, turn, error = %err, "fatal tool failure");
                return RunOutcome::failed(run_id, transcript, response, turns, err);
            }

            if phrase_hit {
                tracing::info!(%run_id, turns, "termination phrase reached");
                return RunOutcome::completed(run_id, transcript, response, turns);
            }
        }
    }

    /// Prepend the configured system prompt unless the transcript already
    /// opens with one (a caller-supplied prompt wins).
    fn seed_system_prompt(&self, transcript: &mut Transcript) {
        let Some(prompt) = &self.config.system_prompt else {
            return;
        };
        if transcript.first().map(|m| m.role) == Some(Role::System) {
            return;
        }
        transcript.insert(0, Message::system(prompt.clone()));
    }

    /// Consult the retriever per policy and inject a knowledge block.
    ///
    /// Retrieval failures never fail the run; the loop proceeds without
    /// context and logs the error.
    async fn inject_context(&self, transcript: &mut Transcript) {
        if self.config.retrieval == RetrievalPolicy::Off {
            return;
        }
        let Some(retriever) = &self.retriever else {
            if self.config.retrieval == RetrievalPolicy::Forced {
                tracing::warn!("retrieval forced but no retriever configured");
            }
            return;
        };
        let Some(query) = transcript.last_user_text().map(str::to_string) else {
            return;
        };

        match retriever.search(&query, self.config.retrieval_top_k).await {
            Ok(snippets) => {
                if snippets.is_empty() && self.config.retrieval != RetrievalPolicy::Forced {
                    return;
                }
                self.emitter.emit(AgentEvent::ContextInjected {
                    snippets: snippets.len(),
                });
                retrieval::inject(transcript, &snippets);
            }
            Err(err) => {
                tracing::warn!(error = %err, "retrieval failed, continuing without context");
            }
        }
    }

    /// Stream one model turn, accumulating text and tool calls.
    async fn query_model(
        &self,
        transcript: &Transcript,
        abort_rx: &mut oneshot::Receiver<()>,
    ) -> TurnOutput {
        let request = GatewayRequest {
            messages: transcript.messages().to_vec(),
            tools: self.tools.clone(),
            settings: self.config.settings.clone(),
        };

        let idle_ms = self
            .config
            .settings
            .stream_idle_timeout_ms
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_MS);
        let idle_window = Duration::from_millis(idle_ms);

        // Establishing the stream is itself a suspension point: a gateway
        // without a streaming backend awaits the whole response here, so the
        // abort channel and the idle window must already apply.
        let mut stream = tokio::select! {
            _ = &mut *abort_rx => return TurnOutput::Aborted,
            _ = tokio::time::sleep(idle_window) => {
                return TurnOutput::Failed(ConvoyError::model_unavailable(format!(
                    "model produced no response within {idle_ms}ms"
                )));
            }
            result = self.gateway.stream(&request) => match result {
                Ok(stream) => stream,
                Err(err) => return TurnOutput::Failed(err),
            },
        };

        let idle = tokio::time::sleep(idle_window);
        tokio::pin!(idle);

        let mut text = String::new();
        let mut calls: Vec<ToolCall> = Vec::new();

        loop {
            let delta = tokio::select! {
                _ = &mut *abort_rx => return TurnOutput::Aborted,
                _ = &mut idle => {
                    return TurnOutput::Failed(ConvoyError::model_unavailable(format!(
                        "model stream produced no delta for {idle_ms}ms"
                    )));
                }
                delta = stream.next() => delta,
            };
            idle.as_mut()
                .reset(tokio::time::Instant::now() + idle_window);

            match delta {
                Some(Ok(delta)) => match delta.event_type {
                    StreamEventType::TextDelta => {
                        if !delta.text.is_empty() {
                            self.emitter.emit(AgentEvent::AssistantDelta {
                                text: delta.text.clone(),
                            });
                            text.push_str(&delta.text);
                        }
                    }
                    StreamEventType::ToolCallDelta => {
                        if let Some(call) = delta.tool_call {
                            // Later deltas replace earlier state for the same
                            // id; first-seen order is the request order.
                            match calls.iter_mut().find(|c| c.id == call.id) {
                                Some(existing) => *existing = call,
                                None => calls.push(call),
                            }
                        }
                    }
                    StreamEventType::Done => break,
                    StreamEventType::Error => {
                        return TurnOutput::Failed(ConvoyError::model_unavailable(
                            if delta.text.is_empty() {
                                "model stream reported an error".to_string()
                            } else {
                                delta.text
                            },
                        ));
                    }
                },
                Some(Err(err)) => return TurnOutput::Failed(err),
                // Tolerate streams that end without an explicit Done.
                None => break,
            }
        }

        TurnOutput::Message { text, calls }
    }

    /// Run a turn's tool calls concurrently and append their results in
    /// request order. Returns the error to abort with if a fatal tool failed.
    async fn execute_tool_batch(
        &self,
        calls: &[ToolCall],
        transcript: &mut Transcript,
        response: &mut Vec<Message>,
    ) -> Option<ConvoyError> {
        for call in calls {
            self.emitter
                .emit(AgentEvent::ToolCallStarted { call: call.clone() });
        }

        // join_all preserves input order regardless of completion order.
        let outcomes = futures::future::join_all(
            calls
                .iter()
                .map(|call| self.registry.execute_call(call, self.config.tool_timeout)),
        )
        .await;

        let mut fatal: Option<ConvoyError> = None;
        for outcome in outcomes {
            self.emitter.emit(AgentEvent::ToolResult {
                tool_call_id: outcome.call.id.clone(),
                result: outcome.result.clone(),
                is_error: outcome.is_error,
            });
            let message = Message::tool_result(&outcome.call.id, &outcome.result)
                .with_name(&outcome.call.name);
            transcript.push(message.clone());
            response.push(message);

            if outcome.fatal && fatal.is_none() {
                let detail = outcome.result["error"]
                    .as_str()
                    .unwrap_or("tool failed")
                    .to_string();
                fatal = Some(ConvoyError::ToolFatal {
                    tool: outcome.call.name.clone(),
                    message: detail,
                });
            }
        }
        fatal
    }
}

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use toolstream_tools::OperationRegistry;
use tracing::{debug, info, instrument, warn};

use crate::api::{CompletionRequest, CompletionSource, StreamError, Usage};
use crate::app::conversation::{ChatMessage, ConversationContext};
use crate::app::sink::{ConversationSink, TurnRecord};
use crate::app::tool_dispatch::ToolExecutionCoordinator;
use crate::app::turn::{Turn, TurnState, flush_on_exit};
use crate::config::ModelConfig;
use crate::error::{Error, Result};

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Completion requests issued, one per turn.
    pub turns: usize,
    pub tool_calls: usize,
    /// Usage of the final turn, when reported.
    pub usage: Option<Usage>,
}

/// Drives turns until the model answers without requesting tools.
pub struct ChatOrchestrator {
    source: Arc<dyn CompletionSource>,
    coordinator: ToolExecutionCoordinator,
    sink: Option<Arc<dyn ConversationSink>>,
}

impl ChatOrchestrator {
    pub fn new(source: Arc<dyn CompletionSource>, registry: Arc<OperationRegistry>) -> Self {
        Self {
            source,
            coordinator: ToolExecutionCoordinator::new(registry),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ConversationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Appends a user message and runs the conversation forward.
    pub async fn send(
        &self,
        context: &Arc<ConversationContext>,
        model: &ModelConfig,
        prompt: impl Into<String>,
        token: CancellationToken,
    ) -> Result<RunSummary> {
        context.history.add_message(ChatMessage::user(prompt));
        self.run(context, model, token).await
    }

    /// Streams completions against the current history, executing requested
    /// tool calls between turns.
    ///
    /// Whatever happens, partial output is committed to history before this
    /// returns. Stream and protocol errors are returned after that flush;
    /// cancellation returns [`Error::Cancelled`].
    #[instrument(skip_all, name = "ChatOrchestrator::run", fields(model = %model.id))]
    pub async fn run(
        &self,
        context: &Arc<ConversationContext>,
        model: &ModelConfig,
        token: CancellationToken,
    ) -> Result<RunSummary> {
        let result = self.run_turns(context, model, &token).await;
        flush_on_exit(context, result.is_err());

        match &result {
            Ok(summary) => {
                debug!(target: "orchestrator", turns = summary.turns, tool_calls = summary.tool_calls, "Run finished");
            }
            Err(e) if e.is_cancelled() => info!(target: "orchestrator", "Run cancelled"),
            Err(e) => warn!(target: "orchestrator", error = %e, "Run failed"),
        }
        result
    }

    async fn run_turns(
        &self,
        context: &Arc<ConversationContext>,
        model: &ModelConfig,
        token: &CancellationToken,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            turns: 0,
            tool_calls: 0,
            usage: None,
        };

        loop {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            summary.turns += 1;
            let mut turn = Turn::begin(Arc::clone(context), model);
            let request = self.build_request(context, model);
            debug!(
                target: "orchestrator",
                turn = summary.turns,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "Requesting completion"
            );

            let mut stream = tokio::select! {
                biased;
                () = token.cancelled() => return Err(Error::Cancelled),
                opened = self.source.stream_completion(request, token.clone()) => opened?,
            };

            loop {
                let next = tokio::select! {
                    biased;
                    () = token.cancelled() => return Err(Error::Cancelled),
                    next = stream.next() => next,
                };

                match next {
                    Some(Ok(chunk)) => turn.apply(chunk)?,
                    Some(Err(StreamError::Cancelled)) => return Err(Error::Cancelled),
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }

            let next_state = turn.drain();
            if turn.usage().is_some() {
                summary.usage = turn.usage();
            }

            if next_state == TurnState::ToolDispatch {
                let results = self.coordinator.execute_pending(context, token).await?;
                summary.tool_calls += results.len();
            }

            self.record_turn(context, model, turn.usage()).await;

            if next_state == TurnState::Done {
                return Ok(summary);
            }
            debug!(target: "orchestrator", "Continuing with tool results");
        }
    }

    /// Request for the next turn. Reasoning is stripped from past answers and
    /// the model's system prompt is prepended when history has none.
    pub fn build_request(&self, context: &ConversationContext, model: &ModelConfig) -> CompletionRequest {
        let history = context.history.snapshot();
        let mut messages = Vec::with_capacity(history.len() + 1);

        if let Some(prompt) = &model.system_prompt
            && !history.iter().any(ChatMessage::is_system)
        {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend(history.iter().map(ChatMessage::without_reasoning));

        CompletionRequest {
            model: model.id.clone(),
            messages,
            tools: self.coordinator.registry().tool_definitions(),
            include_usage: model.include_usage_in_stream,
        }
    }

    async fn record_turn(&self, context: &ConversationContext, model: &ModelConfig, usage: Option<Usage>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let record = TurnRecord {
            conversation_id: context.history.conversation_id(),
            model_id: model.id.clone(),
            messages: context.history.snapshot(),
            usage,
            tokens_remaining: usage.map(|u| model.tokens_remaining(&u)),
        };

        if let Err(e) = sink.record_turn(record).await {
            warn!(target: "orchestrator", error = %e, "Failed to record conversation turn");
        }
    }
}

impl std::fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("source", &self.source.name())
            .field("coordinator", &self.coordinator)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

use std::sync::Arc;

use tracing::{debug, trace};

use crate::api::{ChunkDelta, StreamChunk, Usage};
use crate::app::conversation::{ChatMessage, ConversationContext};
use crate::app::reasoning::split_reasoning;
use crate::config::{ModelConfig, ReasoningTags};
use crate::tool_stream::ToolStreamError;

pub const THINKING_STATUS: &str = "Thinking";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Streaming,
    Draining,
    ToolDispatch,
    Done,
}

/// One request/stream/commit cycle.
///
/// The turn routes chunks into the conversation's stores while streaming and
/// decides, once the stream is exhausted, whether tool calls must run before
/// the next turn.
#[derive(Debug)]
pub struct Turn {
    context: Arc<ConversationContext>,
    reasoning: Option<ReasoningTags>,
    content: String,
    usage: Option<Usage>,
    chunks: usize,
    state: TurnState,
}

impl Turn {
    /// Starts a turn and shows the thinking status until the first chunk.
    pub fn begin(context: Arc<ConversationContext>, model: &ModelConfig) -> Self {
        context.progress.set_text(THINKING_STATUS);
        Self {
            context,
            reasoning: model.reasoning.clone(),
            content: String::new(),
            usage: None,
            chunks: 0,
            state: TurnState::Streaming,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Usage reported by the stream, if any chunk carried it.
    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Routes one chunk. Tool-call protocol violations are returned as is.
    pub fn apply(&mut self, chunk: StreamChunk) -> Result<(), ToolStreamError> {
        self.chunks += 1;
        if !self.context.progress.is_empty() {
            self.context.progress.clear();
        }

        if let Some(usage) = chunk.usage {
            trace!(target: "orchestrator", total_tokens = usage.total_tokens, "Usage reported");
            self.usage = Some(usage);
        }

        match chunk.delta {
            ChunkDelta::Content(delta) => {
                if delta.is_empty() {
                    return Ok(());
                }
                self.content.push_str(&delta);
                self.publish_content();
            }
            ChunkDelta::ToolCalls(calls) => {
                for call in &calls {
                    self.context.tool_calls.set_tool_call(call)?;
                }
            }
            ChunkDelta::Empty => {}
        }
        Ok(())
    }

    fn publish_content(&self) {
        match &self.reasoning {
            Some(tags) => {
                let split = split_reasoning(&self.content, tags);
                self.context.reasoning.set_text(split.reasoning);
                self.context.message.set_text(split.message);
            }
            None => self.context.message.set_text(self.content.as_str()),
        }
    }

    /// Commits the streamed answer and picks the next state: `ToolDispatch`
    /// when tool calls are pending, otherwise `Done`.
    pub fn drain(&mut self) -> TurnState {
        self.state = TurnState::Draining;
        commit_message(&self.context);

        let pending = self.context.tool_calls.len();
        self.state = if pending > 0 {
            TurnState::ToolDispatch
        } else {
            TurnState::Done
        };
        debug!(target: "orchestrator", chunks = self.chunks, pending_tool_calls = pending, next = ?self.state, "Turn drained");
        self.state
    }
}

/// Moves non-empty message text into history, with the reasoning preamble
/// attached when there is one, and clears both buffers.
fn commit_message(context: &ConversationContext) -> bool {
    let message = context.message.snapshot();
    let reasoning = context.reasoning.snapshot();
    let committed = !message.is_empty();

    if committed {
        context
            .history
            .add_message(ChatMessage::assistant_with_reasoning(message, reasoning));
        context.message.clear();
    }
    context.reasoning.clear();
    committed
}

/// Exit step run on every way out of the turn loop.
///
/// Clears the status line and saves any partial answer so that cancelled or
/// failed turns never drop output. After a failure the half-assembled tool
/// calls are discarded as well.
pub fn flush_on_exit(context: &ConversationContext, failed: bool) {
    context.progress.clear();
    if commit_message(context) {
        debug!(target: "orchestrator", "Flushed partial message on exit");
    }
    if failed && !context.tool_calls.is_empty() {
        debug!(target: "orchestrator", pending = context.tool_calls.len(), "Discarding unexecuted tool calls");
        context.tool_calls.clear();
    }
}

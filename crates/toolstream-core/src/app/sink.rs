use std::sync::Arc;

use async_trait::async_trait;

use crate::api::Usage;
use crate::app::conversation::ChatMessage;
use crate::error::Result;

/// Snapshot handed off after each committed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRecord {
    pub conversation_id: String,
    pub model_id: String,
    pub messages: Arc<Vec<ChatMessage>>,
    /// Usage from the terminal chunk, when the stream reported it.
    pub usage: Option<Usage>,
    /// Context window left after this turn, derived from `usage`.
    pub tokens_remaining: Option<u64>,
}

/// Receives committed conversation state, e.g. to persist it.
///
/// Failures are logged by the orchestrator and never end a conversation.
#[async_trait]
pub trait ConversationSink: Send + Sync + 'static {
    async fn record_turn(&self, record: TurnRecord) -> Result<()>;
}

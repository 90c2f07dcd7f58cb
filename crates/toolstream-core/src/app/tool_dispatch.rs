use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use toolstream_tools::{OperationRegistry, OperationResult};
use tracing::{debug, error, info, instrument, warn};

use crate::app::conversation::{ChatMessage, ConversationContext};
use crate::error::{Error, Result};

/// Runs the tool calls assembled during a turn and records their outcomes.
#[derive(Clone)]
pub struct ToolExecutionCoordinator {
    registry: Arc<OperationRegistry>,
}

impl ToolExecutionCoordinator {
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Executes every pending call in snapshot order, one at a time.
    ///
    /// Each call appends an assistant message carrying its record and a tool
    /// message carrying the `{status, info}` envelope, and is then removed
    /// from the assembler. Operation failures become `failed` envelopes. The
    /// token is checked before each call; a running operation is never
    /// interrupted.
    #[instrument(skip_all, fields(pending = context.tool_calls.len()))]
    pub async fn execute_pending(
        &self,
        context: &ConversationContext,
        token: &CancellationToken,
    ) -> Result<Vec<OperationResult>> {
        let pending = context.tool_calls.snapshot();
        let mut results = Vec::with_capacity(pending.len());

        for entry in pending.iter() {
            if token.is_cancelled() {
                info!(target: "tool_dispatch", remaining = pending.len() - results.len(), "Tool dispatch cancelled");
                return Err(Error::Cancelled);
            }

            if entry.partial {
                warn!(
                    target: "tool_dispatch",
                    tool_id = %entry.id,
                    tool_name = %entry.function.name,
                    "Executing tool call with incomplete arguments"
                );
            }

            debug!(target: "tool_dispatch", tool_id = %entry.id, tool_name = %entry.function.name, "Executing tool call");
            let result: OperationResult = self
                .registry
                .execute_operation(&entry.function.name, entry.arguments_value())
                .await
                .into();

            if !result.is_ok() {
                error!(
                    target: "tool_dispatch",
                    tool_id = %entry.id,
                    tool_name = %entry.function.name,
                    info = %result.info,
                    "Tool call failed"
                );
            }

            context
                .history
                .add_message(ChatMessage::assistant_tool_call(entry.to_tool_call_record()));
            context
                .history
                .add_message(ChatMessage::tool(entry.id.clone(), result.to_content()));
            context.tool_calls.delete_tool_call_by_id(&entry.id);

            results.push(result);
        }

        Ok(results)
    }
}

impl std::fmt::Debug for ToolExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutionCoordinator")
            .field("operations", &self.registry.len())
            .finish()
    }
}

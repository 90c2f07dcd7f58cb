use serde::{Deserialize, Serialize};

use crate::store::{MessageHistory, TextStream};
use crate::tool_stream::ToolCallStreamStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON text of the arguments object.
    pub arguments: String,
}

/// A tool call as recorded on an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

/// A chat message in the chat-completions wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCallRecord>>,
        /// Reasoning preamble shown apart from the answer. Never sent back to the model.
        #[serde(
            default,
            rename = "reasoningContent",
            skip_serializing_if = "Option::is_none"
        )]
        reasoning_content: Option<String>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            content: Some(content.into()),
            tool_calls: None,
            reasoning_content: None,
        }
    }

    /// Assistant text with an optional reasoning preamble; empty reasoning is dropped.
    pub fn assistant_with_reasoning(content: impl Into<String>, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        ChatMessage::Assistant {
            content: Some(content.into()),
            tool_calls: None,
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
        }
    }

    /// Assistant message announcing a single tool call, with null content.
    pub fn assistant_tool_call(record: ToolCallRecord) -> Self {
        ChatMessage::Assistant {
            content: None,
            tool_calls: Some(vec![record]),
            reasoning_content: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            ChatMessage::System { .. } => "system",
            ChatMessage::User { .. } => "user",
            ChatMessage::Assistant { .. } => "assistant",
            ChatMessage::Tool { .. } => "tool",
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, ChatMessage::System { .. })
    }

    /// Text content, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            ChatMessage::System { content }
            | ChatMessage::User { content }
            | ChatMessage::Tool { content, .. } => Some(content),
            ChatMessage::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Copy suitable for a completion request.
    pub fn without_reasoning(&self) -> Self {
        match self {
            ChatMessage::Assistant {
                content,
                tool_calls,
                ..
            } => ChatMessage::Assistant {
                content: content.clone(),
                tool_calls: tool_calls.clone(),
                reasoning_content: None,
            },
            other => other.clone(),
        }
    }
}

/// Every store one conversation needs, owned together.
///
/// The orchestrator, the tool dispatcher and any front end share one context
/// through an `Arc`; nothing here is process-global.
#[derive(Debug, Default)]
pub struct ConversationContext {
    /// Visible assistant text of the turn in flight.
    pub message: TextStream,
    /// Reasoning preamble of the turn in flight.
    pub reasoning: TextStream,
    /// Short status line, e.g. "Thinking" while waiting for the first chunk.
    pub progress: TextStream,
    pub history: MessageHistory,
    pub tool_calls: ToolCallStreamStore,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a brand new conversation, discarding any in-flight state.
    pub fn reset(&self) {
        self.message.clear();
        self.reasoning.clear();
        self.progress.clear();
        self.tool_calls.clear();
        self.history.reset();
    }
}

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::api::error::{ApiError, StreamError};
use crate::app::conversation::ChatMessage;

/// Token accounting reported on the terminal chunk of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// One fragment of a streamed tool call.
///
/// `id` and `function.name` are only present on the first fragment for an
/// index; later fragments carry the next slice of the argument text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

impl ToolCallChunk {
    /// First fragment of a call.
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            function: Some(FunctionDelta {
                name: Some(name.into()),
                arguments: None,
            }),
        }
    }

    /// Continuation fragment carrying only argument text.
    pub fn arguments(index: u32, fragment: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            function: Some(FunctionDelta {
                name: None,
                arguments: Some(fragment.into()),
            }),
        }
    }

    pub fn with_arguments(mut self, fragment: impl Into<String>) -> Self {
        self.function.get_or_insert_with(FunctionDelta::default).arguments = Some(fragment.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.function.as_ref().and_then(|f| f.name.as_deref())
    }

    pub fn arguments_fragment(&self) -> Option<&str> {
        self.function.as_ref().and_then(|f| f.arguments.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkDelta {
    /// Plain content, possibly empty.
    Content(String),
    ToolCalls(Vec<ToolCallChunk>),
    /// Chunks that only carry metadata, such as the usage-only terminal chunk.
    Empty,
}

/// One event of a completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub delta: ChunkDelta,
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            delta: ChunkDelta::Content(text.into()),
            usage: None,
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallChunk>) -> Self {
        Self {
            delta: ChunkDelta::ToolCalls(calls),
            usage: None,
        }
    }

    pub fn tool_call(call: ToolCallChunk) -> Self {
        Self::tool_calls(vec![call])
    }

    pub fn usage(usage: Usage) -> Self {
        Self {
            delta: ChunkDelta::Empty,
            usage: Some(usage),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, StreamError>> + Send>>;

/// Everything needed to open one streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Function definitions in the chat-completions `tools` format.
    pub tools: Vec<Value>,
    /// Ask the server to append a usage-only chunk before the end of the stream.
    pub include_usage: bool,
}

/// Source of streamed chat completions.
#[async_trait]
pub trait CompletionSource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Opens a stream. The returned stream must end early with
    /// [`StreamError::Cancelled`] once `token` is cancelled.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        token: CancellationToken,
    ) -> Result<ChunkStream, ApiError>;
}

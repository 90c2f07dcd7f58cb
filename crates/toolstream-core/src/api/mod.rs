pub mod error;
pub mod openai;
pub mod provider;
pub mod sse;

pub use error::{ApiError, SseParseError, StreamError};
pub use openai::OpenAIChatSource;
pub use provider::{
    ChunkDelta, ChunkStream, CompletionRequest, CompletionSource, FunctionDelta, StreamChunk,
    ToolCallChunk, Usage,
};

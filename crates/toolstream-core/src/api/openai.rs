use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::api::error::{ApiError, StreamError};
use crate::api::provider::{
    ChunkDelta, ChunkStream, CompletionRequest, CompletionSource, StreamChunk, ToolCallChunk,
    Usage,
};
use crate::api::sse::{SseEvent, parse_sse_stream};
use crate::app::conversation::ChatMessage;

pub(crate) const PROVIDER_NAME: &str = "openai";
const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const HTTP_TIMEOUT_SECS: u64 = 300;

/// Streams completions from an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAIChatSource {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIChatSource {
    pub fn new(api_key: Option<String>) -> Result<Self, ApiError> {
        Self::with_base_url(api_key, None)
    }

    /// `base_url` may be a server root, a `/v1` prefix or the full endpoint.
    pub fn with_base_url(api_key: Option<String>, base_url: Option<String>) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| ApiError::Configuration(format!("Invalid API key format: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            base_url: normalize_chat_url(base_url.as_deref()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn convert_openai_stream(
        mut sse_stream: impl Stream<Item = Result<SseEvent, StreamError>> + Unpin + Send + 'static,
        token: CancellationToken,
    ) -> impl Stream<Item = Result<StreamChunk, StreamError>> + Send + 'static {
        async_stream::stream! {
            loop {
                let event_result = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        yield Err(StreamError::Cancelled);
                        break;
                    }
                    event = sse_stream.next() => event
                };

                let Some(event_result) = event_result else {
                    break;
                };

                let event = match event_result {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                if event.data == "[DONE]" {
                    trace!(target: "openai::chat::stream", "Stream complete");
                    break;
                }

                let chunk: OpenAIStreamChunk = match serde_json::from_str(&event.data) {
                    Ok(c) => c,
                    Err(e) => {
                        debug!(target: "openai::chat::stream", "Failed to parse chunk: {} data: {}", e, event.data);
                        yield Err(StreamError::Decode {
                            provider: PROVIDER_NAME.to_string(),
                            details: e.to_string(),
                        });
                        break;
                    }
                };

                for chunk in chunk.into_stream_chunks() {
                    yield Ok(chunk);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl CompletionSource for OpenAIChatSource {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        token: CancellationToken,
    ) -> Result<ChunkStream, ApiError> {
        let body = OpenAIRequest::from_completion(&request);

        let response = tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(ApiError::Cancelled { provider: PROVIDER_NAME.to_string() });
            }
            response = self.http_client.post(&self.base_url).json(&body).send() => response?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(
                target: "openai::chat::stream",
                "API error status={} body={}", status, body
            );
            return Err(ApiError::from_status(PROVIDER_NAME, status.as_u16(), body));
        }

        let sse_stream = parse_sse_stream(response.bytes_stream());
        Ok(Box::pin(Self::convert_openai_stream(sse_stream, token)))
    }
}

/// Normalize a chat completions URL.
fn normalize_chat_url(base_url: Option<&str>) -> String {
    let base_url = base_url.unwrap_or(DEFAULT_API_URL).trim_end_matches('/');

    if base_url.ends_with("/chat/completions") {
        return base_url.to_string();
    }

    if let Ok(mut parsed) = reqwest::Url::parse(base_url) {
        let path = parsed.path().trim_end_matches('/').to_string();
        if path.ends_with("/v1") {
            parsed.set_path(&format!("{path}/chat/completions"));
        } else {
            parsed.set_path(&format!("{path}/v1/chat/completions"));
        }
        parsed.to_string()
    } else {
        format!("{base_url}/v1/chat/completions")
    }
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

impl<'a> OpenAIRequest<'a> {
    fn from_completion(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            stream: true,
            stream_options: request.include_usage.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallChunk>>,
}

impl OpenAIStreamChunk {
    /// Splits one wire delta into stream chunks. A delta carrying both text
    /// and tool calls yields the content first. Usage rides on the last chunk.
    fn into_stream_chunks(self) -> Vec<StreamChunk> {
        let delta = self
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.delta)
            .unwrap_or_default();
        let calls = delta.tool_calls.filter(|calls| !calls.is_empty());

        let mut chunks = Vec::with_capacity(2);
        if let Some(content) = delta.content
            && (calls.is_none() || !content.is_empty())
        {
            chunks.push(StreamChunk::content(content));
        }
        if let Some(calls) = calls {
            chunks.push(StreamChunk::tool_calls(calls));
        }
        if chunks.is_empty() {
            chunks.push(StreamChunk {
                delta: ChunkDelta::Empty,
                usage: None,
            });
        }

        if let Some(usage) = self.usage
            && let Some(last) = chunks.last_mut()
        {
            last.usage = Some(usage);
        }
        chunks
    }
}

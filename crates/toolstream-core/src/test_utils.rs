//! Test utilities for toolstream-core
//!
//! This module provides helpers for testing that need to be accessible
//! across crate boundaries.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::api::{
    ApiError, ChunkStream, CompletionRequest, CompletionSource, StreamChunk, StreamError,
};
use crate::app::sink::{ConversationSink, TurnRecord};
use crate::error::{Error, Result};

/// Chunks replayed for one completion request.
#[derive(Debug, Clone, Default)]
pub struct Script {
    items: Vec<std::result::Result<StreamChunk, StreamError>>,
    hang: bool,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(mut self, chunk: StreamChunk) -> Self {
        self.items.push(Ok(chunk));
        self
    }

    pub fn content(self, text: &str) -> Self {
        self.chunk(StreamChunk::content(text))
    }

    pub fn error(mut self, error: StreamError) -> Self {
        self.items.push(Err(error));
        self
    }

    /// Keep the stream open after the scripted chunks until cancelled.
    pub fn then_hang(mut self) -> Self {
        self.hang = true;
        self
    }
}

/// Completion source that replays one [`Script`] per request and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedSource {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remaining_scripts(&self) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CompletionSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        token: CancellationToken,
    ) -> std::result::Result<ChunkStream, ApiError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| ApiError::InvalidRequest {
                provider: "scripted".to_string(),
                details: "no script left for this request".to_string(),
            })?;

        let stream = async_stream::stream! {
            for item in script.items {
                if token.is_cancelled() {
                    yield Err(StreamError::Cancelled);
                    return;
                }
                yield item;
                tokio::task::yield_now().await;
            }
            if script.hang {
                token.cancelled().await;
                yield Err(StreamError::Cancelled);
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Sink that keeps every record, optionally failing each call.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TurnRecord>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn records(&self) -> Vec<TurnRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ConversationSink for RecordingSink {
    async fn record_turn(&self, record: TurnRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        if self.fail {
            return Err(Error::Io(std::io::Error::other("sink unavailable")));
        }
        Ok(())
    }
}

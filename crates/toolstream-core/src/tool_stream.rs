//! Assembly of concurrently streamed tool calls.
//!
//! Each tool call in a turn is identified by its stream `index`. Fragments of
//! different calls may interleave freely; every index owns its own
//! [`JsonObjectDecoder`], so members decoded for one call never leak into
//! another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace};

use crate::api::ToolCallChunk;
use crate::app::conversation::{FunctionCall, ToolCallRecord};
use crate::json_stream::{DecodeError, JsonEvent, JsonObjectDecoder};
use crate::store::{Listeners, Subscription};

/// Protocol violations in the tool-call part of a stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolStreamError {
    #[error("first chunk for tool call index {index} carries no id")]
    MissingId { index: u32 },

    #[error("first chunk for tool call index {index} carries no function name")]
    MissingName { index: u32 },

    #[error("malformed arguments for tool call index {index}: {source}")]
    Decode {
        index: u32,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamedFunction {
    pub name: String,
    /// Top-level argument members decoded so far, in streamed order.
    pub arguments: Map<String, Value>,
}

/// Materialized view of one streaming tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallStream {
    pub index: u32,
    pub id: String,
    pub function: StreamedFunction,
    /// Set until the closing brace of the arguments has been decoded.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl ToolCallStream {
    /// Projects the entry onto the history's tool-call record, serializing
    /// whatever arguments have been decoded.
    pub fn to_tool_call_record(&self) -> ToolCallRecord {
        ToolCallRecord {
            id: self.id.clone(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: self.function.name.clone(),
                arguments: Value::Object(self.function.arguments.clone()).to_string(),
            },
        }
    }

    pub fn arguments_value(&self) -> Value {
        Value::Object(self.function.arguments.clone())
    }
}

impl From<&ToolCallStream> for ToolCallRecord {
    fn from(entry: &ToolCallStream) -> Self {
        entry.to_tool_call_record()
    }
}

#[derive(Default)]
struct Assembly {
    // Creation order, which need not match index order.
    calls: Arc<Vec<ToolCallStream>>,
    decoders: HashMap<u32, JsonObjectDecoder>,
}

impl Assembly {
    fn contains(&self, index: u32) -> bool {
        self.calls.iter().any(|call| call.index == index)
    }

    fn start(&mut self, chunk: &ToolCallChunk) -> Result<(), ToolStreamError> {
        let index = chunk.index;
        let id = chunk
            .id
            .clone()
            .ok_or(ToolStreamError::MissingId { index })?;
        let name = chunk
            .name()
            .ok_or(ToolStreamError::MissingName { index })?
            .to_string();

        debug!(target: "tool_stream", index, tool_id = %id, tool_name = %name, "Tool call started");

        let mut calls = Vec::with_capacity(self.calls.len() + 1);
        calls.extend(self.calls.iter().cloned());
        calls.push(ToolCallStream {
            index,
            id,
            function: StreamedFunction {
                name,
                arguments: Map::new(),
            },
            partial: true,
        });
        self.calls = Arc::new(calls);
        self.decoders.insert(index, JsonObjectDecoder::new());
        Ok(())
    }

    /// Runs `fragment` through the decoder for `index`, tearing the decoder
    /// down once it finishes or fails.
    fn feed(&mut self, index: u32, fragment: &str) -> (Vec<JsonEvent>, Result<(), ToolStreamError>) {
        let mut events = Vec::new();
        if fragment.is_empty() {
            return (events, Ok(()));
        }

        let Some(decoder) = self.decoders.get_mut(&index) else {
            trace!(target: "tool_stream", index, fragment, "Discarding fragment for closed tool call");
            return (events, Ok(()));
        };

        let outcome = decoder.write(fragment, &mut events);
        if decoder.is_done() || outcome.is_err() {
            self.decoders.remove(&index);
        }

        (
            events,
            outcome.map_err(|source| ToolStreamError::Decode { index, source }),
        )
    }

    /// Applies one decoder event. Returns false if the entry is gone.
    fn apply(&mut self, index: u32, event: JsonEvent) -> bool {
        let Some(position) = self.calls.iter().position(|call| call.index == index) else {
            return false;
        };

        let mut calls = (*self.calls).clone();
        let entry = &mut calls[position];
        match event {
            JsonEvent::Value { key, value } => {
                entry.function.arguments.insert(key, value);
            }
            JsonEvent::End => {
                entry.partial = false;
                debug!(target: "tool_stream", index, tool_id = %entry.id, "Tool call arguments complete");
            }
        }
        self.calls = Arc::new(calls);
        true
    }
}

/// Observable set of the tool calls streamed in the current turn.
#[derive(Default)]
pub struct ToolCallStreamStore {
    assembly: Mutex<Assembly>,
    listeners: Listeners,
}

impl ToolCallStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Assembly> {
        self.assembly.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Routes one tool-call fragment.
    ///
    /// A fragment for a new index opens an entry and must carry the call id
    /// and function name. Creating the entry does not notify; every decoded
    /// member and the end of the arguments each notify once. Members decoded
    /// before a malformed character are kept, and the error is returned after
    /// they are applied.
    pub fn set_tool_call(&self, chunk: &ToolCallChunk) -> Result<(), ToolStreamError> {
        let index = chunk.index;
        let (events, outcome) = {
            let mut assembly = self.lock();
            if !assembly.contains(index) {
                assembly.start(chunk)?;
            }
            assembly.feed(index, chunk.arguments_fragment().unwrap_or_default())
        };

        for event in events {
            let applied = self.lock().apply(index, event);
            if applied {
                self.listeners.emit();
            }
        }

        outcome
    }

    /// Removes the entry with `id` and stops its decoder. Returns whether an
    /// entry was found; only a removal notifies.
    pub fn delete_tool_call_by_id(&self, id: &str) -> bool {
        let found = {
            let mut assembly = self.lock();
            match assembly.calls.iter().position(|call| call.id == id) {
                Some(position) => {
                    let mut calls = (*assembly.calls).clone();
                    let removed = calls.remove(position);
                    assembly.decoders.remove(&removed.index);
                    assembly.calls = Arc::new(calls);
                    true
                }
                None => false,
            }
        };

        if found {
            self.listeners.emit();
        }
        found
    }

    /// Drops every entry and decoder.
    pub fn clear(&self) {
        {
            let mut assembly = self.lock();
            if !assembly.decoders.is_empty() {
                debug!(target: "tool_stream", pending = assembly.decoders.len(), "Clearing unfinished tool calls");
            }
            assembly.decoders.clear();
            assembly.calls = Arc::new(Vec::new());
        }
        self.listeners.emit();
    }

    /// Entries in creation order.
    pub fn snapshot(&self) -> Arc<Vec<ToolCallStream>> {
        Arc::clone(&self.lock().calls)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }
}

impl std::fmt::Debug for ToolCallStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let assembly = self.lock();
        f.debug_struct("ToolCallStreamStore")
            .field("calls", &assembly.calls)
            .field("active_decoders", &assembly.decoders.len())
            .finish()
    }
}

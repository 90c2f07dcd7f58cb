use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use super::listeners::{Listeners, Subscription};
use crate::app::conversation::ChatMessage;

/// Ordered, append-only log of a conversation's messages.
///
/// Snapshots are shared `Arc<Vec<_>>` values. Every mutation installs a new
/// vector, so `Arc::ptr_eq` on two snapshots tells whether anything changed.
#[derive(Default)]
pub struct MessageHistory {
    messages: Mutex<Arc<Vec<ChatMessage>>>,
    conversation_id: Mutex<Option<String>>,
    listeners: Listeners,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&self, message: ChatMessage) {
        {
            let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
            let mut next = Vec::with_capacity(messages.len() + 1);
            next.extend(messages.iter().cloned());
            next.push(message);
            *messages = Arc::new(next);
        }
        self.listeners.emit();
    }

    /// Replaces the whole log. Passing the current snapshot back is a no-op.
    pub fn set_messages(&self, messages: Arc<Vec<ChatMessage>>) {
        {
            let mut current = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
            if Arc::ptr_eq(&current, &messages) {
                return;
            }
            *current = messages;
        }
        self.listeners.emit();
    }

    /// Replaces the log with a saved conversation and always notifies.
    pub fn load_conversation(&self, messages: Vec<ChatMessage>) {
        *self.messages.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(messages);
        self.listeners.emit();
    }

    pub fn snapshot(&self) -> Arc<Vec<ChatMessage>> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the log holds anything besides system messages.
    pub fn has_user_messages(&self) -> bool {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|message| !message.is_system())
    }

    /// Stable identifier for this conversation, generated on first use.
    pub fn conversation_id(&self) -> String {
        self.conversation_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone()
    }

    /// Clears the messages and forgets the conversation id.
    pub fn reset(&self) {
        *self.conversation_id.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.messages.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(Vec::new());
        self.listeners.emit();
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }
}

impl std::fmt::Debug for MessageHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHistory")
            .field("messages", &self.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

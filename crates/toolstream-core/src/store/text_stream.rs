use std::sync::{Mutex, PoisonError};

use super::listeners::{Listeners, Subscription};

/// A single observable string.
///
/// Used for the streamed assistant message, the reasoning preamble and the
/// progress status line.
#[derive(Default)]
pub struct TextStream {
    text: Mutex<String>,
    listeners: Listeners,
}

impl TextStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the content. Setting the current value again does not notify.
    pub fn set_text(&self, value: impl Into<String>) {
        let value = value.into();
        {
            let mut text = self.text.lock().unwrap_or_else(PoisonError::into_inner);
            if *text == value {
                return;
            }
            *text = value;
        }
        self.listeners.emit();
    }

    pub fn append_text(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(chunk);
        self.listeners.emit();
    }

    pub fn clear(&self) {
        self.set_text(String::new());
    }

    pub fn snapshot(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }
}

impl std::fmt::Debug for TextStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStream")
            .field("text", &self.snapshot())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// Streaming chat-completion engine without UI dependencies

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod json_stream;
pub mod store;
pub mod test_utils;
pub mod tool_stream;

pub use error::{Error, Result};

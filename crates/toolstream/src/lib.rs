pub mod cli;
pub mod commands;
pub mod logging;
pub mod operations;
pub mod transcript;

pub use toolstream_core::{api, app, config, store, tool_stream};

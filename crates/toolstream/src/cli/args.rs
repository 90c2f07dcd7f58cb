use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Streaming chat client that lets the model call local operations.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Model id or alias (e.g., 'gpt-4o', 'r1', 'qwq')
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Additional catalog files to load (repeatable)
    #[arg(long = "catalog", value_name = "PATH", global = true)]
    pub catalogs: Vec<PathBuf>,

    /// Chat-completions server root, `/v1` prefix or full endpoint
    #[arg(long, env = "TOOLSTREAM_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Bearer token sent to the completion endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Log at debug level when RUST_LOG is unset
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Send one prompt and stream the answer, running requested operations
    Chat {
        /// Prompt text. Read from stdin when omitted.
        prompt: Option<String>,

        /// System prompt used when the model config has none
        #[arg(long)]
        system_prompt: Option<String>,

        /// Print the final conversation as JSON instead of streaming text
        #[arg(long)]
        json: bool,

        /// Append a JSON line per committed turn to this file
        #[arg(long, value_name = "PATH")]
        transcript: Option<PathBuf>,
    },
    /// List the models known to the merged catalogs
    Models,
}

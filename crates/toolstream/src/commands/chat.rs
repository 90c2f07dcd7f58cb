use async_trait::async_trait;
use eyre::{Result, eyre};
use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio_util::sync::CancellationToken;
use toolstream_core::api::OpenAIChatSource;
use toolstream_core::app::{ChatOrchestrator, ConversationContext};
use toolstream_core::store::{Subscription, TextStream};
use tracing::{debug, info};

use super::{Command, load_model_registry};
use crate::operations::default_registry;
use crate::transcript::TranscriptSink;

pub struct ChatCommand {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub catalogs: Vec<PathBuf>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub json: bool,
    pub transcript: Option<PathBuf>,
}

#[async_trait]
impl Command for ChatCommand {
    async fn execute(&self) -> Result<()> {
        let prompt = match &self.prompt {
            Some(prompt) => prompt.clone(),
            None => read_stdin_prompt()?,
        };

        let registry = load_model_registry(&self.catalogs)?;
        let mut model = match &self.model {
            Some(name) => registry
                .resolve(name)
                .map_err(|e| eyre!("Invalid model '{}': {}", name, e))?
                .clone(),
            None => registry
                .default_model()
                .ok_or_else(|| eyre!("No models configured"))?
                .clone(),
        };
        if model.system_prompt.is_none()
            && let Some(system_prompt) = &self.system_prompt
        {
            model = model.with_system_prompt(system_prompt.clone());
        }

        let source = OpenAIChatSource::with_base_url(self.api_key.clone(), self.base_url.clone())
            .map_err(|e| eyre!("Failed to create completion client: {}", e))?;
        debug!(endpoint = source.endpoint(), model = %model.id, "Starting chat");

        let mut orchestrator = ChatOrchestrator::new(Arc::new(source), default_registry());
        if let Some(path) = &self.transcript {
            orchestrator = orchestrator.with_sink(Arc::new(TranscriptSink::new(path)));
        }

        let context = Arc::new(ConversationContext::new());
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling");
                cancel.cancel();
            }
        });

        let subscriptions = if self.json {
            Vec::new()
        } else {
            follow_conversation(&context)
        };

        let result = orchestrator.send(&context, &model, prompt, token).await;
        drop(subscriptions);

        if self.json {
            let history = context.history.snapshot();
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, history.as_slice())?;
            writeln!(stdout)?;
        }

        match result {
            Ok(summary) => {
                debug!(turns = summary.turns, tool_calls = summary.tool_calls, "Chat finished");
                Ok(())
            }
            Err(e) if e.is_cancelled() => Err(eyre!("Cancelled")),
            Err(e) => Err(eyre!("Chat failed: {}", e)),
        }
    }
}

fn read_stdin_prompt() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| eyre!("Failed to read from stdin: {}", e))?;
    if buffer.trim().is_empty() {
        return Err(eyre!("No input provided via stdin"));
    }
    Ok(buffer)
}

/// Streams the answer to stdout and reasoning, status and tool calls to stderr.
fn follow_conversation(context: &Arc<ConversationContext>) -> Vec<Subscription> {
    vec![
        follow_text(context, |c| &c.message, Target::Stdout),
        follow_text(context, |c| &c.reasoning, Target::Stderr),
        follow_status(context),
        follow_tool_calls(context),
    ]
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Stdout,
    Stderr,
}

impl Target {
    fn write(self, text: &str) {
        let result = match self {
            Target::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes()).and_then(|()| out.flush())
            }
            Target::Stderr => {
                let mut out = io::stderr().lock();
                out.write_all(text.as_bytes()).and_then(|()| out.flush())
            }
        };
        if let Err(e) = result {
            debug!(error = %e, "Failed to write conversation output");
        }
    }
}

/// What to print when a buffer moves from `previous` to `current`.
#[derive(Debug, PartialEq, Eq)]
enum Delta<'a> {
    Unchanged,
    Append(&'a str),
    /// The buffer was replaced by unrelated text.
    Restart(&'a str),
    /// The buffer was committed and cleared.
    End,
}

fn delta<'a>(previous: &str, current: &'a str) -> Delta<'a> {
    if current == previous {
        Delta::Unchanged
    } else if current.is_empty() {
        Delta::End
    } else if let Some(suffix) = current.strip_prefix(previous) {
        Delta::Append(suffix)
    } else {
        Delta::Restart(current)
    }
}

fn follow_text(
    context: &Arc<ConversationContext>,
    pick: fn(&ConversationContext) -> &TextStream,
    target: Target,
) -> Subscription {
    let weak: Weak<ConversationContext> = Arc::downgrade(context);
    let printed = Mutex::new(String::new());

    pick(context).subscribe(move || {
        let Some(context) = weak.upgrade() else {
            return;
        };
        let current = pick(&context).snapshot();
        let mut printed = printed.lock().unwrap_or_else(PoisonError::into_inner);
        match delta(&printed, &current) {
            Delta::Unchanged => {}
            Delta::Append(text) => target.write(text),
            Delta::Restart(text) => target.write(&format!("\n{text}")),
            Delta::End => target.write("\n"),
        }
        *printed = current;
    })
}

fn follow_status(context: &Arc<ConversationContext>) -> Subscription {
    let weak = Arc::downgrade(context);
    context.progress.subscribe(move || {
        if let Some(context) = weak.upgrade() {
            let status = context.progress.snapshot();
            if !status.is_empty() {
                Target::Stderr.write(&format!("[{status}]\n"));
            }
        }
    })
}

/// Announces each tool call once its arguments are complete.
fn follow_tool_calls(context: &Arc<ConversationContext>) -> Subscription {
    let weak = Arc::downgrade(context);
    let announced = Mutex::new(HashSet::new());

    context.tool_calls.subscribe(move || {
        let Some(context) = weak.upgrade() else {
            return;
        };
        let mut announced = announced.lock().unwrap_or_else(PoisonError::into_inner);
        for entry in context.tool_calls.snapshot().iter() {
            if !entry.partial && announced.insert(entry.id.clone()) {
                Target::Stderr.write(&format!(
                    "-> {}({})\n",
                    entry.function.name,
                    entry.arguments_value()
                ));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_classifies_buffer_changes() {
        assert_eq!(delta("", ""), Delta::Unchanged);
        assert_eq!(delta("", "Hel"), Delta::Append("Hel"));
        assert_eq!(delta("Hel", "Hello"), Delta::Append("lo"));
        assert_eq!(delta("Hello", ""), Delta::End);
        assert_eq!(delta("Hello", "Bye"), Delta::Restart("Bye"));
    }
}

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use toolstream_core::app::{ConversationSink, TurnRecord};
use toolstream_core::{Error, Result};
use tracing::debug;

/// Appends one JSON line per committed turn.
#[derive(Debug, Clone)]
pub struct TranscriptSink {
    path: PathBuf,
}

impl TranscriptSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConversationSink for TranscriptSink {
    async fn record_turn(&self, record: TurnRecord) -> Result<()> {
        let line = json!({
            "conversation_id": record.conversation_id,
            "model": record.model_id,
            "messages": record.messages.as_slice(),
            "usage": record.usage,
            "tokens_remaining": record.tokens_remaining,
        });
        let mut line = serde_json::to_string(&line).map_err(|e| Error::Io(io::Error::other(e)))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(target: "transcript", path = %self.path.display(), messages = record.messages.len(), "Recorded turn");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;
    use toolstream_core::api::Usage;
    use toolstream_core::app::ChatMessage;

    #[tokio::test]
    async fn test_appends_one_line_per_turn() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("transcript.jsonl");
        let sink = TranscriptSink::new(&path);

        for n in 1..=2 {
            sink.record_turn(TurnRecord {
                conversation_id: "conv".to_string(),
                model_id: "gpt-4o".to_string(),
                messages: Arc::new(vec![ChatMessage::user("hi"); n]),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                tokens_remaining: Some(100),
            })
            .await
            .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["messages"].as_array().map(Vec::len), Some(2));
        assert_eq!(lines[1]["messages"][0]["role"], "user");
        assert_eq!(lines[0]["usage"]["total_tokens"], 15);
        assert_eq!(lines[0]["tokens_remaining"], 100);
    }

    #[tokio::test]
    async fn test_unwritable_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let sink = TranscriptSink::new(tmp.path().join("missing").join("t.jsonl"));
        let result = sink
            .record_turn(TurnRecord {
                conversation_id: "conv".to_string(),
                model_id: "gpt-4o".to_string(),
                messages: Arc::new(Vec::new()),
                usage: None,
                tokens_remaining: None,
            })
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}

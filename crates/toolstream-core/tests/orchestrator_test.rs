#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rstest::rstest;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;
    use toolstream_core::api::{StreamChunk, StreamError, ToolCallChunk, Usage};
    use toolstream_core::app::{ChatMessage, ChatOrchestrator, ConversationContext, THINKING_STATUS};
    use toolstream_core::config::{ModelConfig, ReasoningTags};
    use toolstream_core::test_utils::{RecordingSink, Script, ScriptedSource};
    use toolstream_core::tool_stream::{ToolCallStream, ToolStreamError};
    use toolstream_core::Error;
    use toolstream_tools::{Operation, OperationError, OperationKind, OperationRegistry};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
            )
            .with_test_writer()
            .try_init();
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct SendKavaParams {
        /// Amount in KAVA.
        amount: String,
    }

    struct SendKava;

    #[async_trait]
    impl Operation for SendKava {
        type Params = SendKavaParams;

        const NAME: &'static str = "sendKava";
        const DESCRIPTION: &'static str = "Build an unsigned KAVA transfer";
        const KIND: OperationKind = OperationKind::Transaction;

        fn validate(&self, params: &Self::Params) -> bool {
            params.amount.parse::<f64>().is_ok_and(|v| v > 0.0)
        }

        async fn execute(&self, params: Self::Params) -> Result<String, OperationError> {
            Ok(format!("unsigned transfer of {} KAVA", params.amount))
        }
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct BalanceParams {
        address: String,
    }

    struct Balance;

    #[async_trait]
    impl Operation for Balance {
        type Params = BalanceParams;

        const NAME: &'static str = "balance";
        const DESCRIPTION: &'static str = "Look up a KAVA balance";
        const KIND: OperationKind = OperationKind::Query;

        async fn execute(&self, params: Self::Params) -> Result<String, OperationError> {
            if params.address.starts_with("kava1") {
                Ok("10 KAVA".to_string())
            } else {
                Err(OperationError::execution(Self::NAME, "node unreachable"))
            }
        }
    }

    fn registry() -> Arc<OperationRegistry> {
        let mut registry = OperationRegistry::new();
        registry.register(SendKava);
        registry.register(Balance);
        Arc::new(registry)
    }

    fn gpt() -> ModelConfig {
        ModelConfig::new("gpt-4o")
    }

    fn orchestrator(source: &Arc<ScriptedSource>) -> ChatOrchestrator {
        ChatOrchestrator::new(source.clone(), registry())
    }

    /// Records the buffer after every notification.
    fn record_text(
        store: &toolstream_core::store::TextStream,
        context: &Arc<ConversationContext>,
        pick: fn(&ConversationContext) -> &toolstream_core::store::TextStream,
    ) -> (Arc<Mutex<Vec<String>>>, toolstream_core::store::Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let seen = seen.clone();
            let context = context.clone();
            store.subscribe(move || seen.lock().unwrap().push(pick(&context).snapshot()))
        };
        (seen, sub)
    }

    fn envelope(message: &ChatMessage) -> Value {
        serde_json::from_str(message.content().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_content_only_turn() {
        init_tracing();
        let source = ScriptedSource::new([Script::new().content("Hel").content("lo")]);
        let context = Arc::new(ConversationContext::new());
        let (messages, _sub) = record_text(&context.message, &context, |c| &c.message);
        let (progress, _progress_sub) = record_text(&context.progress, &context, |c| &c.progress);

        let summary = orchestrator(&source)
            .send(&context, &gpt(), "hi", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.turns, 1);
        assert_eq!(summary.tool_calls, 0);
        assert_eq!(*messages.lock().unwrap(), vec!["Hel", "Hello", ""]);
        assert_eq!(*progress.lock().unwrap(), vec![THINKING_STATUS, ""]);
        assert!(context.message.is_empty());
        assert_eq!(
            context.history.snapshot().as_slice(),
            &[ChatMessage::user("hi"), ChatMessage::assistant("Hello")]
        );

        let requests = source.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o");
        assert_eq!(requests[0].tools.len(), 2);
        assert_eq!(requests[0].tools[0]["function"]["name"], "sendKava");
    }

    #[tokio::test]
    async fn test_tool_call_turn_dispatches_and_continues() {
        init_tracing();
        let source = ScriptedSource::new([
            Script::new()
                .chunk(StreamChunk::tool_call(
                    ToolCallChunk::start(0, "tc1", "sendKava").with_arguments("{\"amount\""),
                ))
                .chunk(StreamChunk::tool_call(ToolCallChunk::arguments(0, ":\"5\"}"))),
            Script::new().content("Transfer ready."),
        ]);
        let context = Arc::new(ConversationContext::new());

        let snapshots: Arc<Mutex<Vec<Arc<Vec<ToolCallStream>>>>> = Arc::default();
        let _sub = {
            let snapshots = snapshots.clone();
            let observed = context.clone();
            context
                .tool_calls
                .subscribe(move || snapshots.lock().unwrap().push(observed.tool_calls.snapshot()))
        };

        let summary = orchestrator(&source)
            .send(&context, &gpt(), "send 5 kava", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.turns, 2);
        assert_eq!(summary.tool_calls, 1);

        // Member, end, then removal after dispatch.
        let snapshots = snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 3);
        let completed = &snapshots[1][0];
        assert_eq!(completed.id, "tc1");
        assert_eq!(completed.arguments_value(), json!({ "amount": "5" }));
        assert!(!completed.partial);
        assert!(snapshots[2].is_empty());

        let history = context.history.snapshot();
        assert_eq!(history.len(), 4);
        match &history[1] {
            ChatMessage::Assistant {
                content: None,
                tool_calls: Some(calls),
                ..
            } => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "tc1");
                assert_eq!(calls[0].function.name, "sendKava");
            }
            other => unreachable!("expected tool call record, got {other:?}"),
        }
        assert!(matches!(&history[2], ChatMessage::Tool { tool_call_id, .. } if tool_call_id == "tc1"));
        assert_eq!(
            envelope(&history[2]),
            json!({ "status": "ok", "info": "unsigned transfer of 5 KAVA" })
        );
        assert_eq!(history[3], ChatMessage::assistant("Transfer ready."));

        let requests = source.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[2].role(), "tool");
    }

    #[rstest]
    #[case::unknown_operation("mint", r#"{"amount":"1"}"#, "failed", "Unknown operation type: mint")]
    #[case::validation_failure("sendKava", r#"{"amount":"-3"}"#, "failed", "Invalid parameters for operation sendKava")]
    #[case::execution_failure("balance", r#"{"address":"cosmos1"}"#, "failed", "balance failed: node unreachable")]
    #[case::query("balance", r#"{"address":"kava1abc"}"#, "ok", "10 KAVA")]
    #[tokio::test]
    async fn test_tool_outcome_envelopes(
        #[case] name: &str,
        #[case] arguments: &str,
        #[case] status: &str,
        #[case] info: &str,
    ) {
        let source = ScriptedSource::new([
            Script::new().chunk(StreamChunk::tool_call(
                ToolCallChunk::start(0, "call", name).with_arguments(arguments),
            )),
            Script::new().content("ok"),
        ]);
        let context = Arc::new(ConversationContext::new());

        orchestrator(&source)
            .run(&context, &gpt(), CancellationToken::new())
            .await
            .unwrap();

        let history = context.history.snapshot();
        assert_eq!(envelope(&history[1]), json!({ "status": status, "info": info }));
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_interleaved_tool_calls_run_in_creation_order() {
        let source = ScriptedSource::new([
            Script::new()
                .chunk(StreamChunk::tool_calls(vec![
                    ToolCallChunk::start(1, "b", "balance").with_arguments("{\"address\":"),
                    ToolCallChunk::start(0, "a", "sendKava").with_arguments("{\"amo"),
                ]))
                .chunk(StreamChunk::tool_call(ToolCallChunk::arguments(0, "unt\":\"2\"}")))
                .chunk(StreamChunk::tool_call(ToolCallChunk::arguments(1, "\"kava1x\"}"))),
            Script::new().content("done"),
        ]);
        let context = Arc::new(ConversationContext::new());

        orchestrator(&source)
            .run(&context, &gpt(), CancellationToken::new())
            .await
            .unwrap();

        let tool_ids: Vec<_> = context
            .history
            .snapshot()
            .iter()
            .filter_map(|m| match m {
                ChatMessage::Tool { tool_call_id, .. } => Some(tool_call_id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(tool_ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_reasoning_split_and_stripping() {
        let model = ModelConfig::new("deepseek-r1").with_reasoning(ReasoningTags::default());
        let source = ScriptedSource::new([
            Script::new().content("<thi").content("nk>plan</think>answer"),
            Script::new().content("second"),
        ]);
        let context = Arc::new(ConversationContext::new());
        let (reasoning, _sub) = record_text(&context.reasoning, &context, |c| &c.reasoning);
        let orchestrator = orchestrator(&source);

        orchestrator
            .send(&context, &model, "why?", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*reasoning.lock().unwrap(), vec!["plan", ""]);
        assert_eq!(
            context.history.snapshot()[1],
            ChatMessage::assistant_with_reasoning("answer", "plan")
        );

        orchestrator
            .send(&context, &model, "and?", CancellationToken::new())
            .await
            .unwrap();

        let requests = source.requests();
        assert_eq!(requests[1].messages[1], ChatMessage::assistant("answer"));
    }

    #[tokio::test]
    async fn test_cancellation_flushes_partial_message() {
        init_tracing();
        let source = ScriptedSource::new([Script::new().content("Hel").content("lo").then_hang()]);
        let context = Arc::new(ConversationContext::new());
        let token = CancellationToken::new();
        let orchestrator = orchestrator(&source);

        let canceller = async {
            while context.message.snapshot() != "Hello" {
                tokio::task::yield_now().await;
            }
            token.cancel();
        };
        let model = gpt();
        let (result, ()) = tokio::join!(orchestrator.run(&context, &model, token.clone()), canceller);

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(context.message.is_empty());
        assert!(context.progress.is_empty());
        assert_eq!(
            context.history.snapshot().as_slice(),
            &[ChatMessage::assistant("Hello")]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let source = ScriptedSource::new([Script::new().content("never")]);
        let context = Arc::new(ConversationContext::new());
        let token = CancellationToken::new();
        token.cancel();

        let result = orchestrator(&source).run(&context, &gpt(), token).await;

        assert!(result.unwrap_err().is_cancelled());
        assert!(source.requests().is_empty());
        assert!(context.progress.is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_propagates_after_flush() {
        let source = ScriptedSource::new([Script::new().content("par").error(StreamError::Decode {
            provider: "scripted".into(),
            details: "bad frame".into(),
        })]);
        let context = Arc::new(ConversationContext::new());

        let err = orchestrator(&source)
            .run(&context, &gpt(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Stream(StreamError::Decode { .. })));
        assert_eq!(
            context.history.snapshot().as_slice(),
            &[ChatMessage::assistant("par")]
        );
    }

    #[tokio::test]
    async fn test_protocol_violation_propagates_and_discards_tool_calls() {
        let source = ScriptedSource::new([Script::new()
            .chunk(StreamChunk::tool_call(
                ToolCallChunk::start(0, "tc1", "sendKava").with_arguments("{\"amount\":"),
            ))
            .chunk(StreamChunk::tool_call(ToolCallChunk::arguments(1, "{}")))]);
        let context = Arc::new(ConversationContext::new());

        let err = orchestrator(&source)
            .run(&context, &gpt(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::ToolStream(ToolStreamError::MissingId { index: 1 })
        ));
        assert!(context.tool_calls.is_empty());
        assert!(context.history.is_empty());
    }

    #[tokio::test]
    async fn test_sink_receives_each_committed_turn() {
        let usage = Usage {
            prompt_tokens: 100,
            completion_tokens: 20,
            total_tokens: 120,
        };
        let source = ScriptedSource::new([
            Script::new().chunk(StreamChunk::tool_call(
                ToolCallChunk::start(0, "tc1", "balance").with_arguments("{\"address\":\"kava1\"}"),
            )),
            Script::new().content("10 KAVA").chunk(StreamChunk::usage(usage)),
        ]);
        let sink = RecordingSink::new();
        let context = Arc::new(ConversationContext::new());
        let model = gpt().with_context_length(1000).with_usage_in_stream(true);

        let summary = ChatOrchestrator::new(source.clone(), registry())
            .with_sink(sink.clone())
            .run(&context, &model, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.usage, Some(usage));
        assert!(source.requests().iter().all(|r| r.include_usage));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].messages.len(), 2);
        assert_eq!(records[0].tokens_remaining, None);
        assert_eq!(records[1].messages.len(), 3);
        assert_eq!(records[1].tokens_remaining, Some(880));
        assert_eq!(records[1].conversation_id, context.history.conversation_id());
        assert_eq!(records[1].model_id, "gpt-4o");
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_fail_the_run() {
        let source = ScriptedSource::new([Script::new().content("hi")]);
        let sink = RecordingSink::failing();
        let context = Arc::new(ConversationContext::new());

        let result = ChatOrchestrator::new(source, registry())
            .with_sink(sink.clone())
            .run(&context, &gpt(), CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_system_prompt_prefixes_request_only() {
        let source = ScriptedSource::new([Script::new().content("hi")]);
        let context = Arc::new(ConversationContext::new());
        let model = gpt().with_system_prompt("You are a KAVA assistant.");

        orchestrator(&source)
            .send(&context, &model, "hello", CancellationToken::new())
            .await
            .unwrap();

        let request = &source.requests()[0];
        assert_eq!(request.messages[0], ChatMessage::system("You are a KAVA assistant."));
        assert_eq!(request.messages[1], ChatMessage::user("hello"));
        assert!(!context.history.snapshot().iter().any(ChatMessage::is_system));
    }
}

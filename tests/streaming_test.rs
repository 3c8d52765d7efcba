// Streaming completions against a mock provider

use std::sync::Arc;

use parley::catalog::ModelCatalogCache;
use parley::providers::{ClaudeAdapter, OpenAiAdapter};
use parley::streaming::StreamingCompletionClient;
use parley::{CancelHandle, Message, ParleyError, ProviderManager, ProviderSettings, StreamState};

fn sse(frames: &[&str]) -> String {
    frames.iter().map(|f| format!("data: {}\n\n", f)).collect()
}

fn openai(server: &mockito::Server) -> OpenAiAdapter {
    OpenAiAdapter::new("sk-test", Arc::new(ModelCatalogCache::default()))
        .unwrap()
        .with_host(&server.url())
}

fn manager_for(adapter: OpenAiAdapter) -> ProviderManager {
    let mut manager = ProviderManager::new(Arc::new(ModelCatalogCache::default())).unwrap();
    manager.register(Arc::new(adapter));
    manager
}

#[tokio::test]
async fn test_hello_world_stream() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse(&[
            r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"{"choices":[{"delta":{"content":"lo, "}}]}"#,
            r#"{"choices":[{"delta":{"content":"world"}}]}"#,
            "[DONE]",
        ]))
        .create_async()
        .await;

    let manager = manager_for(openai(&server));
    let conversation = vec![Message::user("Say hello")];
    let mut updates = Vec::new();
    let outcome = manager
        .generate_response(&conversation, &ProviderSettings::default(), CancelHandle::new(), |update| {
            updates.push(update.text.to_string())
        })
        .await
        .unwrap();

    assert_eq!(outcome.text, "Hello, world");
    assert_eq!(outcome.state, StreamState::Completed);
    assert_eq!(updates, vec!["Hel", "Hello, ", "Hello, world"]);
    mock.assert_async().await;

    let metrics = manager.metrics();
    assert_eq!(metrics.len(), 1);
    assert!(metrics[0].success);
    assert!(metrics[0].tokens > 0);
}

#[tokio::test]
async fn test_http_error_is_network_error_and_recorded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
        .create_async()
        .await;

    let manager = manager_for(openai(&server));
    let err = manager
        .generate_response(&[Message::user("hi")], &ProviderSettings::default(), CancelHandle::new(), |_| {})
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("Incorrect API key"));
    assert!(err.is_fatal());

    let metrics = manager.metrics();
    assert!(!metrics[0].success);
    assert!(metrics[0].error.as_deref().unwrap().contains("401"));
}

#[tokio::test]
async fn test_error_frame_mid_stream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(sse(&[
            r#"{"choices":[{"delta":{"content":"partial"}}]}"#,
            r#"{"error":{"message":"upstream overloaded"}}"#,
        ]))
        .create_async()
        .await;

    let manager = manager_for(openai(&server));
    let mut seen = String::new();
    let err = manager
        .generate_response(&[Message::user("hi")], &ProviderSettings::default(), CancelHandle::new(), |update| {
            seen.push_str(update.delta)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ParleyError::Provider(ref m) if m == "upstream overloaded"));
    assert_eq!(seen, "partial");
}

#[tokio::test]
async fn test_cancel_before_send_makes_no_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let manager = manager_for(openai(&server));
    let cancel = CancelHandle::new();
    cancel.cancel();

    let mut calls = 0;
    let outcome = manager
        .generate_response(&[Message::user("hi")], &ProviderSettings::default(), cancel, |_| calls += 1)
        .await
        .unwrap();

    assert_eq!(outcome.state, StreamState::Cancelled);
    assert_eq!(outcome.text, "");
    assert_eq!(calls, 0);
    mock.assert_async().await;

    // Cancellation is not a failure.
    assert!(manager.metrics()[0].success);
}

#[tokio::test]
async fn test_non_streaming_mode() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::PartialJsonString(r#"{"stream":false}"#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"All at once"}}]}"#)
        .create_async()
        .await;

    let manager = manager_for(openai(&server));
    let settings = ProviderSettings {
        stream: false,
        ..ProviderSettings::default()
    };
    let mut calls = 0;
    let outcome = manager
        .generate_response(&[Message::user("hi")], &settings, CancelHandle::new(), |_| calls += 1)
        .await
        .unwrap();

    assert_eq!(outcome.text, "All at once");
    assert_eq!(calls, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_budget_trims_old_messages_from_request() {
    let mut server = mockito::Server::new_async().await;
    // Only the system prompt and the newest turn fit in 500 tokens.
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::Regex(
            r#""messages":\[\{"content":"be brief","role":"system"\},\{"content":"newest question","role":"user"\}\]"#
                .to_string(),
        ))
        .with_status(200)
        .with_body(sse(&[r#"{"choices":[{"delta":{"content":"ok"}}]}"#, "[DONE]"]))
        .create_async()
        .await;

    let manager = manager_for(openai(&server));
    let conversation = vec![
        Message::system("be brief"),
        Message::user("x".repeat(3000)),
        Message::assistant("y".repeat(3000)),
        Message::user("newest question"),
    ];
    let settings = ProviderSettings {
        max_context_tokens: Some(500),
        ..ProviderSettings::default()
    };
    let outcome = manager
        .generate_response(&conversation, &settings, CancelHandle::new(), |_| {})
        .await
        .unwrap();
    assert_eq!(outcome.text, "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_claude_stream_via_client() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-ant-test")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_body(concat!(
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Bonjour\"}}\n\n",
            "event: ping\ndata: {\"type\":\"ping\"}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        ))
        .create_async()
        .await;

    let adapter = ClaudeAdapter::new("sk-ant-test", Arc::new(ModelCatalogCache::default()))
        .unwrap()
        .with_host(&server.url());
    let client = StreamingCompletionClient::new().unwrap();
    let stream = client
        .open(
            &adapter,
            &[Message::system("French only"), Message::user("hello")],
            &ProviderSettings::default(),
            CancelHandle::new(),
        )
        .await
        .unwrap();

    let outcome = stream.complete(|_| {}).await.unwrap();
    assert_eq!(outcome.text, "Bonjour");
    assert_eq!(outcome.state, StreamState::Completed);
}

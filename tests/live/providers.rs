// Per-provider smoke tests
//
// One minimal streamed completion and one credential check per provider.
//
// Run all: PARLEY_LIVE_TESTS=1 cargo test -- --include-ignored live_
// Run one: PARLEY_LIVE_TESTS=1 ANTHROPIC_API_KEY=sk-ant-... cargo test -- --include-ignored live_claude

use std::sync::Arc;

use parley::catalog::ModelCatalogCache;
use parley::{CancelHandle, Message, ProviderAdapter, ProviderKind, ProviderManager, ProviderSettings, StreamState};

use crate::{live_tests_enabled, make_adapter};

async fn minimal_response(kind: ProviderKind) {
    if !live_tests_enabled() {
        return;
    }
    let Some(adapter) = make_adapter(kind) else {
        eprintln!("skip: no credential for {}", kind);
        return;
    };

    let mut manager = ProviderManager::new(Arc::new(ModelCatalogCache::default())).unwrap();
    manager.register(adapter);

    assert!(manager.validate_api_key().await.unwrap(), "{} rejected its credential", kind);

    let settings = ProviderSettings {
        max_tokens: 16,
        ..ProviderSettings::default()
    };
    let mut deltas = 0;
    let outcome = manager
        .generate_response(&[Message::user("Say: ok")], &settings, CancelHandle::new(), |_| deltas += 1)
        .await
        .unwrap_or_else(|e| panic!("{} request failed: {}", kind, e));

    assert_eq!(outcome.state, StreamState::Completed);
    assert!(!outcome.text.trim().is_empty(), "{} returned empty response", kind);
    assert!(deltas >= 1);
}

#[tokio::test]
#[ignore = "live: set PARLEY_LIVE_TESTS=1"]
async fn live_openai_minimal_response() {
    minimal_response(ProviderKind::OpenAi).await;
}

#[tokio::test]
#[ignore = "live: set PARLEY_LIVE_TESTS=1"]
async fn live_claude_minimal_response() {
    minimal_response(ProviderKind::Claude).await;
}

#[tokio::test]
#[ignore = "live: set PARLEY_LIVE_TESTS=1"]
async fn live_gateway_minimal_response() {
    minimal_response(ProviderKind::Gateway).await;
}

#[tokio::test]
#[ignore = "live: set PARLEY_LIVE_TESTS=1"]
async fn live_azure_minimal_response() {
    minimal_response(ProviderKind::Azure).await;
}

#[tokio::test]
#[ignore = "live: set PARLEY_LIVE_TESTS=1"]
async fn live_gateway_usage_stats() {
    if !live_tests_enabled() {
        return;
    }
    let Some(adapter) = make_adapter(ProviderKind::Gateway) else {
        eprintln!("skip: no credential for gateway");
        return;
    };
    let stats = adapter.usage_stats().await.expect("usage stats");
    assert!(stats.usage >= 0.0);
}

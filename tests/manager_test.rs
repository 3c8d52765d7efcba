// ProviderManager wiring: config, validation, health and telemetry

use std::sync::Arc;

use parley::catalog::ModelCatalogCache;
use parley::config::{Config, ProviderEntry};
use parley::manager::Operation;
use parley::providers::OpenAiAdapter;
use parley::{CancelHandle, HealthStatus, Message, ProviderKind, ProviderManager, ProviderSettings};

fn openai_entry(api_host: &str, api_key: &str) -> ProviderEntry {
    ProviderEntry::Openai {
        api_key: api_key.to_string(),
        api_host: Some(api_host.to_string()),
        model: None,
        name: None,
    }
}

#[tokio::test]
async fn test_validate_against_unreachable_host_is_false() {
    let adapter = OpenAiAdapter::new("sk-test", Arc::new(ModelCatalogCache::default()))
        .unwrap()
        .with_host("http://127.0.0.1:1");
    let mut manager = ProviderManager::new(Arc::new(ModelCatalogCache::default())).unwrap();
    manager.register(Arc::new(adapter));

    assert!(!manager.validate_api_key().await.unwrap());

    let metrics = manager.metrics();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].operation, Operation::ValidateApiKey);
}

#[tokio::test]
async fn test_from_config_activates_configured_provider() {
    let mut config = Config::with_providers(vec![
        openai_entry("http://127.0.0.1:1", "sk-oa"),
        ProviderEntry::Claude {
            api_key: "sk-ant".to_string(),
            api_host: None,
            model: Some("claude-sonnet-4-5".to_string()),
            name: None,
        },
    ]);
    config.active_provider = Some("anthropic".to_string());

    let mut manager = ProviderManager::from_config(&config).unwrap();
    assert_eq!(manager.current_provider(), Some(ProviderKind::Claude));
    assert_eq!(manager.current_model().unwrap().model_id, "claude-sonnet-4-5");
    assert_eq!(manager.registered(), vec![ProviderKind::OpenAi, ProviderKind::Claude]);

    manager.set_provider("openai").unwrap();
    assert_eq!(manager.current_provider(), Some(ProviderKind::OpenAi));
    assert!(manager.current_model().is_none());
    assert!(manager.set_provider("gateway").is_err());
}

#[tokio::test]
async fn test_health_reflects_credential_check() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/models")
        .match_header("authorization", "Bearer good-key")
        .with_status(200)
        .with_body(r#"{"data":[]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v1/models")
        .match_header("authorization", "Bearer bad-key")
        .with_status(401)
        .create_async()
        .await;

    let healthy = ProviderManager::from_config(&Config::with_providers(vec![openai_entry(&server.url(), "good-key")])).unwrap();
    let report = healthy.health_check().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.details.credential_valid, Some(true));

    let degraded = ProviderManager::from_config(&Config::with_providers(vec![openai_entry(&server.url(), "bad-key")])).unwrap();
    assert_eq!(degraded.health_check().await.status, HealthStatus::Degraded);

    let unhealthy = ProviderManager::from_config(&Config::with_providers(vec![openai_entry(&server.url(), "")])).unwrap();
    let report = unhealthy.health_check().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(report.details.reason.unwrap().contains("credential"));
}

#[tokio::test]
async fn test_forbidden_completion_makes_provider_unhealthy() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_body(r#"{"data":[]}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(403)
        .with_body(r#"{"error":{"message":"model access denied"}}"#)
        .create_async()
        .await;

    let manager = ProviderManager::from_config(&Config::with_providers(vec![openai_entry(&server.url(), "sk")])).unwrap();
    let err = manager
        .generate_response(&[Message::user("hi")], &ProviderSettings::default(), CancelHandle::new(), |_| {})
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(manager.metrics()[0].fatal);

    let report = manager.health_check().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(report.details.credential_valid, Some(true));
    assert!(report.details.reason.unwrap().contains("generate_response"));
}

#[tokio::test]
async fn test_usage_stats_unsupported_outside_gateway() {
    let config = Config::with_providers(vec![openai_entry("http://127.0.0.1:1", "sk")]);
    let manager = ProviderManager::from_config(&config).unwrap();

    assert!(manager.get_usage_stats().await.is_err());
    let summary = manager.performance_summary();
    assert_eq!(summary.failures, 1);
}

#[tokio::test]
async fn test_recommendation_uses_active_catalog() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_body(r#"{"data":[{"id":"gpt-4o-mini"},{"id":"o3-mini"},{"id":"dall-e-3"}]}"#)
        .create_async()
        .await;

    let manager = ProviderManager::from_config(&Config::with_providers(vec![openai_entry(&server.url(), "sk")])).unwrap();

    let pick = manager.get_recommended_model("generate an image of a cat", None).await.unwrap();
    assert_eq!(pick.unwrap().model_id, "dall-e-3");
    let pick = manager.get_recommended_model("reason about this", None).await.unwrap();
    assert_eq!(pick.unwrap().model_id, "o3-mini");
}

// Gateway provider (OpenRouter-style multi-vendor router)
//
// OpenAI wire format under a different path layout, with a richer model
// listing (context length, per-token pricing) and an account endpoint that
// reports credit usage.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use super::openai::chat_body;
use super::types::{UsageStats, WireRequest};
use super::{fetch_text, http_client, probe, resolve_model, trim_host, ProviderAdapter, ProviderKind};
use crate::catalog::{defaults, remote, CatalogSource, ModelCatalogCache, ModelInfo};
use crate::config::ProviderSettings;
use crate::conversation::Message;
use crate::errors::{ParleyError, Result};

pub const GATEWAY_API_HOST: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const APP_TITLE: &str = "parley";

/// The gateway lists prices in USD per token.
const PRICE_SCALE: f64 = 1000.0;

#[derive(Clone)]
pub struct GatewayAdapter {
    client: Client,
    api_key: String,
    api_host: String,
    default_model: String,
    provider_name: String,
    catalog: Arc<ModelCatalogCache>,
}

impl GatewayAdapter {
    pub fn new(api_key: impl Into<String>, catalog: Arc<ModelCatalogCache>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.into(),
            api_host: GATEWAY_API_HOST.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            provider_name: "gateway".to_string(),
            catalog,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_host(mut self, api_host: &str) -> Self {
        self.api_host = trim_host(api_host);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    fn authorized(&self, request: WireRequest) -> WireRequest {
        request
            .with_bearer(&self.api_key)
            .with_header("X-Title", APP_TITLE)
    }

    fn key_request(&self) -> WireRequest {
        self.authorized(WireRequest::get(format!("{}/auth/key", self.api_host)))
    }
}

#[async_trait]
impl CatalogSource for GatewayAdapter {
    fn cache_key(&self) -> String {
        format!("{}:{}", self.provider_name, self.api_host)
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let request = self.authorized(WireRequest::get(format!("{}/models", self.api_host)));
        let body = fetch_text(&self.client, request).await?;
        Ok(remote::parse_model_list(&body)?
            .into_iter()
            .map(|m| m.into_model_info(&self.provider_name, PRICE_SCALE))
            .collect())
    }

    fn default_models(&self) -> Vec<ModelInfo> {
        defaults::gateway_models(&self.provider_name)
    }
}

#[async_trait]
impl ProviderAdapter for GatewayAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gateway
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn credential(&self) -> &str {
        &self.api_key
    }

    fn build_request(&self, conversation: &[Message], settings: &ProviderSettings) -> Result<WireRequest> {
        let body = chat_body(conversation, settings, resolve_model(settings, &self.default_model))?;
        Ok(self.authorized(WireRequest::post(
            format!("{}/chat/completions", self.api_host),
            body,
        )))
    }

    async fn validate_credential(&self) -> bool {
        probe(&self.client, self.key_request(), &self.provider_name).await
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        self.catalog.get_models(self).await
    }

    async fn usage_stats(&self) -> Result<UsageStats> {
        let body = fetch_text(&self.client, self.key_request()).await?;
        parse_key_info(&self.provider_name, &body)
    }
}

#[derive(Debug, Deserialize)]
struct KeyInfoResponse {
    data: KeyInfo,
}

#[derive(Debug, Deserialize)]
struct KeyInfo {
    #[serde(default)]
    usage: f64,
    #[serde(default)]
    limit: Option<f64>,
    #[serde(default)]
    is_free_tier: bool,
}

fn parse_key_info(provider: &str, body: &str) -> Result<UsageStats> {
    let info: KeyInfoResponse = serde_json::from_str(body)
        .map_err(|e| ParleyError::Parse(format!("malformed key info: {}", e)))?;
    Ok(UsageStats {
        provider: provider.to_string(),
        usage: info.data.usage,
        limit: info.data.limit,
        is_free_tier: info.data.is_free_tier,
    })
}

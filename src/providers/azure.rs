// Azure OpenAI provider
//
// Same body and stream format as OpenAI, but requests are addressed to a
// deployment on the user's resource and authenticated with an `api-key`
// header instead of a bearer token.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use super::openai::chat_body;
use super::types::WireRequest;
use super::{fetch_text, http_client, probe, ProviderAdapter, ProviderKind};
use crate::catalog::{defaults, remote, CatalogSource, ModelCatalogCache, ModelInfo};
use crate::config::ProviderSettings;
use crate::conversation::Message;
use crate::errors::{ParleyError, Result};

pub const CHAT_API_VERSION: &str = "2023-03-15-preview";
const DEPLOYMENTS_API_VERSION: &str = "2022-12-01";

#[derive(Clone)]
pub struct AzureAdapter {
    client: Client,
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
    provider_name: String,
    catalog: Arc<ModelCatalogCache>,
}

impl AzureAdapter {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: &str,
        deployment: impl Into<String>,
        catalog: Arc<ModelCatalogCache>,
    ) -> Result<Self> {
        let deployment = deployment.into();
        if deployment.trim().is_empty() {
            return Err(ParleyError::validation("azure deployment name is empty"));
        }
        Ok(Self {
            client: http_client()?,
            api_key: api_key.into(),
            endpoint: normalize_endpoint(endpoint)?,
            deployment,
            api_version: CHAT_API_VERSION.to_string(),
            provider_name: "azure".to_string(),
            catalog,
        })
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn chat_url(&self) -> String {
        format!(
            "{}openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    fn deployments_request(&self) -> WireRequest {
        WireRequest::get(format!(
            "{}openai/deployments?api-version={}",
            self.endpoint, DEPLOYMENTS_API_VERSION
        ))
        .with_header("api-key", self.api_key.as_str())
    }
}

/// Accepts `myres.openai.azure.com`, `https://myres.openai.azure.com` or
/// `http://myres.openai.azure.com/` and always yields `https://host/`.
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let host = endpoint.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host)
        .trim_end_matches('/');
    if host.is_empty() {
        return Err(ParleyError::validation("azure endpoint is empty"));
    }
    Ok(format!("https://{}/", host))
}

#[async_trait]
impl CatalogSource for AzureAdapter {
    fn cache_key(&self) -> String {
        format!("{}:{}", self.provider_name, self.endpoint)
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let body = fetch_text(&self.client, self.deployments_request()).await?;
        Ok(remote::parse_model_list(&body)?
            .into_iter()
            .map(|m| m.into_model_info(&self.provider_name, 1.0))
            .collect())
    }

    fn default_models(&self) -> Vec<ModelInfo> {
        defaults::azure_models(&self.provider_name, &self.deployment)
    }
}

#[async_trait]
impl ProviderAdapter for AzureAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    /// The deployment pins the model; the `model` field is informational.
    fn default_model(&self) -> &str {
        &self.deployment
    }

    fn credential(&self) -> &str {
        &self.api_key
    }

    fn build_request(&self, conversation: &[Message], settings: &ProviderSettings) -> Result<WireRequest> {
        let body = chat_body(conversation, settings, &self.deployment)?;
        Ok(WireRequest::post(self.chat_url(), body).with_header("api-key", self.api_key.as_str()))
    }

    async fn validate_credential(&self) -> bool {
        probe(&self.client, self.deployments_request(), &self.provider_name).await
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        self.catalog.get_models(self).await
    }
}

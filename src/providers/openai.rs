// OpenAI-compatible provider
//
// Works for OpenAI itself and for any backend speaking the same
// `/v1/chat/completions` dialect (local servers, Groq, Mistral, xAI...).
// The request body and frame parsing here are shared with the Azure and
// gateway adapters.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::{ImageResult, StreamFrame, WireRequest};
use super::{
    error_message, fetch_text, http_client, probe, resolve_model, trim_host, ProviderAdapter,
    ProviderKind, REQUEST_TIMEOUT,
};
use crate::catalog::{defaults, remote, CatalogSource, ModelCatalogCache, ModelInfo};
use crate::config::ProviderSettings;
use crate::conversation::Message;
use crate::errors::{ParleyError, Result};

pub const OPENAI_API_HOST: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";

/// Generic OpenAI-compatible adapter
#[derive(Clone)]
pub struct OpenAiAdapter {
    client: Client,
    api_key: String,
    api_host: String,
    default_model: String,
    provider_name: String,
    catalog: Arc<ModelCatalogCache>,
}

impl OpenAiAdapter {
    /// Adapter for api.openai.com
    pub fn new(api_key: impl Into<String>, catalog: Arc<ModelCatalogCache>) -> Result<Self> {
        Self::compatible("openai", OPENAI_API_HOST, api_key, catalog)
    }

    /// Adapter for any OpenAI-compatible host
    pub fn compatible(
        provider_name: impl Into<String>,
        api_host: &str,
        api_key: impl Into<String>,
        catalog: Arc<ModelCatalogCache>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.into(),
            api_host: trim_host(api_host),
            default_model: DEFAULT_MODEL.to_string(),
            provider_name: provider_name.into(),
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

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    fn authorized(&self, request: WireRequest) -> WireRequest {
        request.with_bearer(&self.api_key)
    }

    fn models_request(&self) -> WireRequest {
        self.authorized(WireRequest::get(format!("{}/v1/models", self.api_host)))
    }
}

#[async_trait]
impl CatalogSource for OpenAiAdapter {
    fn cache_key(&self) -> String {
        format!("{}:{}", self.provider_name, self.api_host)
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let body = fetch_text(&self.client, self.models_request()).await?;
        Ok(remote::parse_model_list(&body)?
            .into_iter()
            .map(|m| m.into_model_info(&self.provider_name, 1.0))
            .collect())
    }

    fn default_models(&self) -> Vec<ModelInfo> {
        defaults::openai_models(&self.provider_name)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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
            format!("{}/v1/chat/completions", self.api_host),
            body,
        )))
    }

    async fn validate_credential(&self) -> bool {
        probe(&self.client, self.models_request(), &self.provider_name).await
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        self.catalog.get_models(self).await
    }

    async fn generate_image(&self, prompt: &str) -> Result<ImageResult> {
        let request = self.authorized(WireRequest::post(
            format!("{}/v1/images/generations", self.api_host),
            serde_json::to_value(ImageRequest {
                model: IMAGE_MODEL,
                prompt,
                n: 1,
                size: IMAGE_SIZE,
            })?,
        ));

        tracing::debug!(provider = %self.provider_name, "Requesting image generation");
        let response = request
            .into_builder(&self.client)
            .timeout(REQUEST_TIMEOUT * 2)
            .send()
            .await?;
        let body = super::check_status(response).await?.text().await?;
        parse_image_response(&body)
    }
}

// Request body

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// `{messages, model, max_tokens, temperature, top_p?, stream}`
pub(crate) fn chat_body(
    conversation: &[Message],
    settings: &ProviderSettings,
    model: &str,
) -> Result<serde_json::Value> {
    if conversation.is_empty() {
        return Err(ParleyError::validation("conversation is empty"));
    }
    let request = ChatRequest {
        model,
        messages: conversation
            .iter()
            .map(|m| ChatMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
        top_p: settings.top_p,
        stream: settings.stream,
    };
    Ok(serde_json::to_value(request)?)
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

// Response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Interpret one SSE data payload in the OpenAI dialect.
pub(crate) fn parse_stream_data(data: &str) -> Result<StreamFrame> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamFrame::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| ParleyError::Parse(format!("malformed stream frame: {}", e)))?;
    if let Some(error) = chunk.error {
        return Ok(StreamFrame::Error(error_message(&error)));
    }
    let delta = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|text| !text.is_empty());
    Ok(delta.map(StreamFrame::Delta).unwrap_or(StreamFrame::Ignore))
}

pub(crate) fn parse_completion(body: &str) -> Result<String> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| ParleyError::Parse(format!("malformed completion: {}", e)))?;
    if let Some(error) = response.error {
        return Err(ParleyError::Provider(error_message(&error)));
    }
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

fn parse_image_response(body: &str) -> Result<ImageResult> {
    let response: ImageResponse = serde_json::from_str(body)
        .map_err(|e| ParleyError::Parse(format!("malformed image response: {}", e)))?;
    if let Some(error) = response.error {
        return Err(ParleyError::Provider(error_message(&error)));
    }
    response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ParleyError::Provider("image response contained no images".to_string()))
}

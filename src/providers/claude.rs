// Claude (Anthropic Messages API) provider
//
// Differs from the OpenAI dialect in three places: the key goes in
// `x-api-key`, the system prompt is a top-level field rather than a message,
// and streamed text arrives as `content_block_delta` events.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::{StreamFrame, WireRequest};
use super::{
    error_message, fetch_text, http_client, probe, resolve_model, trim_host, ProviderAdapter,
    ProviderKind, StreamDialect,
};
use crate::catalog::{defaults, remote, CatalogSource, ModelCatalogCache, ModelInfo};
use crate::config::ProviderSettings;
use crate::conversation::{split_system, Message, Role};
use crate::errors::{ParleyError, Result};

pub const CLAUDE_API_HOST: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

#[derive(Clone)]
pub struct ClaudeAdapter {
    client: Client,
    api_key: String,
    api_host: String,
    default_model: String,
    provider_name: String,
    catalog: Arc<ModelCatalogCache>,
}

impl ClaudeAdapter {
    pub fn new(api_key: impl Into<String>, catalog: Arc<ModelCatalogCache>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key: api_key.into(),
            api_host: CLAUDE_API_HOST.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            provider_name: "claude".to_string(),
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
            .with_header("x-api-key", self.api_key.as_str())
            .with_header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn models_request(&self) -> WireRequest {
        self.authorized(WireRequest::get(format!("{}/v1/models", self.api_host)))
    }
}

#[async_trait]
impl CatalogSource for ClaudeAdapter {
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
        defaults::claude_models(&self.provider_name)
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
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

    fn dialect(&self) -> StreamDialect {
        StreamDialect::Claude
    }

    fn build_request(&self, conversation: &[Message], settings: &ProviderSettings) -> Result<WireRequest> {
        let (system, history) = split_system(conversation);
        if history.is_empty() {
            return Err(ParleyError::validation(
                "conversation has no user or assistant messages",
            ));
        }

        let request = MessagesRequest {
            model: resolve_model(settings, &self.default_model),
            max_tokens: settings.max_tokens,
            system: system.map(|m| m.content.as_str()),
            messages: history
                .iter()
                .map(|m| ClaudeMessage {
                    // Only user/assistant are accepted; a late system note rides as user text.
                    role: if m.role == Role::Assistant { "assistant" } else { "user" },
                    content: &m.content,
                })
                .collect(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            stream: settings.stream,
        };

        Ok(self.authorized(WireRequest::post(
            format!("{}/v1/messages", self.api_host),
            serde_json::to_value(request)?,
        )))
    }

    async fn validate_credential(&self) -> bool {
        probe(&self.client, self.models_request(), &self.provider_name).await
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        self.catalog.get_models(self).await
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ClaudeMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    delta: Option<EventDelta>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EventDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

pub(crate) fn parse_stream_data(data: &str) -> Result<StreamFrame> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamFrame::Done);
    }
    let event: StreamEvent = serde_json::from_str(data)
        .map_err(|e| ParleyError::Parse(format!("malformed stream frame: {}", e)))?;
    if let Some(error) = event.error {
        return Ok(StreamFrame::Error(error_message(&error)));
    }
    Ok(match event.event_type.as_str() {
        "content_block_delta" => event
            .delta
            .and_then(|d| d.text)
            .filter(|t| !t.is_empty())
            .map(StreamFrame::Delta)
            .unwrap_or(StreamFrame::Ignore),
        "message_stop" => StreamFrame::Done,
        _ => StreamFrame::Ignore,
    })
}

pub(crate) fn parse_completion(body: &str) -> Result<String> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| ParleyError::Parse(format!("malformed completion: {}", e)))?;
    if let Some(error) = response.error {
        return Err(ParleyError::Provider(error_message(&error)));
    }
    Ok(response
        .content
        .into_iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text)
        .collect())
}

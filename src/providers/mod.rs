// Multi-provider support
//
// Every backend (generic OpenAI-compatible, Azure, Claude, gateway) implements
// `ProviderAdapter`. The rest of the crate only talks to the trait, and
// backends are looked up by `ProviderKind`.

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::{CatalogSource, ModelInfo};
use crate::config::ProviderSettings;
use crate::conversation::Message;
use crate::errors::{ParleyError, Result};

pub mod types;

// Provider implementations
pub mod azure;
pub mod claude;
pub mod gateway;
pub mod openai;

// Provider factory
pub mod factory;

pub use azure::AzureAdapter;
pub use claude::ClaudeAdapter;
pub use factory::create_adapter;
pub use gateway::GatewayAdapter;
pub use openai::OpenAiAdapter;
pub use types::{ImageResult, StreamFrame, UsageStats, WireRequest};

/// Connect timeout for every provider call.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Whole-request timeout for short calls (listing, validation, images).
/// Streaming completions are bounded only by cancellation.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    OpenAi,
    Azure,
    Claude,
    Gateway,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [Self::OpenAi, Self::Azure, Self::Claude, Self::Gateway];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Azure => "azure",
            Self::Claude => "claude",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "generic" => Ok(Self::OpenAi),
            "azure" | "azure-openai" => Ok(Self::Azure),
            "claude" | "anthropic" => Ok(Self::Claude),
            "gateway" | "openrouter" => Ok(Self::Gateway),
            other => Err(ParleyError::validation(format!("unsupported provider: {}", other))),
        }
    }
}

/// How a provider frames its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDialect {
    /// `choices[0].delta.content` frames terminated by `[DONE]`
    OpenAi,
    /// Anthropic Messages events (`content_block_delta`, `message_stop`)
    Claude,
}

impl StreamDialect {
    pub fn parse_frame(&self, data: &str) -> Result<StreamFrame> {
        match self {
            Self::OpenAi => openai::parse_stream_data(data),
            Self::Claude => claude::parse_stream_data(data),
        }
    }

    /// Extract the text of a non-streaming response body.
    pub fn parse_completion(&self, body: &str) -> Result<String> {
        match self {
            Self::OpenAi => openai::parse_completion(body),
            Self::Claude => claude::parse_completion(body),
        }
    }
}

/// Trait implemented by every backend.
///
/// Adapters are catalog sources too: `list_models` goes through the shared
/// `ModelCatalogCache` the adapter was constructed with.
#[async_trait]
pub trait ProviderAdapter: CatalogSource {
    fn kind(&self) -> ProviderKind;

    /// Display label (e.g. "openai", or a user-chosen name)
    fn name(&self) -> &str;

    /// Model used when the settings don't name one
    fn default_model(&self) -> &str;

    fn credential(&self) -> &str;

    fn dialect(&self) -> StreamDialect {
        StreamDialect::OpenAi
    }

    /// Build the chat completion request for `conversation`.
    fn build_request(&self, conversation: &[Message], settings: &ProviderSettings) -> Result<WireRequest>;

    /// Lightweight authenticated call. Any failure, including an unreachable
    /// host, reads as `false`.
    async fn validate_credential(&self) -> bool;

    async fn list_models(&self) -> Vec<ModelInfo>;

    async fn generate_image(&self, _prompt: &str) -> Result<ImageResult> {
        Err(ParleyError::unsupported(self.name(), "image generation"))
    }

    async fn usage_stats(&self) -> Result<UsageStats> {
        Err(ParleyError::unsupported(self.name(), "usage statistics"))
    }
}

/// HTTP client shared by an adapter's calls.
pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| ParleyError::Config(format!("failed to create HTTP client: {}", e)))
}

/// Model named by the settings, else the adapter default.
pub(crate) fn resolve_model<'a>(settings: &'a ProviderSettings, fallback: &'a str) -> &'a str {
    settings
        .model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(fallback)
}

pub(crate) fn trim_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}

/// Turn a non-2xx response into a `Network` error carrying the body.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ParleyError::Network {
        status: Some(status.as_u16()),
        message: if body.is_empty() {
            status.to_string()
        } else {
            body
        },
    })
}

/// Send a short request and return the body of a 2xx response.
pub(crate) async fn fetch_text(client: &Client, request: WireRequest) -> Result<String> {
    let url = request.url.clone();
    tracing::debug!(url = %url, "Provider request");
    let response = request
        .into_builder(client)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await?;
    let response = check_status(response).await?;
    Ok(response.text().await?)
}

/// Credential check judged solely by HTTP status.
pub(crate) async fn probe(client: &Client, request: WireRequest, provider: &str) -> bool {
    let url = request.url.clone();
    match request
        .into_builder(client)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => true,
        Ok(response) => {
            tracing::warn!(provider, url = %url, status = %response.status(), "Credential rejected");
            false
        }
        Err(e) => {
            tracing::warn!(provider, url = %url, error = %e, "Credential check failed");
            false
        }
    }
}

/// Message text of a provider `error` field, which may be an object with a
/// `message` or a bare string.
pub(crate) fn error_message(error: &serde_json::Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing_with_aliases() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert_eq!(" openrouter ".parse::<ProviderKind>().unwrap(), ProviderKind::Gateway);
        assert_eq!("azure".parse::<ProviderKind>().unwrap(), ProviderKind::Azure);
    }

    #[test]
    fn test_unknown_provider_is_validation_error() {
        let err = "bard".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, ParleyError::Validation(_)));
        assert!(err.to_string().contains("unsupported provider"));
    }

    #[test]
    fn test_kind_round_trips_through_display() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_resolve_model_prefers_settings() {
        let mut settings = ProviderSettings::default();
        assert_eq!(resolve_model(&settings, "gpt-4o"), "gpt-4o");
        settings.model = Some("gpt-4o-mini".to_string());
        assert_eq!(resolve_model(&settings, "gpt-4o"), "gpt-4o-mini");
        settings.model = Some("  ".to_string());
        assert_eq!(resolve_model(&settings, "gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(&serde_json::json!({"message": "bad key"})), "bad key");
        assert_eq!(error_message(&serde_json::json!("overloaded")), "overloaded");
        assert_eq!(error_message(&serde_json::json!({"code": 5})), r#"{"code":5}"#);
    }
}

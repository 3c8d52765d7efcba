// Provider entries as they appear in config.toml

use serde::{Deserialize, Serialize};

use crate::providers::ProviderKind;

/// A single configured backend.
///
/// Serializes with a `type` tag, e.g.:
/// ```toml
/// [[providers]]
/// type = "openai"
/// api_key = "sk-..."
///
/// [[providers]]
/// type = "azure"
/// api_key = "..."
/// endpoint = "myres.openai.azure.com"
/// deployment = "gpt4o-prod"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderEntry {
    /// OpenAI or any OpenAI-compatible host
    #[serde(alias = "generic")]
    Openai {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_host: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Azure {
        api_key: String,
        endpoint: String,
        deployment: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_version: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    #[serde(alias = "anthropic")]
    Claude {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_host: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    #[serde(alias = "openrouter")]
    Gateway {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_host: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ProviderEntry {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Openai { .. } => ProviderKind::OpenAi,
            Self::Azure { .. } => ProviderKind::Azure,
            Self::Claude { .. } => ProviderKind::Claude,
            Self::Gateway { .. } => ProviderKind::Gateway,
        }
    }

    /// Human-readable name for display; also the adapter's label.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Openai { name, .. }
            | Self::Azure { name, .. }
            | Self::Claude { name, .. }
            | Self::Gateway { name, .. } => name.as_deref().unwrap_or(self.kind().as_str()),
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            Self::Openai { api_key, .. }
            | Self::Azure { api_key, .. }
            | Self::Claude { api_key, .. }
            | Self::Gateway { api_key, .. } => api_key,
        }
    }

    /// Optional default-model override. For Azure the deployment pins the model.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Openai { model, .. } | Self::Claude { model, .. } | Self::Gateway { model, .. } => {
                model.as_deref()
            }
            Self::Azure { deployment, .. } => Some(deployment),
        }
    }
}

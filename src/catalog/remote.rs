// Wire format of remote model listings
//
// Accepts both a bare JSON array and the `{ "data": [...] }` envelope used by
// OpenAI-style APIs. Prices may arrive as numbers or as decimal strings.

use serde::Deserialize;

use super::capabilities::known_context_window;
use super::{ModelInfo, Pricing};
use crate::errors::{ParleyError, Result};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteModelList {
    Wrapped { data: Vec<RemoteModel> },
    Bare(Vec<RemoteModel>),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteModel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Underlying model of an Azure deployment
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing: Option<RemotePricing>,
    #[serde(default)]
    pub provider: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemotePricing {
    #[serde(default)]
    prompt: Option<Price>,
    #[serde(default)]
    completion: Option<Price>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Price {
    Number(f64),
    Text(String),
}

impl Price {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl RemoteModel {
    /// Convert into a `ModelInfo`. `price_scale` converts the listing's price
    /// unit into cost per 1K tokens (1000.0 for per-token prices).
    pub fn into_model_info(self, provider_label: &str, price_scale: f64) -> ModelInfo {
        let nickname = self
            .name
            .or(self.display_name)
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| self.id.clone());

        let context_window = self
            .context_length
            .map(|n| n as usize)
            .unwrap_or_else(|| known_context_window(self.model.as_deref().unwrap_or(&self.id)));

        let pricing = self.pricing.and_then(|p| {
            let input = p.prompt.as_ref().and_then(Price::value)?;
            let output = p.completion.as_ref().and_then(Price::value).unwrap_or(input);
            Some(Pricing {
                input: input * price_scale,
                output: output * price_scale,
            })
        });

        let provider = self
            .provider
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| provider_label.to_string());

        ModelInfo {
            model_id: self.id,
            nickname,
            capabilities: Default::default(),
            context_window,
            pricing,
            provider,
            tags: self.tags,
        }
    }
}

pub(crate) fn parse_model_list(body: &str) -> Result<Vec<RemoteModel>> {
    let list: RemoteModelList = serde_json::from_str(body)
        .map_err(|e| ParleyError::Parse(format!("invalid model listing: {}", e)))?;
    Ok(match list {
        RemoteModelList::Wrapped { data } => data,
        RemoteModelList::Bare(models) => models,
    })
}

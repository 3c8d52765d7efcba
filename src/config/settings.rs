// Configuration structs

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::provider::ProviderEntry;
use crate::catalog::DEFAULT_MODEL_TTL;
use crate::providers::ProviderKind;

/// Per-call generation settings handed to adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Model id; falls back to the adapter's default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Completion tokens requested from the provider
    pub max_tokens: u32,
    pub stream: bool,
    /// Prompt budget for the planner. When unset the manager uses the model's
    /// context window minus `max_tokens`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_tokens: Option<usize>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            top_p: None,
            max_tokens: 1024,
            stream: true,
            max_context_tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub model_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            model_ttl_secs: DEFAULT_MODEL_TTL.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn model_ttl(&self) -> Duration {
        Duration::from_secs(self.model_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Ring buffer capacity for performance metrics
    pub max_metrics: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { max_metrics: 100 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider kind to start with; the first entry when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_provider: Option<String>,
    pub providers: Vec<ProviderEntry>,
    pub generation: ProviderSettings,
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    pub fn with_providers(providers: Vec<ProviderEntry>) -> Self {
        Self {
            providers,
            ..Self::default()
        }
    }

    /// Kind of the provider to activate at startup.
    pub fn active_kind(&self) -> Option<ProviderKind> {
        match &self.active_provider {
            Some(id) => ProviderKind::from_str(id).ok(),
            None => self.providers.first().map(ProviderEntry::kind),
        }
    }

    pub fn active_entry(&self) -> Option<&ProviderEntry> {
        let kind = self.active_kind()?;
        self.providers.iter().find(|entry| entry.kind() == kind)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(id) = &self.active_provider {
            let kind = ProviderKind::from_str(id).map_err(|e| anyhow::anyhow!("active_provider: {}", e))?;
            if !self.providers.iter().any(|entry| entry.kind() == kind) {
                anyhow::bail!(
                    "active_provider '{}' has no matching [[providers]] entry\n\n\
                     Add one, e.g.:\n  [[providers]]\n  type = \"{}\"\n  api_key = \"...\"",
                    id,
                    kind
                );
            }
        }

        for (idx, entry) in self.providers.iter().enumerate() {
            if let ProviderEntry::Azure {
                endpoint,
                deployment,
                ..
            } = entry
            {
                if endpoint.trim().is_empty() || deployment.trim().is_empty() {
                    anyhow::bail!("providers[{}]: azure entries need both endpoint and deployment", idx);
                }
            }
        }

        let generation = &self.generation;
        if !(0.0..=2.0).contains(&generation.temperature) {
            anyhow::bail!(
                "generation.temperature must be between 0 and 2 (got {})",
                generation.temperature
            );
        }
        if let Some(top_p) = generation.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                anyhow::bail!("generation.top_p must be between 0 and 1 (got {})", top_p);
            }
        }
        if generation.max_tokens == 0 {
            anyhow::bail!("generation.max_tokens must be greater than 0");
        }
        if self.cache.model_ttl_secs == 0 {
            anyhow::bail!("cache.model_ttl_secs must be greater than 0");
        }
        if self.telemetry.max_metrics == 0 {
            anyhow::bail!("telemetry.max_metrics must be greater than 0");
        }

        Ok(())
    }
}

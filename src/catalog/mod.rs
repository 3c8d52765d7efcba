// Model catalogs
//
// `ModelCatalogCache` remembers each provider's model listing for a TTL and
// prefers stale data (or a built-in catalog) over failing when the listing
// endpoint is unreachable.

mod capabilities;
mod clock;
pub mod defaults;
pub(crate) mod remote;

pub use capabilities::{infer_capabilities, known_context_window, DEFAULT_CONTEXT_WINDOW};
pub use clock::{Clock, ManualClock, SystemClock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::errors::Result;

/// Default time a fetched listing is served without refetching.
pub const DEFAULT_MODEL_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Vision,
    ToolUse,
    Reasoning,
    Code,
    Multimodal,
    ImageGeneration,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::ToolUse => "tool_use",
            Self::Reasoning => "reasoning",
            Self::Code => "code",
            Self::Multimodal => "multimodal",
            Self::ImageGeneration => "image_generation",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cost in USD per 1K tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input: f64,
    pub output: f64,
}

impl Pricing {
    pub fn combined(&self) -> f64 {
        self.input + self.output
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub nickname: String,
    /// Inferred from the identifier; see `infer_capabilities`.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    pub context_window: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    pub provider: String,
    /// Provider-declared labels, kept verbatim.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ModelInfo {
    pub fn new(model_id: impl Into<String>, provider: impl Into<String>) -> Self {
        let model_id = model_id.into();
        Self {
            nickname: model_id.clone(),
            context_window: known_context_window(&model_id),
            model_id,
            capabilities: BTreeSet::new(),
            pricing: None,
            provider: provider.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(caps);
        self
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// Merge heuristic capabilities into whatever is already set.
    pub fn tagged(mut self) -> Self {
        self.capabilities.extend(infer_capabilities(&self.model_id));
        self
    }
}

/// Anything that can produce a model listing for the cache.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Key the listing is cached under: provider name and host. The
    /// credential is not part of it, so a caller that swaps keys on the same
    /// host calls `ModelCatalogCache::invalidate` first.
    fn cache_key(&self) -> String;

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>>;

    /// Built-in catalog used when nothing has ever been fetched.
    fn default_models(&self) -> Vec<ModelInfo>;
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: Instant,
}

pub struct ModelCatalogCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<Vec<ModelInfo>>>>,
    /// One fetch gate per key; held across the fetch so concurrent misses wait.
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Default for ModelCatalogCache {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_TTL)
    }
}

impl ModelCatalogCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<Vec<ModelInfo>>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fetch_gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    fn fresh(&self, key: &str) -> Option<Vec<ModelInfo>> {
        let now = self.clock.now();
        self.entries()
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.timestamp) < self.ttl)
            .map(|entry| entry.data.clone())
    }

    /// Return the models for `source`, fetching at most once per TTL window.
    ///
    /// Never fails: a failed fetch falls back to the last cached listing, even
    /// if stale, and then to the source's built-in catalog.
    pub async fn get_models<S: CatalogSource + ?Sized>(&self, source: &S) -> Vec<ModelInfo> {
        let key = source.cache_key();

        if let Some(models) = self.fresh(&key) {
            tracing::debug!(key = %key, "Model catalog cache hit");
            return models;
        }

        let gate = self.fetch_gate(&key);
        let _fetching = gate.lock().await;
        // Another caller may have filled the entry while this one waited.
        if let Some(models) = self.fresh(&key) {
            tracing::debug!(key = %key, "Model catalog filled by concurrent fetch");
            return models;
        }

        match source.fetch_models().await {
            Ok(models) => {
                let models: Vec<ModelInfo> = models.into_iter().map(ModelInfo::tagged).collect();
                tracing::debug!(key = %key, count = models.len(), "Fetched model catalog");
                self.store(key, models.clone());
                models
            }
            Err(e) => {
                if let Some(stale) = self.peek(&key) {
                    tracing::warn!(key = %key, error = %e, "Model fetch failed, serving stale catalog");
                    return stale.data;
                }
                tracing::warn!(key = %key, error = %e, "Model fetch failed, serving built-in catalog");
                source
                    .default_models()
                    .into_iter()
                    .map(ModelInfo::tagged)
                    .collect()
            }
        }
    }

    fn store(&self, key: String, data: Vec<ModelInfo>) {
        let timestamp = self.clock.now();
        self.entries().insert(key, CacheEntry { data, timestamp });
    }

    /// Cached listing regardless of age, without touching the network.
    pub fn peek(&self, key: &str) -> Option<CacheEntry<Vec<ModelInfo>>> {
        self.entries().get(key).cloned()
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }
}

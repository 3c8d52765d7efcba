// Provider manager
//
// Owns the adapter registry, the shared model catalog cache, the budget
// planner and the streaming client. Every network-bound operation on the
// active provider is timed and recorded in the telemetry buffer, whether it
// succeeds or fails.

pub mod health;
pub mod telemetry;

pub use health::{HealthDetails, HealthProbe, HealthReport, HealthStatus, HEALTH_WINDOW, MIN_SUCCESS_RATE};
pub use telemetry::{Operation, PerformanceMetric, PerformanceSummary, PerformanceTelemetry};

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::budget::{estimate_conversation_tokens, estimate_tokens, TokenBudgetPlanner};
use crate::catalog::{known_context_window, Capability, ModelCatalogCache, ModelInfo};
use crate::config::{Config, ProviderSettings};
use crate::conversation::Message;
use crate::errors::{ParleyError, Result};
use crate::providers::{create_adapter, ImageResult, ProviderAdapter, ProviderKind, UsageStats};
use crate::streaming::{CancelHandle, CompletionOutcome, StreamingCompletionClient, TextUpdate};

/// Task keywords mapped to the capability they ask for. First match wins.
const TASK_HINTS: &[(&[&str], Capability)] = &[
    (&["image", "picture", "draw"], Capability::ImageGeneration),
    (&["code", "program", "debug"], Capability::Code),
    (&["reason", "analy", "math"], Capability::Reasoning),
    (&["vision", "see", "look at"], Capability::Vision),
    (&["tool", "function"], Capability::ToolUse),
];

pub struct ProviderManager {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    current: Option<ProviderKind>,
    current_model: Option<ModelInfo>,
    catalog: Arc<ModelCatalogCache>,
    telemetry: Mutex<PerformanceTelemetry>,
    client: StreamingCompletionClient,
    planner: TokenBudgetPlanner,
}

impl ProviderManager {
    pub fn new(catalog: Arc<ModelCatalogCache>) -> Result<Self> {
        Ok(Self {
            adapters: HashMap::new(),
            current: None,
            current_model: None,
            catalog,
            telemetry: Mutex::new(PerformanceTelemetry::default()),
            client: StreamingCompletionClient::new()?,
            planner: TokenBudgetPlanner::new(),
        })
    }

    pub fn with_telemetry_capacity(mut self, capacity: usize) -> Self {
        self.telemetry = Mutex::new(PerformanceTelemetry::new(capacity));
        self
    }

    /// Build adapters for every configured provider and activate the
    /// configured one.
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = Arc::new(ModelCatalogCache::new(config.cache.model_ttl()));
        let mut manager = Self::new(catalog.clone())?.with_telemetry_capacity(config.telemetry.max_metrics);

        for entry in &config.providers {
            if manager.adapters.contains_key(&entry.kind()) {
                tracing::warn!(provider = entry.display_name(), "Duplicate provider kind ignored");
                continue;
            }
            manager.register(create_adapter(entry, catalog.clone())?);
        }

        if let Some(kind) = config.active_kind() {
            manager.set_provider(kind.as_str())?;
        }
        if let Some(model) = config.active_entry().and_then(|entry| entry.model()) {
            if let Some(adapter) = manager.current_adapter() {
                manager.current_model = Some(ModelInfo::new(model, adapter.name()).tagged());
            }
        }
        Ok(manager)
    }

    /// Add an adapter to the registry, replacing any adapter of the same
    /// kind. The first adapter registered becomes the active one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> Option<Arc<dyn ProviderAdapter>> {
        let kind = adapter.kind();
        tracing::debug!(provider = adapter.name(), kind = %kind, "Registered provider");
        if self.current.is_none() {
            self.current = Some(kind);
        }
        self.adapters.insert(kind, adapter)
    }

    pub fn registered(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.adapters.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn current_provider(&self) -> Option<ProviderKind> {
        self.current
    }

    pub fn current_model(&self) -> Option<&ModelInfo> {
        self.current_model.as_ref()
    }

    pub fn catalog(&self) -> &Arc<ModelCatalogCache> {
        &self.catalog
    }

    fn current_adapter(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.current.and_then(|kind| self.adapters.get(&kind).cloned())
    }

    pub fn active_adapter(&self) -> Result<Arc<dyn ProviderAdapter>> {
        self.current_adapter()
            .ok_or_else(|| ParleyError::validation("no active provider"))
    }

    /// Switch the active provider. Unknown or unregistered ids are rejected
    /// and leave the current selection untouched.
    pub fn set_provider(&mut self, id: &str) -> Result<()> {
        let kind = ProviderKind::from_str(id)?;
        if !self.adapters.contains_key(&kind) {
            return Err(ParleyError::validation(format!("provider not configured: {}", kind)));
        }
        if self.current != Some(kind) {
            self.current_model = None;
        }
        self.current = Some(kind);
        tracing::info!(provider = %kind, "Active provider set");
        Ok(())
    }

    /// Select a model by id. Ids missing from the catalog are still accepted
    /// (compatible hosts often serve unlisted models) with inferred metadata.
    pub async fn set_model(&mut self, model_id: &str) -> Result<ModelInfo> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(ParleyError::validation("model id is empty"));
        }
        let adapter = self.active_adapter()?;
        let model = adapter
            .list_models()
            .await
            .into_iter()
            .find(|m| m.model_id == model_id)
            .unwrap_or_else(|| ModelInfo::new(model_id, adapter.name()).tagged());
        self.select_model(model.clone());
        Ok(model)
    }

    pub fn select_model(&mut self, model: ModelInfo) {
        tracing::info!(model = %model.model_id, context_window = model.context_window, "Active model set");
        self.current_model = Some(model);
    }

    fn telemetry(&self) -> MutexGuard<'_, PerformanceTelemetry> {
        self.telemetry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn model_label(&self, adapter: &dyn ProviderAdapter) -> String {
        self.current_model
            .as_ref()
            .map(|m| m.model_id.clone())
            .unwrap_or_else(|| adapter.default_model().to_string())
    }

    fn track<T>(
        &self,
        adapter: &dyn ProviderAdapter,
        model_id: &str,
        operation: Operation,
        started: Instant,
        result: &Result<T>,
        tokens: usize,
    ) {
        let duration_ms = started.elapsed().as_millis() as u64;
        let metric = match result {
            Ok(_) => PerformanceMetric::success(adapter.name(), model_id, operation, duration_ms, tokens),
            Err(e) => {
                tracing::warn!(provider = adapter.name(), model = model_id, %operation, error = %e, "Provider call failed");
                PerformanceMetric::failure(adapter.name(), model_id, operation, duration_ms, e.to_string())
                    .with_fatal(e.disables_provider())
            }
        };
        self.telemetry().record(metric);
    }

    /// Budget the conversation, stream a completion from the active provider
    /// and report every delta to `on_update`.
    ///
    /// A cancelled completion returns `Ok` with `StreamState::Cancelled` and
    /// is recorded as a success.
    pub async fn generate_response<F>(
        &self,
        conversation: &[Message],
        settings: &ProviderSettings,
        cancel: CancelHandle,
        on_update: F,
    ) -> Result<CompletionOutcome>
    where
        F: FnMut(TextUpdate<'_>),
    {
        let adapter = self.active_adapter()?;
        let mut settings = settings.clone();
        if settings.model.as_deref().map_or(true, |m| m.trim().is_empty()) {
            settings.model = self.current_model.as_ref().map(|m| m.model_id.clone());
        }
        let model_id = settings
            .model
            .clone()
            .unwrap_or_else(|| adapter.default_model().to_string());

        let started = Instant::now();
        let result = async {
            let context_window = match &self.current_model {
                Some(model) if model.model_id == model_id => model.context_window,
                _ => known_context_window(&model_id),
            };
            let budget = settings
                .max_context_tokens
                .unwrap_or_else(|| context_window.saturating_sub(settings.max_tokens as usize));
            let planned = self.planner.plan(conversation, budget)?;
            let prompt_tokens = estimate_conversation_tokens(&planned);

            tracing::debug!(
                provider = adapter.name(),
                model = %model_id,
                budget,
                prompt_tokens,
                messages = planned.len(),
                "Starting completion"
            );
            let stream = self
                .client
                .open(adapter.as_ref(), &planned, &settings, cancel)
                .await?;
            let outcome = stream.complete(on_update).await?;
            Ok::<_, ParleyError>((outcome, prompt_tokens))
        }
        .await;

        let tokens = match &result {
            Ok((outcome, prompt_tokens)) => prompt_tokens + estimate_tokens(&outcome.text),
            Err(_) => 0,
        };
        self.track(adapter.as_ref(), &model_id, Operation::GenerateResponse, started, &result, tokens);

        let (outcome, _) = result?;
        tracing::info!(
            provider = adapter.name(),
            model = %model_id,
            state = ?outcome.state,
            chars = outcome.text.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Completion finished"
        );
        Ok(outcome)
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<ImageResult> {
        let adapter = self.active_adapter()?;
        let model_id = self.model_label(adapter.as_ref());
        let started = Instant::now();
        let result = adapter.generate_image(prompt).await;
        self.track(adapter.as_ref(), &model_id, Operation::GenerateImage, started, &result, estimate_tokens(prompt));
        result
    }

    /// `Ok(false)` means the provider rejected the credential or could not be
    /// reached; the call itself still counts as completed.
    pub async fn validate_api_key(&self) -> Result<bool> {
        let adapter = self.active_adapter()?;
        let model_id = self.model_label(adapter.as_ref());
        let started = Instant::now();
        let valid = adapter.validate_credential().await;
        let result: Result<bool> = Ok(valid);
        self.track(adapter.as_ref(), &model_id, Operation::ValidateApiKey, started, &result, 0);
        if valid {
            tracing::info!(provider = adapter.name(), "Credential valid");
        } else {
            tracing::warn!(provider = adapter.name(), "Credential invalid");
        }
        result
    }

    pub async fn get_available_models(&self) -> Result<Vec<ModelInfo>> {
        let adapter = self.active_adapter()?;
        let model_id = self.model_label(adapter.as_ref());
        let started = Instant::now();
        let result: Result<Vec<ModelInfo>> = Ok(adapter.list_models().await);
        self.track(adapter.as_ref(), &model_id, Operation::ListModels, started, &result, 0);
        result
    }

    pub async fn get_usage_stats(&self) -> Result<UsageStats> {
        let adapter = self.active_adapter()?;
        let model_id = self.model_label(adapter.as_ref());
        let started = Instant::now();
        let result = adapter.usage_stats().await;
        self.track(adapter.as_ref(), &model_id, Operation::UsageStats, started, &result, 0);
        result
    }

    /// Pick a model for a free-text task description from the active
    /// provider's catalog. `budget` caps input+output price per 1K tokens.
    pub async fn get_recommended_model(&self, task: &str, budget: Option<f64>) -> Result<Option<ModelInfo>> {
        let models = self.get_available_models().await?;
        Ok(recommend_model(&models, task, budget))
    }

    /// Check the active provider. The credential probe made here is not
    /// recorded in telemetry.
    pub async fn health_check(&self) -> HealthReport {
        let adapter = self.current_adapter();
        let mut probe = HealthProbe {
            provider: self.current.map(|kind| kind.to_string()),
            model: adapter.as_ref().map(|a| self.model_label(a.as_ref())),
            registered: adapter.is_some(),
            has_credential: adapter
                .as_ref()
                .map_or(false, |a| !a.credential().trim().is_empty()),
            credential_valid: None,
        };
        if let (Some(adapter), true) = (&adapter, probe.has_credential) {
            probe.credential_valid = Some(adapter.validate_credential().await);
        }

        let report = health::assess(probe, &self.telemetry());
        tracing::info!(status = %report.status, reason = ?report.details.reason, "Health check");
        report
    }

    /// Snapshot of the telemetry buffer, oldest first.
    pub fn metrics(&self) -> Vec<PerformanceMetric> {
        self.telemetry().metrics().cloned().collect()
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        self.telemetry().summary()
    }
}

/// Keyword match on `task`, then the most capable model, then the first one.
/// Models without pricing are never excluded by `budget`.
pub fn recommend_model(models: &[ModelInfo], task: &str, budget: Option<f64>) -> Option<ModelInfo> {
    let task = task.to_lowercase();
    let affordable: Vec<&ModelInfo> = models
        .iter()
        .filter(|m| match (budget, m.pricing) {
            (Some(limit), Some(pricing)) => pricing.combined() <= limit,
            _ => true,
        })
        .collect();

    let wanted = TASK_HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| task.contains(k)))
        .map(|(_, cap)| *cap);

    if let Some(cap) = wanted {
        if let Some(model) = affordable.iter().find(|m| m.has_capability(cap)) {
            return Some((*model).clone());
        }
    }

    // Earliest model wins ties.
    affordable
        .iter()
        .min_by_key(|m| std::cmp::Reverse(m.capabilities.len()))
        .map(|m| (*m).clone())
        .or_else(|| models.first().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSource, Pricing};
    use crate::providers::WireRequest;
    use async_trait::async_trait;

    struct FakeAdapter {
        kind: ProviderKind,
        credential: String,
        valid: bool,
    }

    impl FakeAdapter {
        fn new(kind: ProviderKind, valid: bool) -> Arc<dyn ProviderAdapter> {
            Arc::new(Self {
                kind,
                credential: "key".to_string(),
                valid,
            })
        }
    }

    #[async_trait]
    impl CatalogSource for FakeAdapter {
        fn cache_key(&self) -> String {
            format!("fake:{}", self.kind)
        }

        async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(self.default_models())
        }

        fn default_models(&self) -> Vec<ModelInfo> {
            vec![
                ModelInfo::new("fake-small", self.kind.as_str()),
                ModelInfo::new("fake-coder", self.kind.as_str()).with_capabilities([Capability::Code]),
            ]
        }
    }

    #[async_trait]
    impl ProviderAdapter for FakeAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn name(&self) -> &str {
            self.kind.as_str()
        }

        fn default_model(&self) -> &str {
            "fake-small"
        }

        fn credential(&self) -> &str {
            &self.credential
        }

        fn build_request(&self, _conversation: &[Message], _settings: &ProviderSettings) -> Result<WireRequest> {
            Ok(WireRequest::get("http://127.0.0.1:1/unused"))
        }

        async fn validate_credential(&self) -> bool {
            self.valid
        }

        async fn list_models(&self) -> Vec<ModelInfo> {
            self.default_models()
        }
    }

    fn manager() -> ProviderManager {
        ProviderManager::new(Arc::new(ModelCatalogCache::default())).unwrap()
    }

    #[test]
    fn test_first_registered_provider_is_active() {
        let mut manager = manager();
        assert!(manager.current_provider().is_none());
        manager.register(FakeAdapter::new(ProviderKind::Claude, true));
        manager.register(FakeAdapter::new(ProviderKind::OpenAi, true));
        assert_eq!(manager.current_provider(), Some(ProviderKind::Claude));
        assert_eq!(manager.registered(), vec![ProviderKind::OpenAi, ProviderKind::Claude]);
    }

    #[test]
    fn test_set_provider_rejects_unknown_and_unregistered() {
        let mut manager = manager();
        manager.register(FakeAdapter::new(ProviderKind::OpenAi, true));

        let err = manager.set_provider("bard").unwrap_err();
        assert!(matches!(err, ParleyError::Validation(_)));
        let err = manager.set_provider("anthropic").unwrap_err();
        assert!(err.to_string().contains("not configured"));
        assert_eq!(manager.current_provider(), Some(ProviderKind::OpenAi));
    }

    #[tokio::test]
    async fn test_set_model_uses_catalog_metadata() {
        let mut manager = manager();
        manager.register(FakeAdapter::new(ProviderKind::OpenAi, true));

        let model = manager.set_model("fake-coder").await.unwrap();
        assert!(model.has_capability(Capability::Code));

        let unlisted = manager.set_model("my-finetune").await.unwrap();
        assert_eq!(unlisted.model_id, "my-finetune");
        assert_eq!(manager.current_model().unwrap().model_id, "my-finetune");
        assert!(manager.set_model("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_operations_without_provider_are_validation_errors() {
        let manager = manager();
        assert!(matches!(
            manager.validate_api_key().await.unwrap_err(),
            ParleyError::Validation(_)
        ));
        assert!(manager.metrics().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_image_generation_is_recorded_as_failure() {
        let mut manager = manager();
        manager.register(FakeAdapter::new(ProviderKind::Claude, true));

        let err = manager.generate_image("a lighthouse").await.unwrap_err();
        assert!(matches!(err, ParleyError::CapabilityUnsupported { .. }));

        let metrics = manager.metrics();
        assert_eq!(metrics.len(), 1);
        assert!(!metrics[0].success);
        assert_eq!(metrics[0].operation, Operation::GenerateImage);
        assert!(metrics[0].error.as_deref().unwrap().contains("image generation"));
    }

    #[tokio::test]
    async fn test_validate_and_list_record_successes() {
        let mut manager = manager();
        manager.register(FakeAdapter::new(ProviderKind::OpenAi, false));

        assert!(!manager.validate_api_key().await.unwrap());
        assert_eq!(manager.get_available_models().await.unwrap().len(), 2);

        let summary = manager.performance_summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.successes, 2);
    }

    #[tokio::test]
    async fn test_health_check_states() {
        let manager_without = manager();
        assert_eq!(manager_without.health_check().await.status, HealthStatus::Unhealthy);

        let mut healthy = manager();
        healthy.register(FakeAdapter::new(ProviderKind::OpenAi, true));
        assert_eq!(healthy.health_check().await.status, HealthStatus::Healthy);

        let mut degraded = manager();
        degraded.register(FakeAdapter::new(ProviderKind::OpenAi, false));
        let report = degraded.health_check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.details.credential_valid, Some(false));
        // The probe itself is not recorded.
        assert!(degraded.metrics().is_empty());
    }

    #[tokio::test]
    async fn test_health_degrades_on_low_success_rate() {
        let mut manager = manager();
        manager.register(FakeAdapter::new(ProviderKind::Gateway, true));
        for _ in 0..3 {
            let _ = manager.generate_image("x").await;
        }
        for _ in 0..7 {
            manager.validate_api_key().await.unwrap();
        }
        let report = manager.health_check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.details.metrics_considered, 10);
    }

    #[test]
    fn test_recommend_by_keyword() {
        let models = vec![
            ModelInfo::new("gpt-4o", "openai").tagged(),
            ModelInfo::new("o3-mini", "openai").tagged(),
            ModelInfo::new("dall-e-3", "openai").tagged(),
        ];
        assert_eq!(recommend_model(&models, "Draw an image of a fox", None).unwrap().model_id, "dall-e-3");
        assert_eq!(recommend_model(&models, "Analyze this proof", None).unwrap().model_id, "o3-mini");
    }

    #[test]
    fn test_recommend_falls_back_to_most_capable_then_first() {
        let plain = ModelInfo::new("plain", "x");
        let rich = ModelInfo::new("rich", "x").with_capabilities([Capability::Vision, Capability::ToolUse]);
        let models = vec![plain.clone(), rich.clone()];
        assert_eq!(recommend_model(&models, "write a haiku", None).unwrap().model_id, "rich");

        let bare = vec![ModelInfo::new("a", "x"), ModelInfo::new("b", "x")];
        assert_eq!(recommend_model(&bare, "write a haiku", None).unwrap().model_id, "a");
        assert!(recommend_model(&[], "anything", None).is_none());
    }

    #[test]
    fn test_recommend_respects_budget() {
        let cheap = ModelInfo::new("cheap", "x")
            .with_capabilities([Capability::Code])
            .with_pricing(Pricing { input: 0.0005, output: 0.0015 });
        let pricey = ModelInfo::new("pricey", "x")
            .with_capabilities([Capability::Code, Capability::Reasoning])
            .with_pricing(Pricing { input: 0.015, output: 0.06 });
        let models = vec![pricey, cheap];
        assert_eq!(recommend_model(&models, "code review", Some(0.01)).unwrap().model_id, "cheap");
        assert_eq!(recommend_model(&models, "code review", None).unwrap().model_id, "pricey");
    }
}

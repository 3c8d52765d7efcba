// Performance telemetry
//
// Bounded ring buffer of per-call metrics. The oldest metric is evicted once
// the buffer is full.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

pub const DEFAULT_MAX_METRICS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GenerateResponse,
    GenerateImage,
    ValidateApiKey,
    ListModels,
    UsageStats,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateResponse => "generate_response",
            Self::GenerateImage => "generate_image",
            Self::ValidateApiKey => "validate_api_key",
            Self::ListModels => "list_models",
            Self::UsageStats => "usage_stats",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model_id: String,
    pub operation: Operation,
    pub duration_ms: u64,
    /// Estimated prompt + response tokens
    pub tokens: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The failure cannot clear without a configuration change
    #[serde(default)]
    pub fatal: bool,
}

impl PerformanceMetric {
    pub fn success(
        provider: impl Into<String>,
        model_id: impl Into<String>,
        operation: Operation,
        duration_ms: u64,
        tokens: usize,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.into(),
            model_id: model_id.into(),
            operation,
            duration_ms,
            tokens,
            success: true,
            error: None,
            fatal: false,
        }
    }

    pub fn failure(
        provider: impl Into<String>,
        model_id: impl Into<String>,
        operation: Operation,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success(provider, model_id, operation, duration_ms, 0)
        }
    }

    pub fn with_fatal(mut self, fatal: bool) -> Self {
        self.fatal = !self.success && fatal;
        self
    }
}

/// Aggregate view over the whole buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub success_rate: Option<f64>,
    pub avg_duration_ms: Option<f64>,
    pub total_tokens: usize,
    pub calls_per_model: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct PerformanceTelemetry {
    capacity: usize,
    metrics: VecDeque<PerformanceMetric>,
}

impl Default for PerformanceTelemetry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_METRICS)
    }
}

impl PerformanceTelemetry {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            metrics: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&mut self, metric: PerformanceMetric) {
        if self.metrics.len() == self.capacity {
            self.metrics.pop_front();
        }
        self.metrics.push_back(metric);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn clear(&mut self) {
        self.metrics.clear();
    }

    /// Oldest first.
    pub fn metrics(&self) -> impl Iterator<Item = &PerformanceMetric> {
        self.metrics.iter()
    }

    /// The newest `n` metrics, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &PerformanceMetric> {
        self.metrics.iter().skip(self.metrics.len().saturating_sub(n))
    }

    /// Success rate over the newest `n` metrics, with the count considered.
    /// `None` when nothing has been recorded.
    pub fn success_rate(&self, n: usize) -> Option<(f64, usize)> {
        let (count, ok) = self
            .recent(n)
            .fold((0usize, 0usize), |(count, ok), m| (count + 1, ok + m.success as usize));
        if count == 0 {
            return None;
        }
        Some((ok as f64 / count as f64, count))
    }

    pub fn last_error(&self) -> Option<&str> {
        self.metrics
            .iter()
            .rev()
            .find_map(|m| m.error.as_deref())
    }

    /// The newest metric, when it is a fatal failure.
    pub fn fatal_failure(&self) -> Option<&PerformanceMetric> {
        self.metrics.back().filter(|m| m.fatal)
    }

    pub fn summary(&self) -> PerformanceSummary {
        let total = self.metrics.len();
        if total == 0 {
            return PerformanceSummary::default();
        }
        let successes = self.metrics.iter().filter(|m| m.success).count();
        let duration: u64 = self.metrics.iter().map(|m| m.duration_ms).sum();
        let mut calls_per_model = BTreeMap::new();
        for metric in &self.metrics {
            *calls_per_model.entry(metric.model_id.clone()).or_insert(0) += 1;
        }
        PerformanceSummary {
            total,
            successes,
            failures: total - successes,
            success_rate: Some(successes as f64 / total as f64),
            avg_duration_ms: Some(duration as f64 / total as f64),
            total_tokens: self.metrics.iter().map(|m| m.tokens).sum(),
            calls_per_model,
        }
    }
}

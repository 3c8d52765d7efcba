// Provider health assessment

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::telemetry::PerformanceTelemetry;

/// Number of most recent metrics the success rate is computed over.
pub const HEALTH_WINDOW: usize = 10;

/// Below this success rate the provider is reported as degraded.
pub const MIN_SUCCESS_RATE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// What the manager knows about the active provider at check time.
#[derive(Debug, Clone, Default)]
pub struct HealthProbe {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub registered: bool,
    pub has_credential: bool,
    /// `None` when validation was not attempted
    pub credential_valid: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub credential_valid: Option<bool>,
    /// Metrics the success rate was computed over
    pub metrics_considered: usize,
    pub total_metrics: usize,
    pub success_rate: Option<f64>,
    pub last_error: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub details: HealthDetails,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

pub fn assess(probe: HealthProbe, telemetry: &PerformanceTelemetry) -> HealthReport {
    let rate = telemetry.success_rate(HEALTH_WINDOW);

    let (status, reason) = if probe.provider.is_none() {
        (HealthStatus::Unhealthy, Some("no provider configured".to_string()))
    } else if !probe.registered {
        (HealthStatus::Unhealthy, Some("provider is not registered".to_string()))
    } else if !probe.has_credential {
        (HealthStatus::Unhealthy, Some("provider has no credential".to_string()))
    } else if let Some(metric) = telemetry.fatal_failure() {
        (
            HealthStatus::Unhealthy,
            Some(format!("last {} failed fatally", metric.operation)),
        )
    } else if probe.credential_valid == Some(false) {
        (HealthStatus::Degraded, Some("credential validation failed".to_string()))
    } else if let Some((rate, count)) = rate.filter(|(rate, _)| *rate < MIN_SUCCESS_RATE) {
        (
            HealthStatus::Degraded,
            Some(format!(
                "success rate {:.0}% over last {} calls",
                rate * 100.0,
                count
            )),
        )
    } else {
        (HealthStatus::Healthy, None)
    };

    HealthReport {
        status,
        details: HealthDetails {
            provider: probe.provider,
            model: probe.model,
            credential_valid: probe.credential_valid,
            metrics_considered: rate.map(|(_, count)| count).unwrap_or(0),
            total_metrics: telemetry.len(),
            success_rate: rate.map(|(rate, _)| rate),
            last_error: telemetry.last_error().map(str::to_string),
            reason,
        },
        checked_at: Utc::now(),
    }
}

// Error taxonomy for the completion engine
//
// Every fallible core operation returns `parley::Result<T>`. Cancellation is
// not an error: a cancelled completion resolves to an outcome
// (see `streaming::StreamState::Cancelled`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParleyError {
    /// Caller supplied something the engine cannot work with
    /// (empty conversation, unknown provider id, no active provider).
    #[error("validation error: {0}")]
    Validation(String),

    /// Non-2xx HTTP status or a transport failure. `status` is `None` when the
    /// request never produced a response.
    #[error("network error{}: {message}", status_suffix(.status))]
    Network { status: Option<u16>, message: String },

    /// 2xx response whose payload carries an error field.
    #[error("provider error: {0}")]
    Provider(String),

    /// Malformed SSE frame or JSON payload.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("{provider} does not support {capability}")]
    CapabilityUnsupported {
        provider: String,
        capability: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl ParleyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unsupported(provider: impl Into<String>, capability: &'static str) -> Self {
        Self::CapabilityUnsupported {
            provider: provider.into(),
            capability,
        }
    }

    /// HTTP status attached to a network error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Failures that retrying with the same configuration cannot fix.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::CapabilityUnsupported { .. } => true,
            Self::Network {
                status: Some(401 | 403),
                ..
            } => true,
            _ => false,
        }
    }

    /// Fatal failures that come from the provider or its configuration rather
    /// than from one bad call: rejected credentials and bad config.
    pub fn disables_provider(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Network { .. } => self.is_fatal(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ParleyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_display_includes_status() {
        let err = ParleyError::Network {
            status: Some(429),
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "network error (HTTP 429): rate limited");
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_network_error_display_without_status() {
        let err = ParleyError::Network {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ParleyError::validation("empty").is_fatal());
        assert!(ParleyError::Network {
            status: Some(401),
            message: String::new()
        }
        .is_fatal());
        assert!(!ParleyError::Network {
            status: Some(503),
            message: String::new()
        }
        .is_fatal());
        assert!(!ParleyError::Provider("overloaded".to_string()).is_fatal());
    }

    #[test]
    fn test_only_auth_and_config_disable_provider() {
        let forbidden = ParleyError::Network {
            status: Some(403),
            message: String::new(),
        };
        assert!(forbidden.disables_provider());
        assert!(ParleyError::Config("bad endpoint".to_string()).disables_provider());
        assert!(!ParleyError::validation("empty").disables_provider());
        assert!(!ParleyError::unsupported("openai", "usage stats").disables_provider());
    }

    #[test]
    fn test_json_error_maps_to_parse() {
        let err: ParleyError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, ParleyError::Parse(_)));
    }
}

// Parley - streaming chat completions across multiple AI providers
// Library exports

// Core modules
pub mod budget;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod logging;
pub mod manager;
pub mod providers;
pub mod streaming;

pub use budget::TokenBudgetPlanner;
pub use catalog::{Capability, ModelCatalogCache, ModelInfo, Pricing};
pub use config::{Config, ProviderEntry, ProviderSettings};
pub use conversation::{Message, Role};
pub use errors::{ParleyError, Result};
pub use manager::{HealthReport, HealthStatus, ProviderManager};
pub use providers::{create_adapter, ProviderAdapter, ProviderKind};
pub use streaming::{
    CancelHandle, CompletionOutcome, CompletionStream, StreamEvent, StreamState,
    StreamingCompletionClient, TextUpdate,
};

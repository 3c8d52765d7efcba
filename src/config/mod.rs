// Configuration module
// Public interface for configuration loading

mod loader;
mod provider;
mod settings;

pub use loader::{config_from_env_vars, config_path, load_config, load_config_from, CONFIG_PATH_ENV};
pub use provider::ProviderEntry;
pub use settings::{CacheConfig, Config, ProviderSettings, TelemetryConfig};

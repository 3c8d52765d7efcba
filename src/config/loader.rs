// Configuration loader
// Loads providers from ~/.parley/config.toml or environment variables

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::provider::ProviderEntry;
use super::settings::Config;

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PARLEY_CONFIG";

pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".parley/config.toml"))
}

/// Load configuration from the config file, or from provider environment
/// variables when no file exists.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if path.exists() {
        return load_config_from(&path);
    }

    let config = config_from_env_vars(|key| std::env::var(key).ok());
    if config.providers.is_empty() {
        bail!(
            "No configuration found.\n\n\
            Create {} with at least one provider:\n\n  \
            [[providers]]\n  \
            type = \"openai\"\n  \
            api_key = \"sk-...\"\n\n\
            Alternatively, set one of OPENAI_API_KEY, ANTHROPIC_API_KEY,\n\
            OPENROUTER_API_KEY, or AZURE_OPENAI_API_KEY with\n\
            AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_DEPLOYMENT.",
            path.display()
        );
    }
    tracing::debug!(providers = config.providers.len(), "Loaded providers from environment");
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

    if config.providers.is_empty() {
        bail!(
            "{} has no [[providers]] entries. Add at least one provider.",
            path.display()
        );
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    tracing::debug!(path = %path.display(), providers = config.providers.len(), "Loaded configuration");
    Ok(config)
}

/// Build a config from well-known provider variables. `lookup` is injected so
/// tests don't depend on the process environment.
pub fn config_from_env_vars<F>(lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let mut providers = Vec::new();

    if let Some(api_key) = var("OPENAI_API_KEY") {
        providers.push(ProviderEntry::Openai {
            api_key,
            api_host: None,
            model: None,
            name: None,
        });
    }
    if let Some(api_key) = var("ANTHROPIC_API_KEY") {
        providers.push(ProviderEntry::Claude {
            api_key,
            api_host: None,
            model: None,
            name: None,
        });
    }
    if let Some(api_key) = var("OPENROUTER_API_KEY") {
        providers.push(ProviderEntry::Gateway {
            api_key,
            api_host: None,
            model: None,
            name: None,
        });
    }
    if let (Some(api_key), Some(endpoint), Some(deployment)) = (
        var("AZURE_OPENAI_API_KEY"),
        var("AZURE_OPENAI_ENDPOINT"),
        var("AZURE_OPENAI_DEPLOYMENT"),
    ) {
        providers.push(ProviderEntry::Azure {
            api_key,
            endpoint,
            deployment,
            api_version: None,
            name: None,
        });
    }

    Config::with_providers(providers)
}

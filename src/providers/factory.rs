// Provider factory
//
// Creates adapters from configuration entries

use std::sync::Arc;

use super::{AzureAdapter, ClaudeAdapter, GatewayAdapter, OpenAiAdapter, ProviderAdapter};
use crate::catalog::ModelCatalogCache;
use crate::config::ProviderEntry;
use crate::errors::Result;

/// Create an adapter for `entry`, sharing `catalog` with every other adapter
/// the caller builds.
pub fn create_adapter(
    entry: &ProviderEntry,
    catalog: Arc<ModelCatalogCache>,
) -> Result<Arc<dyn ProviderAdapter>> {
    let name = entry.display_name().to_string();
    match entry {
        ProviderEntry::Openai {
            api_key,
            api_host,
            model,
            ..
        } => {
            let host = api_host.as_deref().unwrap_or(super::openai::OPENAI_API_HOST);
            let mut adapter = OpenAiAdapter::compatible(name, host, api_key.clone(), catalog)?;
            if let Some(m) = model {
                adapter = adapter.with_model(m.clone());
            }
            Ok(Arc::new(adapter))
        }

        ProviderEntry::Azure {
            api_key,
            endpoint,
            deployment,
            api_version,
            ..
        } => {
            let mut adapter =
                AzureAdapter::new(api_key.clone(), endpoint, deployment.clone(), catalog)?.with_name(name);
            if let Some(version) = api_version {
                adapter = adapter.with_api_version(version.clone());
            }
            Ok(Arc::new(adapter))
        }

        ProviderEntry::Claude {
            api_key,
            api_host,
            model,
            ..
        } => {
            let mut adapter = ClaudeAdapter::new(api_key.clone(), catalog)?.with_name(name);
            if let Some(host) = api_host {
                adapter = adapter.with_host(host);
            }
            if let Some(m) = model {
                adapter = adapter.with_model(m.clone());
            }
            Ok(Arc::new(adapter))
        }

        ProviderEntry::Gateway {
            api_key,
            api_host,
            model,
            ..
        } => {
            let mut adapter = GatewayAdapter::new(api_key.clone(), catalog)?.with_name(name);
            if let Some(host) = api_host {
                adapter = adapter.with_host(host);
            }
            if let Some(m) = model {
                adapter = adapter.with_model(m.clone());
            }
            Ok(Arc::new(adapter))
        }
    }
}

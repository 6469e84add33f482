//! Resolves the wire-level `{ providerId, key }` selector into a concrete
//! `Arc<dyn ChatProvider>`. Grounded on the teacher's `PluginRegistry` +
//! `build_provider` (a named provider id looked up in a config file, its API
//! key read from a provider-specific environment variable) collapsed down to
//! the single OpenAI-compatible adapter this crate carries.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chorus_core::providers::OpenAiCompatibleProvider;
use chorus_core::ChatProvider;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ProviderResolveError {
    #[error("unknown provider id: {0}")]
    UnknownProvider(String),
    #[error("provider {0} has no API key set in ${1}")]
    MissingApiKey(String, String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub base_url: Url,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderCatalogFile {
    #[serde(default)]
    pub provider: Vec<ProviderEntry>,
}

/// Server-side registry of reachable providers, keyed by the `providerId`
/// a request selects. Holds endpoints only; credentials are read from the
/// environment at resolution time so they never sit in the config file.
pub struct ProviderCatalog {
    entries: HashMap<String, ProviderEntry>,
}

impl ProviderCatalog {
    pub fn load(toml_path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match toml_path {
            Some(path) if path.exists() => toml::from_str(&std::fs::read_to_string(path)?)?,
            _ => ProviderCatalogFile::default(),
        };
        let entries = file.provider.into_iter().map(|p| (p.id.clone(), p)).collect();
        Ok(Self { entries })
    }

    pub fn resolve(&self, provider_id: &str, model_key: &str) -> Result<Arc<dyn ChatProvider>, ProviderResolveError> {
        let entry = self
            .entries
            .get(provider_id)
            .ok_or_else(|| ProviderResolveError::UnknownProvider(provider_id.to_string()))?;
        let api_key = std::env::var(&entry.api_key_env)
            .map_err(|_| ProviderResolveError::MissingApiKey(provider_id.to_string(), entry.api_key_env.clone()))?;
        Ok(Arc::new(OpenAiCompatibleProvider::new(entry.base_url.clone(), api_key, model_key.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let catalog = ProviderCatalog { entries: HashMap::new() };
        let err = match catalog.resolve("openai", "gpt-4o-mini") {
            Err(e) => e,
            Ok(_) => panic!("expected resolve to fail"),
        };
        assert!(matches!(err, ProviderResolveError::UnknownProvider(id) if id == "openai"));
    }

    #[test]
    fn missing_env_var_is_reported() {
        let mut entries = HashMap::new();
        entries.insert(
            "openai".to_string(),
            ProviderEntry {
                id: "openai".to_string(),
                base_url: Url::parse("https://api.openai.com/v1/").unwrap(),
                api_key_env: "CHORUS_TEST_UNSET_KEY_XYZ".to_string(),
            },
        );
        let catalog = ProviderCatalog { entries };
        let err = match catalog.resolve("openai", "gpt-4o-mini") {
            Err(e) => e,
            Ok(_) => panic!("expected resolve to fail"),
        };
        assert!(matches!(err, ProviderResolveError::MissingApiKey(..)));
    }
}

//! The registry of named provider adapters and model configs.

use crate::api::ModelConfig;
use crate::error::{GatewayError, Result};
use crate::traits::ProviderAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds registered [`ProviderAdapter`]s and [`ModelConfig`]s, keyed by name
/// and id for O(1) resolution.
///
/// Registration is atomic with respect to concurrent resolves: the duplicate
/// check and the insert happen inside one write-lock critical section, so no
/// caller can ever observe a partially-registered entry.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
    models: RwLock<HashMap<String, ModelConfig>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider adapter under its [`name`](ProviderAdapter::name).
    pub async fn register(&self, adapter: Arc<dyn ProviderAdapter>) -> Result<()> {
        let name = adapter.name().to_string();
        let mut providers = self.providers.write().await;
        if providers.contains_key(&name) {
            return Err(GatewayError::DuplicateProvider(name));
        }
        tracing::info!(provider = %name, "Registered provider");
        providers.insert(name, adapter);
        Ok(())
    }

    /// Register a model config.
    ///
    /// Fails fast when the owning provider (or any fallback provider) is
    /// unknown or does not advertise the model's output modality: a
    /// misconfigured catalog is rejected here rather than at request time.
    pub async fn register_model(&self, config: ModelConfig) -> Result<()> {
        config.validate()?;

        let modality = config.category.modality();
        {
            let providers = self.providers.read().await;
            for provider in std::iter::once(&config.provider).chain(config.fallback.iter()) {
                let Some(adapter) = providers.get(provider) else {
                    return Err(GatewayError::ProviderNotFound(provider.clone()));
                };
                if !adapter.capabilities().supports(modality) {
                    return Err(GatewayError::CapabilityMismatch(format!(
                        "Provider '{}' does not support {} output required by model '{}'",
                        provider, modality, config.id
                    )));
                }
            }
        }

        let mut models = self.models.write().await;
        if models.contains_key(&config.id) {
            return Err(GatewayError::DuplicateModel(config.id));
        }
        tracing::info!(model = %config.id, provider = %config.provider, category = %config.category, "Registered model");
        models.insert(config.id.clone(), config);
        Ok(())
    }

    /// Resolve a provider adapter by name.
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>> {
        let providers = self.providers.read().await;
        providers
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::ProviderNotFound(name.to_string()))
    }

    /// Resolve a model config by id.
    pub async fn resolve_model(&self, id: &str) -> Result<ModelConfig> {
        let models = self.models.read().await;
        models
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::ModelNotFound(id.to_string()))
    }

    /// Check if a provider name is registered.
    pub async fn contains_provider(&self, name: &str) -> bool {
        self.providers.read().await.contains_key(name)
    }

    /// Check if a model id is registered.
    pub async fn contains_model(&self, id: &str) -> bool {
        self.models.read().await.contains_key(id)
    }

    /// Names of all registered providers, in arbitrary order.
    pub async fn provider_names(&self) -> Vec<String> {
        self.providers.read().await.keys().cloned().collect()
    }
}

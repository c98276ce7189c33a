//! The capability contract every provider adapter must satisfy.

use crate::api::Modality;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Advertised capabilities of a [`ProviderAdapter`].
#[derive(Debug, Clone)]
pub struct ProviderCapabilities {
    /// The set of output [`Modality`] variants this provider can produce.
    pub modalities: Vec<Modality>,
}

impl ProviderCapabilities {
    /// Whether the provider advertises `modality`.
    pub fn supports(&self, modality: Modality) -> bool {
        self.modalities.contains(&modality)
    }
}

/// Health status reported by a provider.
#[derive(Debug, Clone)]
pub enum ProviderHealth {
    /// The provider is fully operational.
    Healthy,
    /// The provider is operational but experiencing partial issues.
    Degraded(String),
    /// The provider cannot serve requests.
    Unhealthy(String),
}

/// A pluggable backend that speaks one AI service's actual wire protocol.
///
/// Adapters are registered with
/// [`GatewayBuilder::register_provider`](crate::gateway::GatewayBuilder::register_provider)
/// and are identified by their [`name`](ProviderAdapter::name). The gateway
/// never inspects credentials or protocol details; those live entirely
/// inside the adapter, and the `extra` parameter map is passed through
/// opaquely.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Unique name for this provider (e.g. `"replicate"`, `"openai"`).
    fn name(&self) -> &'static str;

    /// Return the set of output modalities this provider supports.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Report the current health of this provider.
    async fn health(&self) -> ProviderHealth;

    /// Generate an image for `prompt` with the given `model`.
    ///
    /// `extra` carries validated model parameters beyond the dimensions,
    /// opaque to the gateway.
    async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        width: Option<u32>,
        height: Option<u32>,
        extra: &serde_json::Value,
    ) -> Result<Artifact>;

    /// Generate text for `prompt` with the given `model`.
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: Option<u32>,
        extra: &serde_json::Value,
    ) -> Result<Artifact>;
}

/// The raw output of a single generation, before the gateway attaches
/// timing, cost, and cache metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Reference to a hosted artifact (images, video, audio).
    Url(String),
    /// Inline generated text.
    Text(String),
}

impl Artifact {
    /// The artifact URL, if this is a [`Url`](Self::Url) artifact.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Text(_) => None,
        }
    }

    /// The generated text, if this is a [`Text`](Self::Text) artifact.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Url(_) => None,
        }
    }
}

/// The outcome of a successful generation or cache hit.
///
/// Produced once and never mutated. `credits_spent` always equals the cost
/// computed for the original generation; cache hits return the original
/// cost, never a recomputed one.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// The generated artifact.
    pub artifact: Artifact,
    /// Wall-clock duration of the underlying provider call. Zero-cost cache
    /// hits keep the original generation's duration.
    pub generation_time: Duration,
    /// Credits charged for the original generation.
    pub credits_spent: f64,
    /// Id of the model that produced the artifact.
    pub model: String,
    /// Name of the provider that produced the artifact (the one that
    /// succeeded, when a fallback chain advanced past earlier providers).
    pub provider: String,
    /// `true` when this result was served from the cache.
    pub from_cache: bool,
}

//! Synchronous facade over the async gateway.
//!
//! There is one concurrency-correct core; this facade owns a tokio runtime
//! and blocks on the same scheduled operations rather than maintaining a
//! parallel synchronous implementation.

use crate::api::{GenerationRequest, ModelConfig};
use crate::error::{GatewayError, Result};
use crate::gateway::{GatewayBuilder, GenerationGateway};
use crate::traits::{GenerationResult, ProviderHealth};
use std::sync::Arc;

/// Blocking wrapper around a [`GenerationGateway`].
///
/// Must not be used from inside an async context: every method calls
/// `block_on` on the owned runtime.
pub struct BlockingGateway {
    runtime: tokio::runtime::Runtime,
    inner: Arc<GenerationGateway>,
}

impl BlockingGateway {
    /// Build the configured gateway on a freshly created multi-thread
    /// runtime.
    pub fn new(builder: GatewayBuilder) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to start runtime: {}", e)))?;
        let inner = runtime.block_on(builder.build())?;
        Ok(Self { runtime, inner })
    }

    /// The underlying async gateway, for mixed sync/async deployments.
    pub fn inner(&self) -> &Arc<GenerationGateway> {
        &self.inner
    }

    /// Blocking [`GenerationGateway::generate`].
    pub fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        self.runtime.block_on(self.inner.generate(request))
    }

    /// Blocking [`GenerationGateway::generate_batch`].
    pub fn generate_batch(
        &self,
        requests: Vec<GenerationRequest>,
    ) -> Vec<Result<GenerationResult>> {
        self.runtime.block_on(self.inner.generate_batch(requests))
    }

    /// Blocking [`GenerationGateway::cost_estimate`].
    pub fn cost_estimate(&self, request: &GenerationRequest) -> Result<f64> {
        self.runtime.block_on(self.inner.cost_estimate(request))
    }

    /// Blocking [`GenerationGateway::register_model`].
    pub fn register_model(&self, config: ModelConfig) -> Result<()> {
        self.runtime.block_on(self.inner.register_model(config))
    }

    /// Blocking [`GenerationGateway::provider_health`].
    pub fn provider_health(&self, name: &str) -> Result<ProviderHealth> {
        self.runtime.block_on(self.inner.provider_health(name))
    }
}

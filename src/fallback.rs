//! Ordered fallback across rate-limited provider routes.
//!
//! A chain attempts providers strictly in list order. Availability failures
//! (provider errors, rate limits, timeouts) advance to the next route;
//! caller and configuration errors propagate immediately, since switching
//! providers cannot fix them. The chain is stateless across calls: no memory
//! of prior failures influences future ordering.

use crate::api::{Modality, ModelConfig};
use crate::error::{GatewayError, Result};
use crate::limiter::RateLimiter;
use crate::traits::{Artifact, ProviderAdapter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One attemptable provider: the adapter plus its admission limiter.
#[derive(Clone)]
pub struct ProviderRoute {
    /// Provider name (the adapter's registered name).
    pub name: String,
    /// The adapter that speaks this provider's protocol.
    pub adapter: Arc<dyn ProviderAdapter>,
    /// This provider's independent rate limiter.
    pub limiter: Arc<RateLimiter>,
}

/// An ordered, non-empty sequence of provider routes.
pub struct FallbackChain {
    routes: Vec<ProviderRoute>,
}

impl FallbackChain {
    /// Build a chain from routes in attempt order.
    pub fn new(routes: Vec<ProviderRoute>) -> Result<Self> {
        if routes.is_empty() {
            return Err(GatewayError::Config(
                "Fallback chain cannot be empty".to_string(),
            ));
        }
        Ok(Self { routes })
    }

    /// The routes in attempt order.
    pub fn routes(&self) -> &[ProviderRoute] {
        &self.routes
    }

    /// Attempt the generation against each route in order.
    ///
    /// Each attempt is limiter admission followed by the adapter call, the
    /// whole attempt bounded by `timeout` (covering any rate-limit blocking
    /// as well as the network call). Returns the succeeding provider's name,
    /// the artifact, and the attempt's wall-clock duration.
    pub async fn generate(
        &self,
        config: &ModelConfig,
        prompt: &str,
        params: &BTreeMap<String, Value>,
        timeout: Duration,
    ) -> Result<(String, Artifact, Duration)> {
        let mut failures: Vec<(String, GatewayError)> = Vec::new();

        for route in &self.routes {
            let start = Instant::now();
            let attempt = async {
                route.limiter.acquire().await?;
                dispatch(route.adapter.as_ref(), config, prompt, params).await
            };

            let result = match tokio::time::timeout(timeout, attempt).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout),
            };
            let elapsed = start.elapsed();

            let status = if result.is_ok() { "success" } else { "failure" };
            metrics::counter!(
                "generation.attempts.total",
                "provider" => route.name.clone(),
                "model" => config.id.clone(),
                "status" => status
            )
            .increment(1);

            match result {
                Ok(artifact) => {
                    return Ok((route.name.clone(), artifact, elapsed));
                }
                Err(e) if e.is_fallback_eligible() => {
                    tracing::warn!(
                        provider = %route.name,
                        model = %config.id,
                        error = %e,
                        "Provider attempt failed; advancing to next provider"
                    );
                    failures.push((route.name.clone(), e));
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(
            model = %config.id,
            attempts = failures.len(),
            "All providers exhausted"
        );
        Err(GatewayError::AllProvidersExhausted { failures })
    }
}

/// Route a generation to the adapter operation matching the model's
/// category.
///
/// The `width`/`height`/`max_tokens` parameters travel as explicit
/// arguments; everything else rides in the opaque `extra` map. Video and
/// audio categories have no operation in the adapter contract yet, so they
/// fail with a capability mismatch.
async fn dispatch(
    adapter: &dyn ProviderAdapter,
    config: &ModelConfig,
    prompt: &str,
    params: &BTreeMap<String, Value>,
) -> Result<Artifact> {
    let modality = config.category.modality();
    if !adapter.capabilities().supports(modality) {
        return Err(GatewayError::CapabilityMismatch(format!(
            "Provider '{}' does not support {} output",
            adapter.name(),
            modality
        )));
    }

    match modality {
        Modality::Image => {
            let width = param_u32(params, "width");
            let height = param_u32(params, "height");
            let extra = extra_params(params, &["width", "height"]);
            adapter
                .generate_image(&config.id, prompt, width, height, &extra)
                .await
        }
        Modality::Text => {
            let max_tokens = param_u32(params, "max_tokens");
            let extra = extra_params(params, &["max_tokens"]);
            adapter
                .generate_text(&config.id, prompt, max_tokens, &extra)
                .await
        }
        Modality::Video | Modality::Audio => Err(GatewayError::CapabilityMismatch(format!(
            "No generation operation for {} output",
            modality
        ))),
    }
}

fn param_u32(params: &BTreeMap<String, Value>, name: &str) -> Option<u32> {
    params
        .get(name)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
}

fn extra_params(params: &BTreeMap<String, Value>, exclude: &[&str]) -> Value {
    let map: serde_json::Map<String, Value> = params
        .iter()
        .filter(|(name, _)| !exclude.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    Value::Object(map)
}

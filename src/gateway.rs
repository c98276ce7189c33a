//! The central gateway that owns providers, the model catalog, and the
//! resilience pipeline.

use crate::api::{CacheKey, GenerationRequest, ModelConfig, RateLimitPolicy};
use crate::batch::BatchDispatcher;
use crate::cache::{CacheStore, ResultCache};
use crate::cost;
use crate::error::{GatewayError, Result};
use crate::fallback::{FallbackChain, ProviderRoute};
use crate::limiter::RateLimiter;
use crate::registry::ProviderRegistry;
use crate::traits::{GenerationResult, ProviderAdapter, ProviderHealth};
use crate::validation::normalize_request;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Default per-generation timeout applied when neither the request nor the
/// model config overrides it.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default cache TTL in seconds.
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default batch concurrency bound.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Balance seam consulted before any generation call is issued.
///
/// The gateway reserves the computed credit cost up front; a failed
/// reservation surfaces as [`GatewayError::InsufficientCredits`] without any
/// provider being contacted, and is never retried against alternate
/// providers. The default ledger is unlimited.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Reserve `credits` for an imminent generation, debiting the balance.
    async fn reserve(&self, credits: f64) -> Result<()>;
}

/// Ledger that admits every reservation.
#[derive(Debug, Default)]
pub struct UnlimitedLedger;

#[async_trait]
impl CreditLedger for UnlimitedLedger {
    async fn reserve(&self, _credits: f64) -> Result<()> {
        Ok(())
    }
}

/// Ledger backed by a fixed starting balance, debited per reservation.
pub struct CreditBalance {
    available: Mutex<f64>,
}

impl CreditBalance {
    /// Ledger starting with `credits` available.
    pub fn new(credits: f64) -> Self {
        Self {
            available: Mutex::new(credits),
        }
    }

    /// Credits currently available.
    pub async fn available(&self) -> f64 {
        *self.available.lock().await
    }
}

#[async_trait]
impl CreditLedger for CreditBalance {
    async fn reserve(&self, credits: f64) -> Result<()> {
        let mut available = self.available.lock().await;
        if *available < credits {
            return Err(GatewayError::InsufficientCredits {
                required: credits,
                available: *available,
            });
        }
        *available -= credits;
        Ok(())
    }
}

/// The central gateway: request routing, per-provider rate limiting, ordered
/// fallback, result caching, bounded batch dispatch, and deterministic cost
/// accounting behind one `generate` call.
///
/// Obtain an instance via [`GenerationGateway::builder()`]. Providers and
/// their rate limiters are fixed at build time; models may also be
/// registered later with [`register_model`](Self::register_model).
pub struct GenerationGateway {
    registry: ProviderRegistry,
    cache: ResultCache,
    limiters: HashMap<String, Arc<RateLimiter>>,
    ledger: Arc<dyn CreditLedger>,
    dispatcher: BatchDispatcher,
    request_timeout: Duration,
}

impl GenerationGateway {
    /// Create a new [`GatewayBuilder`] for configuring and constructing a
    /// gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Register a model at runtime. Its provider (and any fallback
    /// providers) must already be registered.
    pub async fn register_model(&self, config: ModelConfig) -> Result<()> {
        self.registry.register_model(config).await
    }

    /// Check if a model id is registered.
    pub async fn contains_model(&self, id: &str) -> bool {
        self.registry.contains_model(id).await
    }

    /// Report the health of a registered provider.
    pub async fn provider_health(&self, name: &str) -> Result<ProviderHealth> {
        let adapter = self.registry.resolve(name).await?;
        Ok(adapter.health().await)
    }

    /// Compute the credit cost of `request` without issuing any generation.
    ///
    /// Deterministic and offline: callers can pre-check balances before
    /// spending.
    pub async fn cost_estimate(&self, request: &GenerationRequest) -> Result<f64> {
        let config = self.registry.resolve_model(&request.model).await?;
        let params = normalize_request(&config, request)?;
        Ok(cost::calculate(&config, &params))
    }

    /// Run one generation through the full pipeline: cache lookup, credit
    /// reservation, rate-limited fallback across providers, cost accounting,
    /// and cache store.
    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let start = tokio::time::Instant::now();
        let result = self.generate_inner(&request).await;

        let status = if result.is_ok() { "success" } else { "failure" };
        metrics::histogram!(
            "generation.duration_seconds",
            "model" => request.model.clone()
        )
        .record(start.elapsed().as_secs_f64());
        metrics::counter!(
            "generation.total",
            "model" => request.model.clone(),
            "status" => status
        )
        .increment(1);

        result
    }

    async fn generate_inner(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let config = self.registry.resolve_model(&request.model).await?;
        let params = normalize_request(&config, request)?;
        let credits = cost::calculate(&config, &params);
        let key = CacheKey::new(&config.id, &request.prompt, &params);

        let timeout = request
            .timeout
            .or(config.timeout)
            .map(Duration::from_secs)
            .unwrap_or(self.request_timeout);

        let chain = self.chain_for(&config).await?;
        let ledger = self.ledger.clone();
        let prompt = request.prompt.clone();

        self.cache
            .get_or_generate(key, || async move {
                // Fail fast on balance before any provider is contacted.
                ledger.reserve(credits).await?;

                let (provider, artifact, elapsed) =
                    chain.generate(&config, &prompt, &params, timeout).await?;

                tracing::info!(
                    model = %config.id,
                    provider = %provider,
                    credits = credits,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Generation complete"
                );

                Ok(GenerationResult {
                    artifact,
                    generation_time: elapsed,
                    credits_spent: credits,
                    model: config.id.clone(),
                    provider,
                    from_cache: false,
                })
            })
            .await
    }

    /// Run a batch of requests through the pipeline with the configured
    /// concurrency bound; results come back in input order, one `Result` per
    /// slot.
    pub async fn generate_batch(
        self: &Arc<Self>,
        requests: Vec<GenerationRequest>,
    ) -> Vec<Result<GenerationResult>> {
        self.generate_batch_with_cancellation(requests, CancellationToken::new())
            .await
    }

    /// Like [`generate_batch`](Self::generate_batch), with cooperative
    /// batch-level cancellation: cancelling `token` stops issuing new
    /// generations and cancels in-flight ones at their next suspension
    /// point. Completed slots keep their results.
    pub async fn generate_batch_with_cancellation(
        self: &Arc<Self>,
        requests: Vec<GenerationRequest>,
        token: CancellationToken,
    ) -> Vec<Result<GenerationResult>> {
        let gateway = self.clone();
        self.dispatcher
            .dispatch_with_cancellation(requests, token, move |request| {
                let gateway = gateway.clone();
                async move { gateway.generate(request).await }
            })
            .await
    }

    /// Convenience for the common batch shape: one model, many prompts.
    pub async fn generate_batch_prompts(
        self: &Arc<Self>,
        model: &str,
        prompts: Vec<String>,
    ) -> Vec<Result<GenerationResult>> {
        let requests = prompts
            .into_iter()
            .map(|prompt| GenerationRequest::new(model, prompt))
            .collect();
        self.generate_batch(requests).await
    }

    /// Build the attempt chain for a model: the owning provider followed by
    /// its configured fallbacks, each paired with its limiter.
    async fn chain_for(&self, config: &ModelConfig) -> Result<FallbackChain> {
        let mut routes = Vec::with_capacity(1 + config.fallback.len());
        for name in std::iter::once(&config.provider).chain(config.fallback.iter()) {
            let adapter = self.registry.resolve(name).await?;
            let limiter = self
                .limiters
                .get(name)
                .cloned()
                .ok_or_else(|| GatewayError::ProviderNotFound(name.clone()))?;
            routes.push(ProviderRoute {
                name: name.clone(),
                adapter,
                limiter,
            });
        }
        FallbackChain::new(routes)
    }
}

/// Builder for constructing a [`GenerationGateway`] with registered
/// providers, a model catalog, and resilience settings.
///
/// ```rust,no_run
/// # use omnigen::gateway::GenerationGateway;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = GenerationGateway::builder()
///     // .register_provider(...)
///     // .catalog(...)
///     .cache_ttl_seconds(600)
///     .max_concurrent(8)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GatewayBuilder {
    adapters: Vec<(Arc<dyn ProviderAdapter>, Option<RateLimitPolicy>)>,
    catalog: Vec<ModelConfig>,
    cache_ttl: Duration,
    cache_store: Option<Arc<dyn CacheStore>>,
    default_policy: RateLimitPolicy,
    ledger: Arc<dyn CreditLedger>,
    request_timeout: Duration,
    max_concurrent: usize,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            adapters: Vec::new(),
            catalog: Vec::new(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_store: None,
            default_policy: RateLimitPolicy::default(),
            ledger: Arc::new(UnlimitedLedger),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl GatewayBuilder {
    /// Register a provider adapter with the default rate-limit policy.
    pub fn register_provider<P: ProviderAdapter + 'static>(self, adapter: P) -> Self {
        self.register_provider_arc(Arc::new(adapter), None)
    }

    /// Register a provider adapter with its own rate-limit policy.
    pub fn register_provider_with_policy<P: ProviderAdapter + 'static>(
        self,
        adapter: P,
        policy: RateLimitPolicy,
    ) -> Self {
        self.register_provider_arc(Arc::new(adapter), Some(policy))
    }

    /// Register an already-shared adapter with the default policy. Useful
    /// when the caller keeps its own handle to the adapter.
    pub fn register_provider_shared(self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register_provider_arc(adapter, None)
    }

    /// Register an already-shared adapter with its own rate-limit policy.
    pub fn register_provider_shared_with_policy(
        self,
        adapter: Arc<dyn ProviderAdapter>,
        policy: RateLimitPolicy,
    ) -> Self {
        self.register_provider_arc(adapter, Some(policy))
    }

    fn register_provider_arc(
        mut self,
        adapter: Arc<dyn ProviderAdapter>,
        policy: Option<RateLimitPolicy>,
    ) -> Self {
        self.adapters.push((adapter, policy));
        self
    }

    /// Set the model catalog from a pre-built vector of configs.
    pub fn catalog(mut self, catalog: Vec<ModelConfig>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Load the catalog from a JSON string (array of model configs).
    pub fn catalog_from_str(mut self, s: &str) -> Result<Self> {
        self.catalog = crate::api::catalog_from_str(s)?;
        Ok(self)
    }

    /// Load the catalog from a JSON file (array of model configs).
    pub fn catalog_from_file(mut self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        self.catalog = crate::api::catalog_from_file(path)?;
        Ok(self)
    }

    /// Cache TTL in seconds; zero disables caching.
    pub fn cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.cache_ttl = Duration::from_secs(seconds);
        self
    }

    /// Swap the cache storage backend (in-memory by default).
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Rate-limit policy applied to providers registered without their own.
    pub fn default_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Set the credit ledger consulted before every generation.
    pub fn credit_ledger(mut self, ledger: Arc<dyn CreditLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Default per-generation timeout in seconds.
    pub fn request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.request_timeout = Duration::from_secs(seconds);
        self
    }

    /// Batch concurrency bound.
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Validate the configuration, register providers and catalog, and
    /// return the constructed gateway.
    pub async fn build(self) -> Result<Arc<GenerationGateway>> {
        if self.request_timeout.is_zero() {
            return Err(GatewayError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }
        let dispatcher = BatchDispatcher::new(self.max_concurrent)?;

        let registry = ProviderRegistry::new();
        let mut limiters = HashMap::new();
        for (adapter, policy) in self.adapters {
            let policy = policy.unwrap_or(self.default_policy);
            if policy.requests_per_minute == 0 || policy.requests_per_hour == 0 {
                return Err(GatewayError::Config(format!(
                    "Rate-limit quotas for provider '{}' must be greater than 0",
                    adapter.name()
                )));
            }
            let name = adapter.name().to_string();
            registry.register(adapter).await?;
            limiters.insert(name.clone(), Arc::new(RateLimiter::new(name, policy)));
        }

        for config in self.catalog {
            registry.register_model(config).await?;
        }

        let cache = match self.cache_store {
            Some(store) => ResultCache::with_store(store, self.cache_ttl),
            None => ResultCache::new(self.cache_ttl),
        };

        Ok(Arc::new(GenerationGateway {
            registry,
            cache,
            limiters,
            ledger: self.ledger,
            dispatcher,
            request_timeout: self.request_timeout,
        }))
    }
}

//! Unified orchestration layer for multi-provider AI generation backends.
//!
//! Omnigen sits between callers and provider adapters (image, text, video,
//! audio backends) and supplies the resilience plumbing every deployment
//! otherwise reimplements: request routing, per-provider rate limiting,
//! ordered fallback across providers, result caching, bounded-concurrency
//! batch dispatch, and deterministic credit cost accounting.
//!
//! # Key concepts
//!
//! - **[`GenerationGateway`](gateway::GenerationGateway)** — the central
//!   gateway that owns providers, the model catalog, and the pipeline.
//! - **[`ModelConfig`](api::ModelConfig)** — a declarative model
//!   description: provider, category, parameter schema, and cost rule.
//! - **Providers** — pluggable backends that implement
//!   [`ProviderAdapter`](traits::ProviderAdapter). The gateway never sees
//!   their wire protocols or credentials.
//! - **[`GenerationRequest`](api::GenerationRequest)** /
//!   **[`GenerationResult`](traits::GenerationResult)** — one immutable
//!   request in, one result out, with cost, timing, and cache provenance
//!   attached.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use omnigen::api::{GenerationRequest, RateLimitPolicy, catalog_from_str};
//! use omnigen::gateway::GenerationGateway;
//! # use omnigen::traits::ProviderAdapter;
//!
//! # async fn example(replicate: impl ProviderAdapter + 'static) -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = catalog_from_str(r#"[{
//!     "id": "sdxl",
//!     "provider": "replicate",
//!     "category": "txt2img",
//!     "credits_per_generation": 4.0
//! }]"#)?;
//!
//! let gateway = GenerationGateway::builder()
//!     .register_provider_with_policy(replicate, RateLimitPolicy::new(60, 1_000))
//!     .catalog(catalog)
//!     .cache_ttl_seconds(600)
//!     .build()
//!     .await?;
//!
//! let result = gateway
//!     .generate(GenerationRequest::new("sdxl", "a red fox, studio lighting"))
//!     .await?;
//! println!("{:?} cost {} credits", result.artifact, result.credits_spent);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod batch;
pub mod blocking;
pub mod cache;
pub mod cost;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod limiter;
pub mod registry;
pub mod traits;
mod validation;

#[cfg(test)]
mod mock;

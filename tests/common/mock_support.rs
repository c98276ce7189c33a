#![allow(dead_code)]

//! Shared mock adapter and fixtures for integration tests.

use async_trait::async_trait;
use omnigen::api::{Modality, ModelCategory, ModelConfig, ParameterKind, ParameterSpec};
use omnigen::cost::CostRule;
use omnigen::error::{GatewayError, Result};
use omnigen::traits::{Artifact, ProviderAdapter, ProviderCapabilities, ProviderHealth};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Failure script for a [`MockAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Provider,
    RateLimited,
    Unavailable,
    InsufficientCredits,
    ModelNotFound,
}

impl FailureKind {
    fn to_error(self) -> GatewayError {
        match self {
            Self::Provider => GatewayError::Provider {
                message: "Mock provider failure".to_string(),
            },
            Self::RateLimited => GatewayError::RateLimited {
                retry_after: Duration::from_secs(1),
            },
            Self::Unavailable => GatewayError::Unavailable,
            Self::InsufficientCredits => GatewayError::InsufficientCredits {
                required: 4.0,
                available: 0.0,
            },
            Self::ModelNotFound => GatewayError::ModelNotFound("mock".to_string()),
        }
    }
}

/// Mock provider adapter with scripted failures, delays, and call counters.
///
/// Tracks the number of generations in flight and the high-water mark, so
/// concurrency-bound tests can assert the batch dispatcher's limit.
pub struct MockAdapter {
    name: &'static str,
    modalities: Vec<Modality>,
    health: ProviderHealth,
    failure: Option<FailureKind>,
    fail_count: AtomicU32,
    fail_kind: FailureKind,
    delay_ms: u64,
    image_calls: AtomicU32,
    text_calls: AtomicU32,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
}

impl MockAdapter {
    pub fn new(name: &'static str, modalities: Vec<Modality>) -> Self {
        Self {
            name,
            modalities,
            health: ProviderHealth::Healthy,
            failure: None,
            fail_count: AtomicU32::new(0),
            fail_kind: FailureKind::Provider,
            delay_ms: 0,
            image_calls: AtomicU32::new(0),
            text_calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
        }
    }

    pub fn image_only(name: &'static str) -> Self {
        Self::new(name, vec![Modality::Image])
    }

    pub fn text_only(name: &'static str) -> Self {
        Self::new(name, vec![Modality::Text])
    }

    /// Every call fails with `kind`.
    pub fn failing(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    /// The first `count` calls fail with `kind`, later calls succeed.
    pub fn fail_first(mut self, count: u32, kind: FailureKind) -> Self {
        self.fail_count = AtomicU32::new(count);
        self.fail_kind = kind;
        self
    }

    /// Every call sleeps `delay_ms` before responding.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_health(mut self, health: ProviderHealth) -> Self {
        self.health = health;
        self
    }

    pub fn image_calls(&self) -> u32 {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> u32 {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u32 {
        self.image_calls() + self.text_calls()
    }

    pub fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn scripted_behavior(&self) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = async {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if let Some(kind) = self.failure {
                return Err(kind.to_error());
            }
            if self.fail_count.load(Ordering::SeqCst) > 0 {
                self.fail_count.fetch_sub(1, Ordering::SeqCst);
                return Err(self.fail_kind.to_error());
            }
            Ok(())
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            modalities: self.modalities.clone(),
        }
    }

    async fn health(&self) -> ProviderHealth {
        self.health.clone()
    }

    async fn generate_image(
        &self,
        model: &str,
        _prompt: &str,
        width: Option<u32>,
        height: Option<u32>,
        _extra: &serde_json::Value,
    ) -> Result<Artifact> {
        let call = self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.scripted_behavior().await?;
        Ok(Artifact::Url(format!(
            "https://artifacts.mock/{}/{}x{}/{}.png",
            model,
            width.unwrap_or(0),
            height.unwrap_or(0),
            call
        )))
    }

    async fn generate_text(
        &self,
        _model: &str,
        prompt: &str,
        _max_tokens: Option<u32>,
        _extra: &serde_json::Value,
    ) -> Result<Artifact> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.scripted_behavior().await?;
        Ok(Artifact::Text(format!("{}: {}", self.name, prompt)))
    }
}

/// A txt2img config with resolution-scaled pricing (base 4.0 credits at
/// 1024x1024).
pub fn image_model(id: &str, provider: &str) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        provider: provider.to_string(),
        category: ModelCategory::TextToImage,
        credits_per_generation: 4.0,
        parameters: [
            (
                "width".to_string(),
                ParameterSpec::of_kind(ParameterKind::Integer)
                    .with_default(json!(1024))
                    .with_range(256.0, 2048.0),
            ),
            (
                "height".to_string(),
                ParameterSpec::of_kind(ParameterKind::Integer)
                    .with_default(json!(1024))
                    .with_range(256.0, 2048.0),
            ),
        ]
        .into_iter()
        .collect(),
        cost: CostRule::ResolutionScaled {
            reference_width: 1024,
            reference_height: 1024,
        },
        fallback: vec![],
        timeout: None,
    }
}

/// A txt2txt config with token-scaled pricing (base 1.0 credits, 256 tokens
/// included).
pub fn text_model(id: &str, provider: &str) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        provider: provider.to_string(),
        category: ModelCategory::TextToText,
        credits_per_generation: 1.0,
        parameters: [(
            "max_tokens".to_string(),
            ParameterSpec::of_kind(ParameterKind::Integer)
                .with_default(json!(256))
                .with_range(1.0, 4096.0),
        )]
        .into_iter()
        .collect(),
        cost: CostRule::TokenScaled {
            included_tokens: 256,
            per_token: 0.001,
        },
        fallback: vec![],
        timeout: None,
    }
}

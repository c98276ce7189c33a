//! Error types for the Omnigen gateway.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Unified error type covering configuration, admission, provider, and
/// caller-side failures.
///
/// Variants are intentionally coarse-grained so that callers can match on
/// error *category* (e.g. fallback-eligible vs permanent) rather than on
/// provider-specific details.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid or missing configuration (bad model config, unknown or
    /// mistyped request parameter, malformed catalog JSON, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A provider with the same name is already registered.
    #[error("Duplicate provider: {0}")]
    DuplicateProvider(String),

    /// A model with the same id is already registered.
    #[error("Duplicate model: {0}")]
    DuplicateModel(String),

    /// The requested provider name is not registered with the gateway.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// The requested model id is not registered with the gateway.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// A generation was requested for a modality the provider does not
    /// support, or a model was registered against a provider that does not
    /// advertise its category.
    #[error("Capability mismatch: {0}")]
    CapabilityMismatch(String),

    /// The provider adapter failed (network failure, backend rejection,
    /// malformed upstream response, etc.).
    #[error("Provider error: {message}")]
    Provider {
        /// Human-readable description from the adapter.
        message: String,
    },

    /// Admission was denied because the provider's rate-limit window is
    /// full and the configured maximum wait would be exceeded.
    #[error("Rate limited (retry after {}ms)", retry_after.as_millis())]
    RateLimited {
        /// Time until the earliest window slot frees up.
        retry_after: Duration,
    },

    /// The caller's credit balance cannot cover the computed cost.
    ///
    /// Never retried against alternate providers: switching providers does
    /// not change the caller's balance.
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits {
        /// Credits the generation would cost.
        required: f64,
        /// Credits the caller has left.
        available: f64,
    },

    /// Every provider in the fallback chain failed. Carries each attempt's
    /// failure in chain order.
    #[error("All providers exhausted ({} attempted)", failures.len())]
    AllProvidersExhausted {
        /// `(provider name, failure)` for each attempted provider.
        failures: Vec<(String, GatewayError)>,
    },

    /// The operation exceeded its configured timeout.
    #[error("Timeout")]
    Timeout,

    /// The provider is currently unavailable (unhealthy, shutting down, etc.).
    #[error("Unavailable")]
    Unavailable,

    /// The operation was cancelled before it could complete.
    #[error("Cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Returns `true` for failures that justify advancing to the next
    /// provider in a fallback chain: [`Provider`](Self::Provider),
    /// [`RateLimited`](Self::RateLimited), [`Timeout`](Self::Timeout), and
    /// [`Unavailable`](Self::Unavailable).
    ///
    /// Configuration and caller/business errors (unknown model, insufficient
    /// credits) return `false`; trying another provider cannot fix them.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::RateLimited { .. } | Self::Timeout | Self::Unavailable
        )
    }
}

//! Deterministic credit cost accounting.
//!
//! Cost is a pure function of (model config, normalized parameters): the same
//! inputs always produce the same number of credits, computed offline with no
//! network access, so callers can pre-check balances before any generation
//! call is issued. Scaling behavior is catalog data ([`CostRule`]), not code,
//! so new models and providers need no code change.

use crate::api::ModelConfig;
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative cost scaling applied on top of a model's base rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CostRule {
    /// The base rate, regardless of parameters.
    #[default]
    Flat,
    /// Image cost scaling with output area relative to a reference
    /// resolution: `base * (width * height) / (ref_width * ref_height)`.
    /// Missing dimensions fall back to the reference values.
    ResolutionScaled {
        /// Width at which the base rate applies.
        reference_width: u32,
        /// Height at which the base rate applies.
        reference_height: u32,
    },
    /// Text cost scaling with requested length:
    /// `base + per_token * max(0, max_tokens - included_tokens)`.
    TokenScaled {
        /// Tokens covered by the base rate.
        included_tokens: u32,
        /// Credits per token beyond the included budget.
        per_token: f64,
    },
}

impl CostRule {
    /// Validate rule constants for the named model.
    pub fn validate(&self, model_id: &str) -> Result<()> {
        match self {
            Self::Flat => Ok(()),
            Self::ResolutionScaled {
                reference_width,
                reference_height,
            } => {
                if *reference_width == 0 || *reference_height == 0 {
                    return Err(GatewayError::Config(format!(
                        "Model '{}' has a zero reference resolution",
                        model_id
                    )));
                }
                Ok(())
            }
            Self::TokenScaled { per_token, .. } => {
                if !per_token.is_finite() || *per_token < 0.0 {
                    return Err(GatewayError::Config(format!(
                        "Model '{}' has an invalid per-token rate",
                        model_id
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Compute the credit cost for one generation.
///
/// `params` is the *normalized* parameter set (defaults already applied), so
/// two requests that differ only in omitted-vs-explicit defaults cost the
/// same.
pub fn calculate(config: &ModelConfig, params: &BTreeMap<String, serde_json::Value>) -> f64 {
    let base = config.credits_per_generation;
    match &config.cost {
        CostRule::Flat => base,
        CostRule::ResolutionScaled {
            reference_width,
            reference_height,
        } => {
            let width = param_u64(params, "width").unwrap_or(u64::from(*reference_width));
            let height = param_u64(params, "height").unwrap_or(u64::from(*reference_height));
            let reference_area = u64::from(*reference_width) * u64::from(*reference_height);
            base * (width * height) as f64 / reference_area as f64
        }
        CostRule::TokenScaled {
            included_tokens,
            per_token,
        } => {
            let requested = param_u64(params, "max_tokens").unwrap_or(u64::from(*included_tokens));
            let billable = requested.saturating_sub(u64::from(*included_tokens));
            base + per_token * billable as f64
        }
    }
}

fn param_u64(params: &BTreeMap<String, serde_json::Value>, name: &str) -> Option<u64> {
    params.get(name).and_then(|v| v.as_u64())
}

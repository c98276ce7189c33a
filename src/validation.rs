//! Validation of request parameters against a model's parameter schema.
//!
//! Called before dispatch to reject unknown or mistyped parameters with a
//! configuration error instead of passing them through silently, and to
//! produce the *normalized* parameter set (defaults applied, stable order)
//! that cost accounting and cache fingerprinting both consume.

use crate::api::{GenerationRequest, ModelConfig, ParameterKind, ParameterSpec};
use crate::error::{GatewayError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Validate `request` against `config.parameters` and return the normalized
/// parameter map: caller values merged with schema defaults, keyed in stable
/// order.
///
/// The convenience fields (`width`, `height`, `max_tokens`) are folded into
/// the map under those names; setting one both ways is rejected.
pub(crate) fn normalize_request(
    config: &ModelConfig,
    request: &GenerationRequest,
) -> Result<BTreeMap<String, Value>> {
    let mut provided: BTreeMap<String, Value> = match &request.params {
        Value::Null => BTreeMap::new(),
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => {
            return Err(GatewayError::Config(format!(
                "Parameters for model '{}' must be a JSON object or null",
                config.id
            )));
        }
    };

    let convenience = [
        ("width", request.width.map(|v| Value::from(u64::from(v)))),
        ("height", request.height.map(|v| Value::from(u64::from(v)))),
        (
            "max_tokens",
            request.max_tokens.map(|v| Value::from(u64::from(v))),
        ),
    ];
    for (name, value) in convenience {
        if let Some(value) = value {
            if provided.contains_key(name) {
                return Err(GatewayError::Config(format!(
                    "Parameter '{}' for model '{}' specified both as a field and in params",
                    name, config.id
                )));
            }
            provided.insert(name.to_string(), value);
        }
    }

    for (name, value) in &provided {
        let Some(spec) = config.parameters.get(name) else {
            return Err(GatewayError::Config(format!(
                "Unknown parameter '{}' for model '{}'",
                name, config.id
            )));
        };
        check_value(&config.id, name, spec, value)?;
    }

    // Absent optional parameters take the model defaults, so two logically
    // identical requests normalize identically.
    for (name, spec) in &config.parameters {
        if let Some(default) = &spec.default {
            provided
                .entry(name.clone())
                .or_insert_with(|| default.clone());
        }
    }

    Ok(provided)
}

fn check_value(model_id: &str, name: &str, spec: &ParameterSpec, value: &Value) -> Result<()> {
    let type_ok = match spec.kind {
        ParameterKind::String => value.is_string(),
        ParameterKind::Integer => value.is_i64() || value.is_u64(),
        ParameterKind::Float => value.is_number(),
        ParameterKind::Boolean => value.is_boolean(),
    };
    if !type_ok {
        return Err(GatewayError::Config(format!(
            "Parameter '{}' for model '{}' must be a {}",
            name,
            model_id,
            kind_name(spec.kind)
        )));
    }

    if let Some(number) = value.as_f64() {
        if let Some(minimum) = spec.minimum
            && number < minimum
        {
            return Err(GatewayError::Config(format!(
                "Parameter '{}' for model '{}' must be >= {}",
                name, model_id, minimum
            )));
        }
        if let Some(maximum) = spec.maximum
            && number > maximum
        {
            return Err(GatewayError::Config(format!(
                "Parameter '{}' for model '{}' must be <= {}",
                name, model_id, maximum
            )));
        }
    }

    if let Some(allowed) = &spec.allowed
        && !allowed.contains(value)
    {
        return Err(GatewayError::Config(format!(
            "Parameter '{}' for model '{}' must be one of the allowed values",
            name, model_id
        )));
    }

    Ok(())
}

fn kind_name(kind: ParameterKind) -> &'static str {
    match kind {
        ParameterKind::String => "string",
        ParameterKind::Integer => "integer",
        ParameterKind::Float => "number",
        ParameterKind::Boolean => "boolean",
    }
}

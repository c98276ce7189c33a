//! Public API types for configuring models, catalogs, and gateway behavior.

use crate::cost::CostRule;
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// The output modality a generation produces. The capability unit providers
/// advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Still images (URL artifacts).
    Image,
    /// Plain text.
    Text,
    /// Video clips.
    Video,
    /// Audio clips.
    Audio,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Text => write!(f, "text"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// The kind of generation a model performs, named after its input → output
/// pair (`txt2img`, `txt2txt`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelCategory {
    /// Text prompt to image.
    #[serde(rename = "txt2img")]
    TextToImage,
    /// Text prompt to text completion.
    #[serde(rename = "txt2txt")]
    TextToText,
    /// Image (plus prompt) to image.
    #[serde(rename = "img2img")]
    ImageToImage,
    /// Text prompt to video.
    #[serde(rename = "txt2vid")]
    TextToVideo,
    /// Text prompt to audio.
    #[serde(rename = "txt2aud")]
    TextToAudio,
}

impl ModelCategory {
    /// The output modality this category produces, used for provider
    /// capability negotiation.
    pub fn modality(&self) -> Modality {
        match self {
            Self::TextToImage | Self::ImageToImage => Modality::Image,
            Self::TextToText => Modality::Text,
            Self::TextToVideo => Modality::Video,
            Self::TextToAudio => Modality::Audio,
        }
    }
}

impl std::fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextToImage => write!(f, "txt2img"),
            Self::TextToText => write!(f, "txt2txt"),
            Self::ImageToImage => write!(f, "img2img"),
            Self::TextToVideo => write!(f, "txt2vid"),
            Self::TextToAudio => write!(f, "txt2aud"),
        }
    }
}

/// Value type of a model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// UTF-8 string.
    String,
    /// Whole number (JSON integer).
    Integer,
    /// Floating-point number.
    Float,
    /// Boolean flag.
    Boolean,
}

/// Schema for a single model parameter: type, default, and constraints.
///
/// Requests are validated against these specs before dispatch; unknown or
/// mistyped parameters are rejected with a configuration error instead of
/// being passed through silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Expected value type.
    pub kind: ParameterKind,
    /// Value applied when the caller omits this parameter. Parameters with
    /// no default are required only if a constraint says so; absent optional
    /// parameters simply stay absent from the normalized set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Inclusive lower bound for numeric parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numeric parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Closed set of admissible values, checked after the type check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<serde_json::Value>>,
}

impl ParameterSpec {
    /// A spec with only a type constraint.
    pub fn of_kind(kind: ParameterKind) -> Self {
        Self {
            kind,
            default: None,
            minimum: None,
            maximum: None,
            allowed: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Set an inclusive numeric range.
    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }
}

/// Declarative description of one model: identity, owning provider, category,
/// pricing, and parameter schema.
///
/// A model catalog is a `Vec<ModelConfig>` — either built programmatically or
/// parsed from JSON with [`catalog_from_str`] / [`catalog_from_file`].
///
/// # Example JSON
///
/// ```json
/// {
///   "id": "sdxl",
///   "provider": "replicate",
///   "category": "txt2img",
///   "credits_per_generation": 4.0,
///   "parameters": {
///     "width":  { "kind": "integer", "default": 1024, "minimum": 256, "maximum": 2048 },
///     "height": { "kind": "integer", "default": 1024, "minimum": 256, "maximum": 2048 }
///   },
///   "cost": { "rule": "resolution_scaled", "reference_width": 1024, "reference_height": 1024 },
///   "fallback": ["stability"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Unique model id used in [`GenerationRequest::model`].
    pub id: String,
    /// Name of the provider that owns this model.
    pub provider: String,
    /// Generation category (`txt2img`, `txt2txt`, ...).
    pub category: ModelCategory,
    /// Base credit cost per generation, before cost-rule scaling.
    pub credits_per_generation: f64,
    /// Parameter schema, keyed by parameter name. Defaults to no parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
    /// Cost scaling rule applied on top of the base rate. Defaults to flat.
    #[serde(default)]
    pub cost: CostRule,
    /// Ordered alternate providers tried after the owner when it fails.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<String>,
    /// Per-generation timeout in seconds, overriding the gateway default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl ModelConfig {
    /// Validate invariants: non-empty ids, a finite non-negative base rate,
    /// non-zero timeout when set, and a well-formed cost rule.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(GatewayError::Config("Model id cannot be empty".to_string()));
        }
        if self.provider.is_empty() {
            return Err(GatewayError::Config(format!(
                "Model '{}' has an empty provider name",
                self.id
            )));
        }
        if !self.credits_per_generation.is_finite() || self.credits_per_generation < 0.0 {
            return Err(GatewayError::Config(format!(
                "Model '{}' has an invalid base rate",
                self.id
            )));
        }
        if self.timeout == Some(0) {
            return Err(GatewayError::Config(format!(
                "Generation timeout for model '{}' must be greater than 0",
                self.id
            )));
        }
        self.cost.validate(&self.id)
    }

    /// Parse a single `ModelConfig` from a JSON value.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| GatewayError::Config(format!("Invalid ModelConfig JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a single `ModelConfig` from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)
            .map_err(|e| GatewayError::Config(format!("Invalid ModelConfig JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

/// Parse a catalog (array) of `ModelConfig` from a JSON string.
pub fn catalog_from_str(s: &str) -> Result<Vec<ModelConfig>> {
    let configs: Vec<ModelConfig> = serde_json::from_str(s)
        .map_err(|e| GatewayError::Config(format!("Invalid catalog JSON: {}", e)))?;
    for config in &configs {
        config.validate()?;
    }
    Ok(configs)
}

/// Read and parse a catalog from a JSON file.
///
/// The file must contain a JSON array of model configs.
pub fn catalog_from_file(path: impl AsRef<Path>) -> Result<Vec<ModelConfig>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::Config(format!(
            "Failed to read catalog file '{}': {}",
            path.display(),
            e
        ))
    })?;
    catalog_from_str(&contents)
}

/// Per-provider admission quotas.
///
/// Attached to a provider at registration time; the gateway builds one
/// independent [`RateLimiter`](crate::limiter::RateLimiter) per provider
/// from its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Calls admitted within any rolling 60-second window.
    pub requests_per_minute: u32,
    /// Calls admitted within any rolling 3600-second window.
    pub requests_per_hour: u32,
    /// Upper bound in milliseconds on how long a blocking
    /// [`acquire`](crate::limiter::RateLimiter::acquire) may wait for a slot.
    #[serde(default = "RateLimitPolicy::default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl RateLimitPolicy {
    fn default_max_wait_ms() -> u64 {
        10_000
    }

    /// Policy with the given per-minute and per-hour quotas and the default
    /// maximum wait.
    pub fn new(requests_per_minute: u32, requests_per_hour: u32) -> Self {
        Self {
            requests_per_minute,
            requests_per_hour,
            max_wait_ms: Self::default_max_wait_ms(),
        }
    }

    /// Override the maximum blocking wait.
    pub fn with_max_wait_ms(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_ms = max_wait_ms;
        self
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(60, 1_000)
    }
}

/// A single generation request: model, prompt, and parameters.
///
/// Constructed once per call and never mutated afterwards; the builder
/// methods consume `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Id of the model to generate with.
    pub model: String,
    /// The text prompt.
    pub prompt: String,
    /// Requested output width in pixels (image categories).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Requested output height in pixels (image categories).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Maximum tokens to generate (text categories).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-call timeout in seconds, overriding model and gateway defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Free-form keyword parameters, validated against the model's schema.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl GenerationRequest {
    /// Create a request for `model` with `prompt` and no extra parameters.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            width: None,
            height: None,
            max_tokens: None,
            timeout: None,
            params: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the requested output dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set a per-call timeout in seconds.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// Add one keyword parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = &mut self.params {
            map.insert(name.into(), value);
        }
        self
    }
}

/// Cache key: model id plus a canonical fingerprint of the prompt and the
/// normalized parameter set.
///
/// Two logically identical requests always hash identically regardless of
/// caller-supplied argument order or omission of defaulted parameters,
/// because the fingerprint is derived from the *normalized* parameters in
/// stable key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// The model id the request targets.
    pub model: String,
    /// 64-bit fingerprint of prompt + normalized parameters.
    pub fingerprint: u64,
}

impl CacheKey {
    /// Derive a key from a model id, prompt, and normalized parameters.
    ///
    /// `params` must already have defaults applied; the `BTreeMap` guarantees
    /// stable key order, and nested JSON objects are hashed in a
    /// key-order-independent manner.
    pub fn new(model: &str, prompt: &str, params: &BTreeMap<String, serde_json::Value>) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();

        prompt.hash(&mut hasher);
        params.len().hash(&mut hasher);
        for (name, value) in params {
            name.hash(&mut hasher);
            hash_json_value(value, &mut hasher);
        }

        Self {
            model: model.to_string(),
            fingerprint: hasher.finish(),
        }
    }
}

/// Recursively hash a JSON value in a deterministic, key-order-independent way.
///
/// Each JSON variant is prefixed with a unique discriminant byte to avoid
/// collisions between structurally different values (e.g. `null` vs `false`).
/// Object keys are sorted before hashing so that `{"a":1,"b":2}` and
/// `{"b":2,"a":1}` produce the same hash.
pub(crate) fn hash_json_value<H: std::hash::Hasher>(value: &serde_json::Value, hasher: &mut H) {
    use std::hash::Hash;

    match value {
        serde_json::Value::Null => {
            0u8.hash(hasher);
        }
        serde_json::Value::Bool(v) => {
            1u8.hash(hasher);
            v.hash(hasher);
        }
        serde_json::Value::Number(v) => {
            2u8.hash(hasher);
            v.to_string().hash(hasher);
        }
        serde_json::Value::String(v) => {
            3u8.hash(hasher);
            v.hash(hasher);
        }
        serde_json::Value::Array(values) => {
            4u8.hash(hasher);
            values.len().hash(hasher);
            for v in values {
                hash_json_value(v, hasher);
            }
        }
        serde_json::Value::Object(map) => {
            5u8.hash(hasher);
            map.len().hash(hasher);

            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(k, _)| *k);
            for (k, v) in entries {
                k.hash(hasher);
                hash_json_value(v, hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VALID_JSON: &str = r#"{
        "id": "sdxl",
        "provider": "replicate",
        "category": "txt2img",
        "credits_per_generation": 4.0
    }"#;

    const VALID_CATALOG_JSON: &str = r#"[
        {
            "id": "sdxl",
            "provider": "replicate",
            "category": "txt2img",
            "credits_per_generation": 4.0,
            "parameters": {
                "width":  { "kind": "integer", "default": 1024, "minimum": 256, "maximum": 2048 },
                "height": { "kind": "integer", "default": 1024, "minimum": 256, "maximum": 2048 }
            },
            "cost": { "rule": "resolution_scaled", "reference_width": 1024, "reference_height": 1024 }
        },
        {
            "id": "gpt-4o-mini",
            "provider": "openai",
            "category": "txt2txt",
            "credits_per_generation": 1.0,
            "parameters": {
                "max_tokens": { "kind": "integer", "default": 256, "minimum": 1, "maximum": 4096 }
            },
            "cost": { "rule": "token_scaled", "included_tokens": 256, "per_token": 0.001 },
            "fallback": ["anthropic"]
        }
    ]"#;

    #[test]
    fn from_json_str_parses_valid_config() {
        let config = ModelConfig::from_json_str(VALID_JSON).unwrap();
        assert_eq!(config.id, "sdxl");
        assert_eq!(config.provider, "replicate");
        assert_eq!(config.category, ModelCategory::TextToImage);
        assert_eq!(config.cost, CostRule::Flat); // default
        assert!(config.parameters.is_empty()); // default
    }

    #[test]
    fn from_json_str_rejects_empty_id() {
        let json = r#"{"id":"","provider":"x","category":"txt2img","credits_per_generation":1.0}"#;
        assert!(ModelConfig::from_json_str(json).is_err());
    }

    #[test]
    fn from_json_str_rejects_negative_base_rate() {
        let json =
            r#"{"id":"m","provider":"x","category":"txt2img","credits_per_generation":-1.0}"#;
        assert!(ModelConfig::from_json_str(json).is_err());
    }

    #[test]
    fn from_json_str_rejects_zero_timeout() {
        let json = r#"{"id":"m","provider":"x","category":"txt2txt","credits_per_generation":1.0,"timeout":0}"#;
        assert!(ModelConfig::from_json_str(json).is_err());
    }

    #[test]
    fn from_json_str_rejects_invalid_json() {
        assert!(ModelConfig::from_json_str("{not valid}").is_err());
    }

    #[test]
    fn catalog_from_str_parses_array() {
        let configs = catalog_from_str(VALID_CATALOG_JSON).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].id, "sdxl");
        assert_eq!(configs[1].id, "gpt-4o-mini");
        assert_eq!(configs[1].fallback, vec!["anthropic".to_string()]);
        assert_eq!(
            configs[0].parameters["width"].default,
            Some(json!(1024))
        );
    }

    #[test]
    fn catalog_from_file_reads_and_parses() {
        let dir = std::env::temp_dir();
        let path = dir.join("omnigen_test_catalog.json");
        std::fs::write(&path, VALID_CATALOG_JSON).unwrap();
        let configs = catalog_from_file(&path).unwrap();
        assert_eq!(configs.len(), 2);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn catalog_from_file_errors_on_missing_file() {
        assert!(catalog_from_file("/nonexistent/path/catalog.json").is_err());
    }

    #[test]
    fn category_modalities() {
        assert_eq!(ModelCategory::TextToImage.modality(), Modality::Image);
        assert_eq!(ModelCategory::ImageToImage.modality(), Modality::Image);
        assert_eq!(ModelCategory::TextToText.modality(), Modality::Text);
        assert_eq!(ModelCategory::TextToVideo.modality(), Modality::Video);
        assert_eq!(ModelCategory::TextToAudio.modality(), Modality::Audio);
    }

    #[test]
    fn category_serde_names() {
        assert_eq!(
            serde_json::to_string(&ModelCategory::TextToImage).unwrap(),
            "\"txt2img\""
        );
        let cat: ModelCategory = serde_json::from_str("\"img2img\"").unwrap();
        assert_eq!(cat, ModelCategory::ImageToImage);
    }

    #[test]
    fn cache_key_identical_for_same_inputs() {
        let mut params = BTreeMap::new();
        params.insert("width".to_string(), json!(1024));
        params.insert("height".to_string(), json!(768));

        let key1 = CacheKey::new("sdxl", "a red fox", &params);
        let key2 = CacheKey::new("sdxl", "a red fox", &params);
        assert_eq!(key1, key2);
    }

    #[test]
    fn cache_key_differs_by_prompt_and_model() {
        let params = BTreeMap::new();
        let base = CacheKey::new("sdxl", "a red fox", &params);
        assert_ne!(base, CacheKey::new("sdxl", "a blue fox", &params));
        assert_ne!(base, CacheKey::new("sd15", "a red fox", &params));
    }

    #[test]
    fn cache_key_nested_object_order_independence() {
        let mut params1 = BTreeMap::new();
        params1.insert("style".to_string(), json!({"b": [3, 2, 1], "a": {"y": 2, "x": 1}}));

        let mut params2 = BTreeMap::new();
        params2.insert("style".to_string(), json!({"a": {"x": 1, "y": 2}, "b": [3, 2, 1]}));

        assert_eq!(
            CacheKey::new("sdxl", "p", &params1),
            CacheKey::new("sdxl", "p", &params2)
        );
    }

    #[test]
    fn cache_key_distinguishes_value_shapes() {
        let mut params_null = BTreeMap::new();
        params_null.insert("x".to_string(), serde_json::Value::Null);

        let mut params_bool = BTreeMap::new();
        params_bool.insert("x".to_string(), json!(false));

        assert_ne!(
            CacheKey::new("m", "p", &params_null),
            CacheKey::new("m", "p", &params_bool)
        );
    }

    #[test]
    fn request_builder_accumulates_params() {
        let request = GenerationRequest::new("sdxl", "a red fox")
            .with_size(512, 512)
            .with_param("steps", json!(30));
        assert_eq!(request.width, Some(512));
        assert_eq!(request.params["steps"], json!(30));
    }

    #[test]
    fn rate_limit_policy_deserializes_with_default_wait() {
        let policy: RateLimitPolicy =
            serde_json::from_str(r#"{"requests_per_minute":10,"requests_per_hour":100}"#).unwrap();
        assert_eq!(policy.requests_per_minute, 10);
        assert_eq!(policy.max_wait_ms, 10_000);
    }
}

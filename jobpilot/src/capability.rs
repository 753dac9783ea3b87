//! Model capability detection.
//!
//! Whether a backend honours `temperature` or a declared JSON schema cannot be
//! queried, so it is inferred from the model identifier. The lists live in a
//! [`CapabilityPolicy`] value so they can be replaced without touching the
//! fallback ladder.

use serde::{Deserialize, Serialize};

/// Optional request features a model is believed to support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// The `temperature` parameter may be sent.
    pub supports_temperature: bool,
    /// `response_format: json_schema` may be requested.
    pub supports_structured_schema: bool,
}

/// Allow-lists used to derive [`ModelCapabilities`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    /// Models matched exactly for temperature support.
    pub temperature_models: Vec<String>,
    /// Case-insensitive substrings marking schema-capable models.
    pub schema_markers: Vec<String>,
}

impl CapabilityPolicy {
    /// Models known to accept `temperature`.
    pub const TEMPERATURE_MODELS: &'static [&'static str] =
        &["gpt-3.5-turbo", "gpt-4", "gpt-4-turbo", "gpt-4o", "gpt-4o-mini"];

    /// Markers of models known to accept `json_schema` output.
    pub const SCHEMA_MARKERS: &'static [&'static str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo"];

    /// Create a policy from explicit lists.
    #[must_use]
    pub fn new<T, S>(temperature_models: T, schema_markers: S) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            temperature_models: temperature_models.into_iter().map(Into::into).collect(),
            schema_markers: schema_markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `model_id` is on the temperature allow-list.
    ///
    /// Unknown models return `false`: the parameter is omitted rather than guessed.
    #[must_use]
    pub fn supports_temperature(&self, model_id: &str) -> bool {
        self.temperature_models.iter().any(|m| m == model_id)
    }

    /// Whether `model_id` contains any schema marker, ignoring case.
    #[must_use]
    pub fn supports_structured_schema(&self, model_id: &str) -> bool {
        let model = model_id.to_lowercase();
        self.schema_markers
            .iter()
            .any(|marker| model.contains(&marker.to_lowercase()))
    }

    /// Derive the full capability set for `model_id`.
    #[must_use]
    pub fn capabilities(&self, model_id: &str) -> ModelCapabilities {
        ModelCapabilities {
            supports_temperature: self.supports_temperature(model_id),
            supports_structured_schema: self.supports_structured_schema(model_id),
        }
    }
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self::new(
            Self::TEMPERATURE_MODELS.iter().copied(),
            Self::SCHEMA_MARKERS.iter().copied(),
        )
    }
}

/// [`CapabilityPolicy::supports_temperature`] under the default policy.
#[must_use]
pub fn supports_temperature(model_id: &str) -> bool {
    CapabilityPolicy::default().supports_temperature(model_id)
}

/// [`CapabilityPolicy::supports_structured_schema`] under the default policy.
#[must_use]
pub fn supports_structured_schema(model_id: &str) -> bool {
    CapabilityPolicy::default().supports_structured_schema(model_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_models_default_deny() {
        for model in ["llama3", "mistral-7b", "qwen2.5:14b", "", "deepseek-chat"] {
            assert!(!supports_temperature(model), "{model}");
            assert!(!supports_structured_schema(model), "{model}");
        }
    }

    #[test]
    fn test_temperature_is_exact_match() {
        assert!(supports_temperature("gpt-4o"));
        assert!(supports_temperature("gpt-3.5-turbo"));
        assert!(!supports_temperature("GPT-4o"));
        assert!(!supports_temperature("gpt-4o-2024-08-06"));
    }

    #[test]
    fn test_schema_is_case_insensitive_substring() {
        assert!(supports_structured_schema("my-gpt-4o-mini-custom"));
        assert!(supports_structured_schema("GPT-4O"));
        assert!(supports_structured_schema("openai/gpt-4-turbo-preview"));
        assert!(!supports_structured_schema("gpt-3.5-turbo"));
        assert!(!supports_structured_schema("gpt-4"));
    }

    #[test]
    fn test_custom_policy() {
        let policy = CapabilityPolicy::new(["llama3"], ["qwen"]);
        let caps = policy.capabilities("Qwen2.5-Coder");
        assert!(!caps.supports_temperature);
        assert!(caps.supports_structured_schema);
        assert!(policy.supports_temperature("llama3"));
        assert!(!policy.supports_structured_schema("gpt-4o"));
    }
}

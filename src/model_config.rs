//! Model version and generation parameter resolution.
//!
//! Precedence, highest first: caller overrides, the stored record, then the
//! built-in defaults below.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::ports::{ConfigStore, ModelParameters};

/// Model used when the store has no matching record.
pub const DEFAULT_MODEL_VERSION: &str = "google/nano-banana-pro";
/// Resolution used when neither the caller nor the store sets one.
pub const DEFAULT_RESOLUTION: &str = "2K";
/// Aspect ratio used when neither the caller nor the store sets one.
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";
/// Input name for reference images when the record does not say.
pub const DEFAULT_IMAGE_KEY: &str = "image_input";

/// Caller-supplied parameter overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterOverrides {
    /// Resolution override.
    pub resolution: Option<String>,
    /// Aspect ratio override.
    pub aspect_ratio: Option<String>,
}

/// A resolved model and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Model version identifier passed to the generator.
    pub version: String,
    /// Merged generation parameters.
    pub parameters: ModelParameters,
}

/// Resolves which model to run and with which parameters.
pub struct ModelConfigResolver {
    store: Arc<dyn ConfigStore>,
}

impl ModelConfigResolver {
    /// Create a resolver reading from the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Resolve the model for a request.
    ///
    /// Never fails: store errors and missing records fall back to defaults.
    pub async fn resolve(
        &self,
        requested_version: Option<&str>,
        overrides: &ParameterOverrides,
    ) -> ModelConfig {
        // Blank values count as unset.
        let requested_version = requested_version.filter(|v| !v.is_empty());
        let record = match self.store.fetch_model_parameters(requested_version).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Failed to fetch model config; using built-in defaults");
                None
            }
        };

        let (version, mut parameters) = match record {
            Some(record) => {
                let version = record
                    .name
                    .or_else(|| requested_version.map(str::to_string))
                    .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string());
                debug!(%version, "Using stored model config");
                (version, record.config)
            }
            None => {
                info!(?requested_version, "No matching model config found; using built-in defaults");
                let version = requested_version.unwrap_or(DEFAULT_MODEL_VERSION).to_string();
                (version, ModelParameters::default())
            }
        };

        if let Some(resolution) = non_blank(overrides.resolution.as_ref()) {
            parameters.resolution = Some(resolution);
        }
        if let Some(aspect_ratio) = non_blank(overrides.aspect_ratio.as_ref()) {
            parameters.aspect_ratio = Some(aspect_ratio);
        }
        parameters.resolution.get_or_insert_with(|| DEFAULT_RESOLUTION.to_string());
        parameters.aspect_ratio.get_or_insert_with(|| DEFAULT_ASPECT_RATIO.to_string());

        ModelConfig { version, parameters }
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

impl ModelParameters {
    /// Build the generator input for one prompt.
    ///
    /// `image_key` names where the images go and is not itself an input;
    /// a stray `model_version` entry is dropped as well.
    #[must_use]
    pub fn to_input(&self, prompt: &str, images: &[String]) -> Map<String, Value> {
        let mut input = self.extra.clone();
        input.remove("model_version");
        input.remove("image_key");
        if let Some(ref resolution) = self.resolution {
            input.insert("resolution".into(), Value::String(resolution.clone()));
        }
        if let Some(ref aspect_ratio) = self.aspect_ratio {
            input.insert("aspect_ratio".into(), Value::String(aspect_ratio.clone()));
        }
        input.insert("prompt".into(), Value::String(prompt.to_string()));
        if !images.is_empty() {
            let key = self.image_key.as_deref().unwrap_or(DEFAULT_IMAGE_KEY);
            input.insert(
                key.to_string(),
                Value::Array(images.iter().cloned().map(Value::String).collect()),
            );
        }
        input
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ports::ModelParameterRecord;
    use crate::testing::FakeStore;

    fn record(name: &str, config: Value) -> ModelParameterRecord {
        serde_json::from_value(json!({"name": name, "config": config})).unwrap()
    }

    #[tokio::test]
    async fn override_beats_stored_value() {
        let store = FakeStore::default()
            .with_model(record("google/nano-banana-pro", json!({"resolution": "4K"})));
        let resolver = ModelConfigResolver::new(Arc::new(store));
        let overrides = ParameterOverrides { resolution: Some("2K".into()), aspect_ratio: None };

        let config = resolver.resolve(None, &overrides).await;
        assert_eq!(config.parameters.resolution.as_deref(), Some("2K"));
        assert_eq!(config.parameters.aspect_ratio.as_deref(), Some(DEFAULT_ASPECT_RATIO));
    }

    #[tokio::test]
    async fn blank_values_count_as_unset() {
        let store = Arc::new(
            FakeStore::default()
                .with_model(record("google/nano-banana-pro", json!({"resolution": "4K"}))),
        );
        let resolver = ModelConfigResolver::new(Arc::clone(&store) as Arc<dyn ConfigStore>);
        let overrides =
            ParameterOverrides { resolution: Some(String::new()), aspect_ratio: Some(String::new()) };

        let config = resolver.resolve(Some(""), &overrides).await;
        assert_eq!(config.version, "google/nano-banana-pro");
        assert_eq!(config.parameters.resolution.as_deref(), Some("4K"));
        assert_eq!(config.parameters.aspect_ratio.as_deref(), Some(DEFAULT_ASPECT_RATIO));
        assert_eq!(store.calls(), ["fetch_model_parameters:None"]);
    }

    #[tokio::test]
    async fn blank_version_without_record_uses_default_model() {
        let resolver = ModelConfigResolver::new(Arc::new(FakeStore::default()));
        let overrides = ParameterOverrides { resolution: Some(String::new()), aspect_ratio: None };
        let config = resolver.resolve(Some(""), &overrides).await;
        assert_eq!(config.version, DEFAULT_MODEL_VERSION);
        assert_eq!(config.parameters.resolution.as_deref(), Some(DEFAULT_RESOLUTION));
    }

    #[tokio::test]
    async fn no_record_no_overrides_uses_defaults() {
        let resolver = ModelConfigResolver::new(Arc::new(FakeStore::default()));
        let config = resolver.resolve(None, &ParameterOverrides::default()).await;
        assert_eq!(config.version, DEFAULT_MODEL_VERSION);
        assert_eq!(config.parameters.resolution.as_deref(), Some("2K"));
        assert_eq!(config.parameters.aspect_ratio.as_deref(), Some("16:9"));
        assert!(config.parameters.extra.is_empty());
    }

    #[tokio::test]
    async fn stored_name_normalizes_requested_version() {
        let store = FakeStore::default()
            .with_model(record("google/nano-banana-pro", json!({"aspect_ratio": "1:1"})));
        let resolver = ModelConfigResolver::new(Arc::new(store));
        let config = resolver.resolve(Some("nano-banana-pro"), &ParameterOverrides::default()).await;
        assert_eq!(config.version, "google/nano-banana-pro");
        assert_eq!(config.parameters.aspect_ratio.as_deref(), Some("1:1"));
    }

    #[tokio::test]
    async fn requested_version_kept_when_not_found() {
        let resolver = ModelConfigResolver::new(Arc::new(FakeStore::default()));
        let config =
            resolver.resolve(Some("black-forest-labs/flux"), &ParameterOverrides::default()).await;
        assert_eq!(config.version, "black-forest-labs/flux");
    }

    #[tokio::test]
    async fn store_failure_falls_back() {
        let resolver = ModelConfigResolver::new(Arc::new(FakeStore::default().failing()));
        let overrides = ParameterOverrides { resolution: None, aspect_ratio: Some("9:16".into()) };
        let config = resolver.resolve(None, &overrides).await;
        assert_eq!(config.version, DEFAULT_MODEL_VERSION);
        assert_eq!(config.parameters.aspect_ratio.as_deref(), Some("9:16"));
    }

    #[test]
    fn input_places_images_under_image_key() {
        let parameters: ModelParameters = serde_json::from_value(json!({
            "resolution": "2K",
            "aspect_ratio": "16:9",
            "image_key": "image_urls",
            "model_version": "stale",
            "output_format": "png"
        }))
        .unwrap();
        let input = parameters.to_input("a cat", &["data:image/png;base64,AA==".to_string()]);
        assert_eq!(input["prompt"], "a cat");
        assert_eq!(input["resolution"], "2K");
        assert_eq!(input["output_format"], "png");
        assert_eq!(input["image_urls"], json!(["data:image/png;base64,AA=="]));
        assert!(!input.contains_key("image_key"));
        assert!(!input.contains_key("model_version"));
    }

    #[test]
    fn input_without_images_has_no_image_key() {
        let input = ModelParameters::default().to_input("a dog", &[]);
        assert_eq!(input.len(), 1);
        assert!(!input.contains_key(DEFAULT_IMAGE_KEY));
    }
}

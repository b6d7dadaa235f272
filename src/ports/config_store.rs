//! Config store port: prompt templates, model parameters, generated-prompt log.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::PortFuture;

/// Stored prompt configuration for one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplateRecord {
    /// Instruction prefix shared by every variant.
    #[serde(default, deserialize_with = "lenient_string")]
    pub system_prompt: String,
    /// Instruction variants used in standard mode.
    #[serde(rename = "standard_prompt", default, deserialize_with = "lenient_list")]
    pub standard_prompts: Vec<String>,
    /// Instruction variants used in random mode.
    #[serde(rename = "dynamic_prompt", default, deserialize_with = "lenient_list")]
    pub dynamic_prompts: Vec<String>,
    /// Reference images for the category.
    #[serde(default)]
    pub image_urls: StoredImageUrls,
    /// Every prompt generated for the category so far.
    #[serde(default, deserialize_with = "lenient_list")]
    pub generated_prompts: Vec<String>,
}

/// The `image_urls` column, which holds either a list or a comma-joined string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredImageUrls {
    /// Already separated.
    List(Vec<String>),
    /// Comma-delimited.
    Joined(String),
    /// Anything else, read as no images.
    Other(Value),
}

impl Default for StoredImageUrls {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

impl StoredImageUrls {
    /// Normalize to a list; joined strings are split on commas and trimmed.
    #[must_use]
    pub fn to_urls(&self) -> Vec<String> {
        match self {
            Self::List(urls) => urls.clone(),
            Self::Joined(joined) => joined.split(',').map(|url| url.trim().to_string()).collect(),
            Self::Other(_) => Vec::new(),
        }
    }
}

/// Generation parameters for a model.
///
/// The fields the pipeline inspects are typed; everything else is carried
/// in `extra` and passed to the generator untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Output resolution (e.g. `"2K"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Output aspect ratio (e.g. `"16:9"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    /// Input name under which the model expects reference images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    /// Model-specific parameters.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A `model_config` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameterRecord {
    /// Canonical model version identifier.
    #[serde(default)]
    pub name: Option<String>,
    /// Stored generation parameters.
    #[serde(default, deserialize_with = "lenient_parameters")]
    pub config: ModelParameters,
}

/// Persistent configuration consumed by the pipeline.
pub trait ConfigStore: Send + Sync {
    /// Fetch the prompt template for a category, or `None` if absent.
    fn fetch_prompt_template(&self, category: &str) -> PortFuture<'_, Option<PromptTemplateRecord>>;

    /// Append prompts to the category's generated-prompt log.
    fn append_generated_prompts(&self, category: &str, prompts: &[String]) -> PortFuture<'_, ()>;

    /// Fetch parameters for a model version, or the active default when `None`.
    fn fetch_model_parameters(
        &self,
        version: Option<&str>,
    ) -> PortFuture<'_, Option<ModelParameterRecord>>;
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => {
            items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
        }
        _ => Vec::new(),
    })
}

fn lenient_parameters<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<ModelParameters, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(ModelParameters::default()),
        other => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn template_from_row() {
        let row = json!({
            "system_prompt": "You write prompts.",
            "standard_prompt": ["portrait", "landscape"],
            "dynamic_prompt": null,
            "image_urls": "https://a.example/1.png, https://a.example/2.png",
        });
        let record: PromptTemplateRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.system_prompt, "You write prompts.");
        assert_eq!(record.standard_prompts, ["portrait", "landscape"]);
        assert!(record.dynamic_prompts.is_empty());
        assert!(record.generated_prompts.is_empty());
        assert_eq!(record.image_urls.to_urls(), ["https://a.example/1.png", "https://a.example/2.png"]);
    }

    #[test]
    fn non_list_variants_read_as_empty() {
        let record: PromptTemplateRecord =
            serde_json::from_value(json!({"standard_prompt": "just one", "image_urls": 42}))
                .unwrap();
        assert!(record.standard_prompts.is_empty());
        assert!(record.image_urls.to_urls().is_empty());
    }

    #[test]
    fn image_url_list_kept_verbatim() {
        let record: PromptTemplateRecord =
            serde_json::from_value(json!({"image_urls": [" a ", "b"]})).unwrap();
        assert_eq!(record.image_urls.to_urls(), [" a ", "b"]);
    }

    #[test]
    fn model_parameters_keep_unknown_fields() {
        let record: ModelParameterRecord = serde_json::from_value(json!({
            "name": "google/nano-banana-pro",
            "config": {"resolution": "4K", "image_key": "image_input", "output_format": "png"}
        }))
        .unwrap();
        assert_eq!(record.name.as_deref(), Some("google/nano-banana-pro"));
        assert_eq!(record.config.resolution.as_deref(), Some("4K"));
        assert_eq!(record.config.image_key.as_deref(), Some("image_input"));
        assert_eq!(record.config.extra.get("output_format"), Some(&json!("png")));
        assert!(!record.config.extra.contains_key("resolution"));
    }

    #[test]
    fn null_config_is_empty() {
        let record: ModelParameterRecord =
            serde_json::from_value(json!({"name": "m", "config": null})).unwrap();
        assert_eq!(record.config, ModelParameters::default());
    }
}

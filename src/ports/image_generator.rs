//! Image generator port for hosted image generation models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::PortFuture;

/// A request to run an image model once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Model identifier (e.g., `"google/nano-banana-pro"`).
    pub model: String,
    /// Model input: prompt, reference images and generation parameters.
    pub input: Map<String, Value>,
}

/// A single generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Raw image bytes (decoded from base64).
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// MIME type of the image (e.g., `"image/webp"`).
    pub mime_type: String,
    /// Where the service served the image from, if it was a URL.
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Response containing generated images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    /// The generated images.
    pub images: Vec<GeneratedImage>,
}

/// Boxed future type returned by [`ImageGenerator::generate`].
pub type GenerateFuture<'a> = PortFuture<'a, ImageResponse>;

/// Generates images via an external API.
pub trait ImageGenerator: Send + Sync {
    /// Run the model for the given request.
    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_>;
}

/// Serde helper for serializing `Vec<u8>` as base64 strings in cassettes.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as base64 string.
    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        serializer.serialize_str(&encoded)
    }

    /// Deserialize base64 string to bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_image_bytes_as_base64() {
        let image = GeneratedImage {
            data: vec![0x52, 0x49, 0x46, 0x46], // RIFF, the WebP container magic
            mime_type: "image/webp".into(),
            source_url: Some("https://replicate.delivery/out.webp".into()),
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["data"], "UklGRg==");
        let back: GeneratedImage = serde_json::from_value(json).unwrap();
        assert_eq!(back.data, vec![0x52, 0x49, 0x46, 0x46]);
    }

    #[test]
    fn source_url_optional_in_cassettes() {
        let image: GeneratedImage =
            serde_json::from_str(r#"{"data": "AQID", "mime_type": "image/png"}"#).unwrap();
        assert_eq!(image.data, vec![1, 2, 3]);
        assert!(image.source_url.is_none());
    }
}

//! Live image generator backed by Replicate predictions.

use std::path::Path;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{checked_text, parse_json};
use crate::error::PipelineError;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, ImageGenerator, ImageRequest, ImageResponse,
};

const REPLICATE_API_BASE: &str = "https://api.replicate.com/v1";
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Runs a model on Replicate and downloads its outputs.
pub struct ReplicateGenerator {
    client: Client,
    api_token: String,
    timeout: Duration,
}

impl ReplicateGenerator {
    /// Create a generator; a prediction taking longer than `timeout` fails.
    #[must_use]
    pub fn new(api_token: String, timeout: Duration) -> Self {
        Self { client: Client::new(), api_token, timeout }
    }

    async fn run(&self, request: &ImageRequest) -> Result<ImageResponse, PipelineError> {
        let (endpoint, body) = prediction_request(&request.model, &request.input);
        info!(model = %request.model, "Creating prediction");
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        let mut prediction: Value = parse_json(&checked_text(response).await?)?;

        loop {
            match prediction_status(&prediction) {
                "succeeded" => break,
                "failed" | "canceled" => {
                    return Err(PipelineError::Api {
                        status: 200,
                        message: format!(
                            "Prediction {}: {}",
                            prediction_status(&prediction),
                            prediction.get("error").unwrap_or(&Value::Null)
                        ),
                    });
                }
                status => {
                    let poll_url = prediction
                        .pointer("/urls/get")
                        .and_then(Value::as_str)
                        .ok_or_else(|| PipelineError::Api {
                            status: 200,
                            message: "Prediction is missing its poll URL".to_string(),
                        })?
                        .to_string();
                    debug!(status, "Waiting for prediction");
                    tokio::time::sleep(POLL_INTERVAL).await;
                    let response =
                        self.client.get(&poll_url).bearer_auth(&self.api_token).send().await?;
                    prediction = parse_json(&checked_text(response).await?)?;
                }
            }
        }

        let mut urls = Vec::new();
        if let Some(output) = prediction.get("output") {
            collect_output_urls(output, &mut urls);
        }
        if urls.is_empty() {
            return Err(PipelineError::Api {
                status: 200,
                message: "Prediction succeeded but returned no output URLs".to_string(),
            });
        }

        let mut images = Vec::with_capacity(urls.len());
        for url in urls {
            images.push(self.download(url).await?);
        }
        Ok(ImageResponse { images })
    }

    async fn download(&self, url: String) -> Result<GeneratedImage, PipelineError> {
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: format!("Failed to download output {url}"),
            });
        }
        let header_mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let data = response.bytes().await?.to_vec();
        let mime_type = output_mime(&url).or(header_mime).unwrap_or_else(|| "image/webp".to_string());
        Ok(GeneratedImage { data, mime_type, source_url: Some(url) })
    }
}

impl ImageGenerator for ReplicateGenerator {
    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.run(&request)).await.map_err(|_| {
                PipelineError::Api {
                    status: 408,
                    message: format!(
                        "Prediction did not finish within {}s",
                        self.timeout.as_secs()
                    ),
                }
            })?
        })
    }
}

/// Endpoint and body for a new prediction.
///
/// `owner/name` runs the model's latest version; `owner/name:hash` pins one.
fn prediction_request(model: &str, input: &serde_json::Map<String, Value>) -> (String, Value) {
    match model.split_once(':') {
        Some((_, version)) => (
            format!("{REPLICATE_API_BASE}/predictions"),
            json!({ "version": version, "input": input }),
        ),
        None => (
            format!("{REPLICATE_API_BASE}/models/{model}/predictions"),
            json!({ "input": input }),
        ),
    }
}

fn prediction_status(prediction: &Value) -> &str {
    prediction.get("status").and_then(Value::as_str).unwrap_or("starting")
}

/// Output is a URL, a list of URLs, or objects carrying them.
fn collect_output_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) if url.starts_with("http") => {
            if !out.iter().any(|u| u == url) {
                out.push(url.clone());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_output_urls(item, out)),
        Value::Object(obj) => {
            if let Some(url) = obj.get("url") {
                collect_output_urls(url, out);
            }
        }
        _ => {}
    }
}

fn output_mime(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    mime_guess::from_path(Path::new(parsed.path()))
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
}

//! Live adapters that call the real services.

pub mod gdrive;
pub mod openai;
pub mod replicate;
pub mod supabase;

use serde::de::DeserializeOwned;

use crate::error::PipelineError;

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Read a response body, turning non-2xx statuses into [`PipelineError::Api`].
async fn checked_text(response: reqwest::Response) -> Result<String, PipelineError> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        Ok(text)
    } else {
        Err(PipelineError::Api { status: status.as_u16(), message: truncate(&text) })
    }
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, PipelineError> {
    serde_json::from_str(text).map_err(|e| PipelineError::Api {
        status: 200,
        message: format!("Failed to parse response: {e}. Body: {}", truncate(text)),
    })
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

//! Live prompt expander backed by the `OpenAI` chat completions API.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{checked_text, parse_json};
use crate::ports::{PortFuture, PromptExpander};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_MESSAGE: &str = "You are a creative assistant that generates highly detailed image \
     generation prompts. Output your response as a JSON object with a key 'prompts' which is a \
     list of strings.";

/// Expands an instruction into prompts with a chat model in JSON mode.
pub struct OpenAiExpander {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiExpander {
    /// Create a new expander using `model` (e.g. `gpt-4o`).
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self { client: Client::new(), api_key, model }
    }
}

fn user_message(instruction: &str, count: usize) -> String {
    format!(
        "Based on the following instructions, generate {count} unique, highly detailed image \
         prompts:\n\nInstructions: {instruction}"
    )
}

/// Pull the prompt list out of the model's JSON answer; anything else is empty.
fn prompts_from_content(content: &str) -> Vec<String> {
    match serde_json::from_str::<PromptList>(content) {
        Ok(list) => list.prompts,
        Err(e) => {
            warn!(error = %e, "Model answer has no prompt list");
            Vec::new()
        }
    }
}

impl PromptExpander for OpenAiExpander {
    fn expand(&self, instruction: &str, count: usize) -> PortFuture<'_, Vec<String>> {
        let body = json!({
            "model": self.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_MESSAGE},
                {"role": "user", "content": user_message(instruction, count)},
            ],
        });
        Box::pin(async move {
            debug!(model = %self.model, count, "Requesting prompt expansion");
            let response = self
                .client
                .post(OPENAI_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await?;

            let parsed: ChatResponse = parse_json(&checked_text(response).await?)?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            Ok(prompts_from_content(&content))
        })
    }
}

// --- OpenAI API response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct PromptList {
    #[serde(default)]
    prompts: Vec<String>,
}

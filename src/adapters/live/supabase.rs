//! Live config store backed by Supabase's PostgREST interface.

use reqwest::{Client, RequestBuilder};
use serde_json::json;
use tracing::debug;

use super::{checked_text, parse_json};
use crate::error::PipelineError;
use crate::ports::{ConfigStore, ModelParameterRecord, PortFuture, PromptTemplateRecord};

const PROMPT_TABLE: &str = "nano_banana_prompt_config";
const MODEL_TABLE: &str = "model_config";
const TEMPLATE_COLUMNS: &str =
    "system_prompt,standard_prompt,dynamic_prompt,image_urls,generated_prompts";

/// Reads and writes the prompt and model tables over REST.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    /// Create a store for the project at `url` (e.g. `https://xyz.supabase.co`).
    #[must_use]
    pub fn new(url: &str, api_key: String) -> Self {
        Self { client: Client::new(), base_url: url.trim_end_matches('/').to_string(), api_key }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.api_key).bearer_auth(&self.api_key)
    }

    async fn first_row<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, PipelineError> {
        let request = self.client.get(self.table_url(table)).query(query).query(&[("limit", "1")]);
        let response = self.authorized(request).send().await?;
        let rows: Vec<T> = parse_json(&checked_text(response).await?)?;
        Ok(rows.into_iter().next())
    }
}

fn category_filter(category: &str) -> (&'static str, String) {
    ("category_type", format!("eq.{category}"))
}

/// Query for a model row: by name, or the active image model.
fn model_query(version: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("select", "name,config".to_string())];
    match version {
        Some(version) => query.push(("name", format!("eq.{version}"))),
        None => {
            query.push(("isActive", "eq.true".to_string()));
            query.push(("type", "eq.image".to_string()));
        }
    }
    query
}

impl ConfigStore for SupabaseStore {
    fn fetch_prompt_template(&self, category: &str) -> PortFuture<'_, Option<PromptTemplateRecord>> {
        let query = vec![("select", TEMPLATE_COLUMNS.to_string()), category_filter(category)];
        Box::pin(async move { self.first_row(PROMPT_TABLE, &query).await })
    }

    fn append_generated_prompts(&self, category: &str, prompts: &[String]) -> PortFuture<'_, ()> {
        let category = category.to_string();
        let prompts = prompts.to_vec();
        Box::pin(async move {
            let query = vec![("select", "generated_prompts".to_string()), category_filter(&category)];
            let existing: Option<PromptTemplateRecord> = self.first_row(PROMPT_TABLE, &query).await?;
            let mut combined = existing.map(|r| r.generated_prompts).unwrap_or_default();
            combined.extend(prompts);
            debug!(%category, total = combined.len(), "Updating generated prompt log");

            let request = self
                .client
                .patch(self.table_url(PROMPT_TABLE))
                .query(&[category_filter(&category)])
                .header("Prefer", "return=minimal")
                .json(&json!({ "generated_prompts": combined }));
            checked_text(self.authorized(request).send().await?).await?;
            Ok(())
        })
    }

    fn fetch_model_parameters(
        &self,
        version: Option<&str>,
    ) -> PortFuture<'_, Option<ModelParameterRecord>> {
        let query = model_query(version);
        Box::pin(async move { self.first_row(MODEL_TABLE, &query).await })
    }
}

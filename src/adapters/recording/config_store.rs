//! Recording adapter for the `ConfigStore` port.

use std::sync::{Arc, Mutex};

use serde_json::json;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{ConfigStore, ModelParameterRecord, PortFuture, PromptTemplateRecord};

/// Records store reads and writes while delegating to an inner implementation.
pub struct RecordingConfigStore {
    inner: Arc<dyn ConfigStore>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingConfigStore {
    /// Wrap `inner`, recording into `recorder`.
    pub fn new(inner: Arc<dyn ConfigStore>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl ConfigStore for RecordingConfigStore {
    fn fetch_prompt_template(&self, category: &str) -> PortFuture<'_, Option<PromptTemplateRecord>> {
        let category = category.to_string();
        let recorder = Arc::clone(&self.recorder);
        Box::pin(async move {
            let result = self.inner.fetch_prompt_template(&category).await;
            let input = json!({ "category": category });
            record_result(&recorder, "config_store", "fetch_prompt_template", &input, &result);
            result
        })
    }

    fn append_generated_prompts(&self, category: &str, prompts: &[String]) -> PortFuture<'_, ()> {
        let category = category.to_string();
        let prompts = prompts.to_vec();
        let recorder = Arc::clone(&self.recorder);
        Box::pin(async move {
            let result = self.inner.append_generated_prompts(&category, &prompts).await;
            let input = json!({ "category": category, "prompts": prompts });
            record_result(&recorder, "config_store", "append_generated_prompts", &input, &result);
            result
        })
    }

    fn fetch_model_parameters(
        &self,
        version: Option<&str>,
    ) -> PortFuture<'_, Option<ModelParameterRecord>> {
        let version = version.map(str::to_string);
        let recorder = Arc::clone(&self.recorder);
        Box::pin(async move {
            let result = self.inner.fetch_model_parameters(version.as_deref()).await;
            let input = json!({ "version": version });
            record_result(&recorder, "config_store", "fetch_model_parameters", &input, &result);
            result
        })
    }
}

//! Replaying adapter for the `ConfigStore` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{ConfigStore, ModelParameterRecord, PortFuture, PromptTemplateRecord};

/// Serves recorded store interactions from a cassette.
pub struct ReplayingConfigStore {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingConfigStore {
    /// Create a replaying store backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl ConfigStore for ReplayingConfigStore {
    fn fetch_prompt_template(&self, _category: &str) -> PortFuture<'_, Option<PromptTemplateRecord>> {
        let output = next_output(&self.replayer, "config_store", "fetch_prompt_template");
        Box::pin(async move { replay_result(output) })
    }

    fn append_generated_prompts(&self, _category: &str, _prompts: &[String]) -> PortFuture<'_, ()> {
        let output = next_output(&self.replayer, "config_store", "append_generated_prompts");
        Box::pin(async move { replay_result(output) })
    }

    fn fetch_model_parameters(
        &self,
        _version: Option<&str>,
    ) -> PortFuture<'_, Option<ModelParameterRecord>> {
        let output = next_output(&self.replayer, "config_store", "fetch_model_parameters");
        Box::pin(async move { replay_result(output) })
    }
}

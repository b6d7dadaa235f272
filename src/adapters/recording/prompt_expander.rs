//! Recording adapter for the `PromptExpander` port.

use std::sync::{Arc, Mutex};

use serde_json::json;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{PortFuture, PromptExpander};

/// Records prompt expansions while delegating to an inner implementation.
pub struct RecordingPromptExpander {
    inner: Arc<dyn PromptExpander>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingPromptExpander {
    /// Wrap `inner`, recording into `recorder`.
    pub fn new(inner: Arc<dyn PromptExpander>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl PromptExpander for RecordingPromptExpander {
    fn expand(&self, instruction: &str, count: usize) -> PortFuture<'_, Vec<String>> {
        let instruction = instruction.to_string();
        let recorder = Arc::clone(&self.recorder);

        Box::pin(async move {
            let result = self.inner.expand(&instruction, count).await;
            let input = json!({ "instruction": instruction, "count": count });
            record_result(&recorder, "prompt_expander", "expand", &input, &result);
            result
        })
    }
}

//! Replaying adapter for the `PromptExpander` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{PortFuture, PromptExpander};

/// Serves recorded prompt expansions from a cassette.
pub struct ReplayingPromptExpander {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingPromptExpander {
    /// Create a replaying expander backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl PromptExpander for ReplayingPromptExpander {
    fn expand(&self, _instruction: &str, _count: usize) -> PortFuture<'_, Vec<String>> {
        let output = next_output(&self.replayer, "prompt_expander", "expand");
        Box::pin(async move { replay_result(output) })
    }
}

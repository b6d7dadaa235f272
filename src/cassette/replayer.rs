//! Replays recorded interactions from a cassette.

use std::collections::{HashMap, VecDeque};

use super::format::{Cassette, Interaction};
use crate::error::PipelineError;

/// Key for indexing interactions by port and method.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct PortMethodKey {
    port: String,
    method: String,
}

/// Serves interactions from a loaded cassette, in recorded order per
/// port/method pair.
///
/// Calls to different methods may interleave differently from the
/// recording; only the order within one method is fixed.
#[derive(Debug)]
pub struct CassetteReplayer {
    queues: HashMap<PortMethodKey, VecDeque<Interaction>>,
}

impl CassetteReplayer {
    /// Create a new replayer from a loaded cassette.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut interactions = cassette.interactions.clone();
        interactions.sort_by_key(|i| i.seq);

        let mut queues: HashMap<PortMethodKey, VecDeque<Interaction>> = HashMap::new();
        for interaction in interactions {
            let key = PortMethodKey {
                port: interaction.port.clone(),
                method: interaction.method.clone(),
            };
            queues.entry(key).or_default().push_back(interaction);
        }
        Self { queues }
    }

    /// Take the next interaction for the given port and method.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if nothing (more) was recorded for
    /// the pair.
    pub fn next_interaction(
        &mut self,
        port: &str,
        method: &str,
    ) -> Result<Interaction, PipelineError> {
        let key = PortMethodKey { port: port.to_string(), method: method.to_string() };
        let Some(queue) = self.queues.get_mut(&key) else {
            let mut available: Vec<String> =
                self.queues.keys().map(|k| format!("{}::{}", k.port, k.method)).collect();
            available.sort();
            return Err(PipelineError::Config(format!(
                "Cassette exhausted: no interactions recorded for {port}::{method}. \
                 Available: [{}]",
                available.join(", ")
            )));
        };
        queue.pop_front().ok_or_else(|| {
            PipelineError::Config(format!(
                "Cassette exhausted: every recorded {port}::{method} interaction was consumed"
            ))
        })
    }
}

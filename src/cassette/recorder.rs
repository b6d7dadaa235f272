//! Accumulates port interactions and writes them out as one cassette.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::Value;

use super::format::{Cassette, Interaction};
use crate::error::PipelineError;

/// In-memory cassette that is written to `path` when the session ends.
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    cassette: Cassette,
}

impl CassetteRecorder {
    /// Start an empty recording destined for `path`.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cassette: Cassette {
                name: name.into(),
                recorded_at: Utc::now(),
                commit: commit.into(),
                interactions: Vec::new(),
            },
        }
    }

    /// Append one call. Sequence numbers follow call order across all ports.
    pub fn record(&mut self, port: &str, method: &str, input: Value, output: Value) {
        let seq = self.cassette.interactions.len() as u64;
        self.cassette.interactions.push(Interaction {
            seq,
            port: port.to_string(),
            method: method.to_string(),
            input,
            output,
        });
    }

    /// Number of interactions captured so far.
    pub fn len(&self) -> usize {
        self.cassette.interactions.len()
    }

    /// Stamp the finish time and write the cassette.
    ///
    /// The file is written beside its destination and renamed into place, so
    /// a reader never sees a partial cassette.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be serialized or written.
    pub fn finish(mut self) -> Result<PathBuf, PipelineError> {
        self.cassette.recorded_at = Utc::now();
        let yaml = serde_yaml::to_string(&self.cassette)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize cassette: {e}")))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("yaml.partial");
        std::fs::write(&staging, yaml)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(self.path)
    }
}

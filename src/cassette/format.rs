//! On-disk cassette layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded session: every port interaction of one run, in call order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cassette {
    /// Human-readable session name.
    pub name: String,
    /// When the recording finished.
    pub recorded_at: DateTime<Utc>,
    /// Source revision the recording was made with.
    #[serde(default)]
    pub commit: String,
    /// Interactions across all ports, ordered by `seq`.
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// One call to a port method and what it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Position in the recording.
    pub seq: u64,
    /// Port name, e.g. `config_store`.
    pub port: String,
    /// Method name, e.g. `fetch_prompt_template`.
    pub method: String,
    /// Call arguments; informational only during replay.
    #[serde(default)]
    pub input: serde_json::Value,
    /// `{"Ok": value}` or `{"Err": message}`.
    pub output: serde_json::Value,
}
